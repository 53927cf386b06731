use std::path::PathBuf;
use std::process;

use arbor_common::{DEFAULT_MIN_DEGREE, IndexBackend, IndexConfig};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod bench;
mod commands;
mod repl;

use commands::FsCommand;

#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "In-memory virtual file-system simulator", long_about = None)]
struct Cli {
    /// Snapshot file shared between invocations.
    #[arg(short, long, default_value = ".arbor_state.bin.gz", global = true)]
    state: PathBuf,

    /// Index backend used when creating a fresh tree (an existing snapshot
    /// keeps the backend it was saved with).
    #[arg(long, default_value = "btree", global = true)]
    backend: IndexBackend,

    /// Minimum degree for the B-tree backend.
    #[arg(long, default_value_t = DEFAULT_MIN_DEGREE, global = true)]
    degree: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create a directory")]
    Mkdir {
        path: String,
        /// Create missing parent directories as needed.
        #[arg(short, long)]
        parents: bool,
    },
    #[command(about = "Create an empty file")]
    Touch { path: String },
    #[command(about = "Write text to a file, creating it if missing")]
    Write { path: String, data: String },
    #[command(about = "Print file contents")]
    Read { path: String },
    #[command(about = "List directory contents")]
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    #[command(about = "Remove a file or directory")]
    Rm {
        path: String,
        /// Remove directories and their contents recursively.
        #[arg(short, long)]
        recursive: bool,
    },
    #[command(about = "Show metadata for a path")]
    Stat { path: String },
    #[command(about = "Start an interactive shell")]
    Repl,
    #[command(about = "Populate a tree and time random reads")]
    BenchVfs {
        /// Number of top-level directories.
        #[arg(long, default_value_t = 50)]
        dirs: usize,
        /// Files created inside each directory.
        #[arg(long, default_value_t = 200)]
        files: usize,
        /// Timed random read operations.
        #[arg(long, default_value_t = 20_000)]
        ops: usize,
        /// Payload size in bytes per generated file.
        #[arg(long, default_value_t = 256)]
        payload: usize,
        /// RNG seed for a repeatable workload.
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Reuse an existing snapshot instead of repopulating.
        #[arg(long)]
        reuse: bool,
    },
    #[command(about = "Micro-benchmark one index backend directly")]
    BenchIndex {
        /// Keys to load into the index.
        #[arg(long, default_value_t = 100_000)]
        keys: usize,
        /// Timed lookups after loading.
        #[arg(long, default_value_t = 50_000)]
        ops: usize,
        /// RNG seed for a repeatable workload.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = IndexConfig {
        backend: cli.backend,
        btree_min_degree: cli.degree,
    };

    match cli.command {
        Commands::Repl => repl::run(&cli.state, config),
        Commands::BenchVfs {
            dirs,
            files,
            ops,
            payload,
            seed,
            reuse,
        } => bench::run_vfs(
            &cli.state,
            config,
            arbor_common::BenchConfig {
                dirs,
                files_per_dir: files,
                ops,
                payload_size: payload,
                seed,
            },
            reuse,
        ),
        Commands::BenchIndex { keys, ops, seed } => bench::run_index(config, keys, ops, seed),
        other => {
            let cmd = match other {
                Commands::Mkdir { path, parents } => FsCommand::Mkdir { path, parents },
                Commands::Touch { path } => FsCommand::Touch { path },
                Commands::Write { path, data } => FsCommand::Write { path, data },
                Commands::Read { path } => FsCommand::Read { path },
                Commands::Ls { path } => FsCommand::Ls { path },
                Commands::Rm { path, recursive } => FsCommand::Rm { path, recursive },
                Commands::Stat { path } => FsCommand::Stat { path },
                // Repl and the benches are handled above.
                _ => unreachable!("non-filesystem command reached one-shot dispatch"),
            };
            match commands::run_one_shot(&cli.state, config, &cmd) {
                Ok(()) => Ok(()),
                Err(err) => {
                    eprintln!("error: {}", err);
                    process::exit(1);
                }
            }
        }
    }
}
