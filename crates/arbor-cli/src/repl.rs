//! Interactive shell over one in-memory tree.
//!
//! Loads the snapshot once, keeps session state (the VFS plus a current
//! directory for relative paths), and saves on exit. The current directory
//! is an explicit value threaded into every resolution, not process-wide
//! state.

use std::io::{self, BufRead, Write};
use std::path::Path;

use arbor_common::{FsError, IndexConfig};
use arbor_fs::{Vfs, snapshot};
use tracing::debug;

use crate::commands::{self, FsCommand};

const HELP: &str = "commands: mkdir [-p] touch write read ls rm [-r] stat cd pwd help quit";

/// One parsed REPL line.
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Fs(FsCommand),
    Cd(String),
    Pwd,
    Help,
    Quit,
}

fn parse_line(line: &str) -> Result<ReplCommand, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (verb, args) = tokens
        .split_first()
        .ok_or_else(|| "empty command".to_string())?;

    let flag = |name: &str| args.iter().any(|a| *a == name);
    let positional: Vec<&str> = args.iter().filter(|a| !a.starts_with('-')).copied().collect();
    let one_path = || -> Result<String, String> {
        positional
            .first()
            .map(|p| p.to_string())
            .ok_or_else(|| format!("{} needs a path", verb))
    };

    match *verb {
        "mkdir" => Ok(ReplCommand::Fs(FsCommand::Mkdir {
            path: one_path()?,
            parents: flag("-p") || flag("--parents"),
        })),
        "touch" => Ok(ReplCommand::Fs(FsCommand::Touch { path: one_path()? })),
        "write" => {
            let path = one_path()?;
            // Everything after the path token is payload, spaces included.
            let tail = &line[verb.len()..];
            let data = tail
                .find(path.as_str())
                .map(|at| tail[at + path.len()..].trim())
                .unwrap_or("");
            if data.is_empty() {
                return Err("write needs a path and data".to_string());
            }
            Ok(ReplCommand::Fs(FsCommand::Write {
                path,
                data: data.to_string(),
            }))
        }
        "read" => Ok(ReplCommand::Fs(FsCommand::Read { path: one_path()? })),
        "ls" => Ok(ReplCommand::Fs(FsCommand::Ls {
            path: positional.first().unwrap_or(&"/").to_string(),
        })),
        "rm" => Ok(ReplCommand::Fs(FsCommand::Rm {
            path: one_path()?,
            recursive: flag("-r") || flag("--recursive"),
        })),
        "stat" => Ok(ReplCommand::Fs(FsCommand::Stat { path: one_path()? })),
        "cd" => Ok(ReplCommand::Cd(
            positional.first().unwrap_or(&"/").to_string(),
        )),
        "pwd" => Ok(ReplCommand::Pwd),
        "help" => Ok(ReplCommand::Help),
        "quit" | "exit" => Ok(ReplCommand::Quit),
        other => Err(format!("unknown command: {}", other)),
    }
}

pub fn run(state: &Path, config: IndexConfig) -> anyhow::Result<()> {
    let mut vfs = snapshot::load_or_default(state, config)?;
    let mut cwd = vfs.root();
    debug!(nodes = vfs.node_count(), "REPL session started");

    println!("arbor REPL — type 'help' or 'quit'");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let prompt_path = vfs.display_path(cwd).unwrap_or_else(|_| "?".to_string());
        print!("arbor:{}> ", prompt_path);
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(ReplCommand::Quit) => break,
            Ok(ReplCommand::Help) => println!("{}", HELP),
            Ok(ReplCommand::Pwd) => match vfs.display_path(cwd) {
                Ok(path) => println!("{}", path),
                Err(err) => println!("error: {}", err),
            },
            Ok(ReplCommand::Cd(path)) => match change_dir(&vfs, cwd, &path) {
                Ok(next) => cwd = next,
                Err(err) => println!("error: {}", err),
            },
            Ok(ReplCommand::Fs(cmd)) => {
                if let Err(err) = commands::apply(&mut vfs, cwd, &cmd) {
                    println!("error: {}", err);
                }
            }
            Err(msg) => println!("error: {}", msg),
        }
    }

    snapshot::save(&vfs, state)?;
    println!("saved {}", state.display());
    Ok(())
}

fn change_dir(
    vfs: &Vfs,
    cwd: arbor_common::InodeId,
    path: &str,
) -> arbor_common::Result<arbor_common::InodeId> {
    let id = vfs.resolve(cwd, path)?;
    let is_dir = vfs.node(id).map(|n| n.kind().is_dir()).unwrap_or(false);
    if !is_dir {
        return Err(FsError::NotADirectory(path.to_string()));
    }
    Ok(id)
}
