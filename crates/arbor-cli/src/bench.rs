//! Synthetic load generation and latency micro-benchmarks.
//!
//! `bench-vfs` populates a tree (N top-level directories x M files with
//! random payloads) and times random whole-file reads through full path
//! resolution. `bench-index` drives one index backend directly, wrapping
//! every call in timing instrumentation. Workloads are seeded so runs are
//! repeatable.

use std::path::Path;
use std::time::Instant;

use anyhow::bail;
use arbor_common::{BenchConfig, IndexConfig, InodeId};
use arbor_fs::{Vfs, snapshot};
use arbor_index::{OrderedIndex, build_index};
use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

// =============================================================================
// Reporting helpers
// =============================================================================

/// Formats a number with comma separators for readability.
fn format_with_commas(n: f64) -> String {
    let s = format!("{:.0}", n);
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::new();
    let len = chars.len();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (len - i) % 3 == 0 && *c != '-' {
            result.push(',');
        }
        result.push(*c);
    }
    result
}

/// Latency summary over a sample set, in microseconds.
struct LatencySummary {
    min: f64,
    p50: f64,
    p95: f64,
    max: f64,
    mean: f64,
}

fn summarize(mut samples: Vec<f64>) -> Option<LatencySummary> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let len = samples.len();
    let mean = samples.iter().sum::<f64>() / len as f64;
    Some(LatencySummary {
        min: samples[0],
        p50: samples[len / 2],
        p95: samples[(len * 19 / 20).min(len - 1)],
        max: samples[len - 1],
        mean,
    })
}

fn print_header() {
    println!(
        "  {:<10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "op", "min", "p50", "p95", "max", "mean"
    );
}

fn print_row(op: &str, summary: &LatencySummary) {
    println!(
        "  {:<10} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
        op, summary.min, summary.p50, summary.p95, summary.max, summary.mean
    );
}

// =============================================================================
// VFS benchmark
// =============================================================================

fn random_file_name(rng: &mut StdRng) -> String {
    let body: String = (0..6).map(|_| rng.sample(Alphanumeric) as char).collect();
    format!("file_{}.bin", body)
}

/// Creates `dirs` top-level directories, each with up to `files_per_dir`
/// randomly named files. Name collisions overwrite, so a directory may end
/// up slightly below the target count.
fn populate(vfs: &mut Vfs, cfg: &BenchConfig, rng: &mut StdRng) -> anyhow::Result<()> {
    let root = vfs.root();
    for d in 0..cfg.dirs {
        let dir_path = format!("/dir_{:03}", d);
        vfs.mkdir(root, &dir_path, false)?;
        for _ in 0..cfg.files_per_dir {
            let payload: Vec<u8> = (0..cfg.payload_size).map(|_| rng.random()).collect();
            let path = format!("{}/{}", dir_path, random_file_name(rng));
            vfs.write(root, &path, &payload)?;
        }
    }
    Ok(())
}

/// Every file path in the tree, via ordered directory listings.
fn collect_file_paths(vfs: &Vfs) -> anyhow::Result<Vec<String>> {
    let root = vfs.root();
    let mut paths = Vec::new();
    for dir_entry in vfs.ls(root, "/")? {
        if !dir_entry.kind.is_dir() {
            continue;
        }
        let dir_path = format!("/{}", dir_entry.name);
        for file_entry in vfs.ls(root, &dir_path)? {
            if file_entry.kind.is_file() {
                paths.push(format!("{}/{}", dir_path, file_entry.name));
            }
        }
    }
    Ok(paths)
}

pub fn run_vfs(
    state: &Path,
    config: IndexConfig,
    cfg: BenchConfig,
    reuse: bool,
) -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let vfs = if reuse && state.exists() {
        info!(state = %state.display(), "reusing existing snapshot");
        snapshot::load(state)?
    } else {
        info!(dirs = cfg.dirs, files = cfg.files_per_dir, "populating tree");
        let mut vfs = Vfs::new(config);
        let start = Instant::now();
        populate(&mut vfs, &cfg, &mut rng)?;
        println!(
            "populated {} nodes in {:.2?}",
            format_with_commas(vfs.node_count() as f64),
            start.elapsed()
        );
        snapshot::save(&vfs, state)?;
        info!(state = %state.display(), "snapshot saved");
        vfs
    };

    let paths = collect_file_paths(&vfs)?;
    if paths.is_empty() {
        bail!("tree has no files to read");
    }

    let root = vfs.root();

    // Warmup pass before timing.
    for _ in 0..100.min(cfg.ops) {
        let path = &paths[rng.random_range(0..paths.len())];
        let _ = vfs.read(root, path)?;
    }

    let mut samples = Vec::with_capacity(cfg.ops);
    for _ in 0..cfg.ops {
        let path = &paths[rng.random_range(0..paths.len())];
        let start = Instant::now();
        let _ = vfs.read(root, path)?;
        samples.push(start.elapsed().as_nanos() as f64 / 1_000.0);
    }

    println!(
        "\n=== Random read latency (us): {} ops over {} files, backend={} ===",
        format_with_commas(cfg.ops as f64),
        format_with_commas(paths.len() as f64),
        vfs.index_config().backend
    );
    print_header();
    if let Some(summary) = summarize(samples) {
        print_row("read", &summary);
    }
    Ok(())
}

// =============================================================================
// Index benchmark
// =============================================================================

/// Wraps an index, recording the duration of every call in microseconds.
struct TimedIndex {
    inner: Box<dyn OrderedIndex>,
    insert_us: Vec<f64>,
    lookup_us: Vec<f64>,
    delete_us: Vec<f64>,
}

impl TimedIndex {
    fn new(inner: Box<dyn OrderedIndex>) -> Self {
        Self {
            inner,
            insert_us: Vec::new(),
            lookup_us: Vec::new(),
            delete_us: Vec::new(),
        }
    }

    fn insert(&mut self, key: String, value: InodeId) {
        let start = Instant::now();
        self.inner.insert(key, value);
        self.insert_us
            .push(start.elapsed().as_nanos() as f64 / 1_000.0);
    }

    fn lookup(&mut self, key: &str) -> Option<InodeId> {
        let start = Instant::now();
        let found = self.inner.lookup(key);
        self.lookup_us
            .push(start.elapsed().as_nanos() as f64 / 1_000.0);
        found
    }

    fn delete(&mut self, key: &str) {
        let start = Instant::now();
        self.inner.delete(key);
        self.delete_us
            .push(start.elapsed().as_nanos() as f64 / 1_000.0);
    }

    /// Times one full ordered traversal, returning (entries, seconds).
    fn iterate(&self) -> (usize, f64) {
        let start = Instant::now();
        let count = self.inner.iter().count();
        (count, start.elapsed().as_secs_f64())
    }
}

pub fn run_index(config: IndexConfig, keys: usize, ops: usize, seed: u64) -> anyhow::Result<()> {
    if keys == 0 {
        bail!("--keys must be positive");
    }
    let mut rng = StdRng::seed_from_u64(seed);

    let mut names: Vec<String> = (0..keys).map(|i| format!("entry_{:08}", i)).collect();
    // Shuffle for random insertion order.
    for i in (1..names.len()).rev() {
        let j = rng.random_range(0..=i);
        names.swap(i, j);
    }

    let mut index = TimedIndex::new(build_index(&config));

    for (i, name) in names.iter().enumerate() {
        index.insert(name.clone(), InodeId(i as u64));
    }
    let height = index.inner.height();
    let len = index.inner.len();

    let mut found = 0usize;
    for _ in 0..ops {
        let name = &names[rng.random_range(0..names.len())];
        if index.lookup(name).is_some() {
            found += 1;
        }
    }
    if found != ops {
        bail!("lookup missed {} of {} present keys", ops - found, ops);
    }

    let (iterated, iterate_secs) = index.iterate();
    if iterated != len {
        bail!("iteration yielded {} of {} entries", iterated, len);
    }

    for i in (1..names.len()).rev() {
        let j = rng.random_range(0..=i);
        names.swap(i, j);
    }
    for name in &names {
        index.delete(name);
    }

    println!(
        "\n=== Index micro-benchmark (us): backend={}, t={}, keys={}, height={} ===",
        config.backend,
        config.btree_min_degree,
        format_with_commas(keys as f64),
        height
    );
    print_header();
    for (op, samples) in [
        ("insert", std::mem::take(&mut index.insert_us)),
        ("lookup", std::mem::take(&mut index.lookup_us)),
        ("delete", std::mem::take(&mut index.delete_us)),
    ] {
        if let Some(summary) = summarize(samples) {
            print_row(op, &summary);
        }
    }
    println!(
        "  iterate: {} entries in {:.3} ms ({} entries/sec)",
        format_with_commas(iterated as f64),
        iterate_secs * 1_000.0,
        format_with_commas(iterated as f64 / iterate_secs.max(f64::EPSILON))
    );
    Ok(())
}
