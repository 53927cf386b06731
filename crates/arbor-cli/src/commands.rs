//! One-shot command execution over a snapshot-backed tree.
//!
//! Each invocation loads the snapshot, applies the command against the
//! root, and saves the snapshot back — so consecutive shell commands share
//! state, as the REPL does within a single session.

use std::path::Path;

use arbor_common::{IndexConfig, InodeId, Result};
use arbor_fs::{Vfs, snapshot};
use tracing::debug;

/// A filesystem verb, shared between the one-shot CLI and the REPL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsCommand {
    Mkdir { path: String, parents: bool },
    Touch { path: String },
    Write { path: String, data: String },
    Read { path: String },
    Ls { path: String },
    Rm { path: String, recursive: bool },
    Stat { path: String },
}

impl FsCommand {
    /// Returns true when the command can change the tree (and the snapshot
    /// therefore needs re-saving).
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            FsCommand::Mkdir { .. }
                | FsCommand::Touch { .. }
                | FsCommand::Write { .. }
                | FsCommand::Rm { .. }
        )
    }
}

/// Applies `cmd` to `vfs`, resolving relative paths from `cwd`, writing
/// any output to stdout.
pub fn apply(vfs: &mut Vfs, cwd: InodeId, cmd: &FsCommand) -> Result<()> {
    match cmd {
        FsCommand::Mkdir { path, parents } => {
            vfs.mkdir(cwd, path, *parents)?;
        }
        FsCommand::Touch { path } => {
            vfs.touch(cwd, path)?;
        }
        FsCommand::Write { path, data } => {
            vfs.write(cwd, path, strip_quotes(data).as_bytes())?;
        }
        FsCommand::Read { path } => {
            let data = vfs.read(cwd, path)?;
            match std::str::from_utf8(&data) {
                Ok(text) => println!("{}", text),
                Err(_) => println!("{:?}", data.as_ref()),
            }
        }
        FsCommand::Ls { path } => {
            for entry in vfs.ls(cwd, path)? {
                println!("{:<4} {:>10}  {}", entry.kind, entry.size, entry.name);
            }
        }
        FsCommand::Rm { path, recursive } => {
            vfs.rm(cwd, path, *recursive)?;
        }
        FsCommand::Stat { path } => {
            let meta = vfs.metadata(cwd, path)?;
            println!("inode:    {}", meta.id);
            println!("kind:     {}", meta.kind);
            println!("size:     {}", meta.size);
            println!("created:  {}", meta.created.to_rfc3339());
            println!("modified: {}", meta.modified.to_rfc3339());
        }
    }
    Ok(())
}

/// Loads the snapshot, applies one command from the root, and saves the
/// snapshot back when the command mutated the tree.
pub fn run_one_shot(state: &Path, config: IndexConfig, cmd: &FsCommand) -> anyhow::Result<()> {
    let mut vfs = snapshot::load_or_default(state, config)?;
    debug!(nodes = vfs.node_count(), state = %state.display(), "snapshot loaded");

    let root = vfs.root();
    apply(&mut vfs, root, cmd)?;

    if cmd.is_mutation() {
        snapshot::save(&vfs, state)?;
        debug!(nodes = vfs.node_count(), "snapshot saved");
    }
    Ok(())
}

/// Drops one pair of matching surrounding quotes, so shell-style
/// `write /f "two words"` round-trips the inner text.
pub fn strip_quotes(data: &str) -> &str {
    let bytes = data.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &data[1..data.len() - 1]
    } else {
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::FsError;

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"hello world\""), "hello world");
        assert_eq!(strip_quotes("'hi'"), "hi");
        assert_eq!(strip_quotes("plain"), "plain");
        assert_eq!(strip_quotes("\"unbalanced"), "\"unbalanced");
        assert_eq!(strip_quotes("\""), "\"");
        assert_eq!(strip_quotes(""), "");
    }

    #[test]
    fn test_apply_roundtrip() {
        let mut vfs = Vfs::default();
        let root = vfs.root();

        apply(
            &mut vfs,
            root,
            &FsCommand::Mkdir {
                path: "/docs".to_string(),
                parents: false,
            },
        )
        .unwrap();
        apply(
            &mut vfs,
            root,
            &FsCommand::Write {
                path: "/docs/hello.txt".to_string(),
                data: "hi".to_string(),
            },
        )
        .unwrap();

        assert_eq!(vfs.read(root, "/docs/hello.txt").unwrap().as_ref(), b"hi");
    }

    #[test]
    fn test_apply_propagates_errors() {
        let mut vfs = Vfs::default();
        let root = vfs.root();
        let err = apply(
            &mut vfs,
            root,
            &FsCommand::Read {
                path: "/missing".to_string(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[test]
    fn test_is_mutation() {
        assert!(
            FsCommand::Rm {
                path: "/x".to_string(),
                recursive: false
            }
            .is_mutation()
        );
        assert!(
            !FsCommand::Ls {
                path: "/".to_string()
            }
            .is_mutation()
        );
        assert!(
            !FsCommand::Stat {
                path: "/".to_string()
            }
            .is_mutation()
        );
    }

    #[test]
    fn test_one_shot_persists_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.bin.gz");
        let config = IndexConfig::default();

        run_one_shot(
            &state,
            config,
            &FsCommand::Mkdir {
                path: "/persisted".to_string(),
                parents: false,
            },
        )
        .unwrap();

        let vfs = snapshot::load(&state).unwrap();
        assert!(vfs.resolve(vfs.root(), "/persisted").is_ok());
    }

    #[test]
    fn test_one_shot_error_leaves_snapshot_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.bin.gz");
        let config = IndexConfig::default();

        let result = run_one_shot(
            &state,
            config,
            &FsCommand::Read {
                path: "/missing".to_string(),
            },
        );
        assert!(result.is_err());
        assert!(!state.exists());
    }
}
