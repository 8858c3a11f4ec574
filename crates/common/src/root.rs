//! `RootContext` resolves the single on-disk root every subsystem writes
//! beneath, replacing the source repository's module-level root-path
//! singleton (see SPEC_FULL.md §3 / §9).

use std::path::{Path, PathBuf};

/// The resolved root directory for a Sovereign Stack instance. Passed by
/// value into every component constructor; tests substitute a `tempfile`
/// directory instead of touching `~/.sovereign`.
#[derive(Debug, Clone)]
pub struct RootContext {
    root: PathBuf,
}

impl RootContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve from `SOVEREIGN_ROOT`, falling back to `~/.sovereign`.
    pub fn from_env() -> Self {
        let root = std::env::var_os("SOVEREIGN_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".sovereign")
            });
        Self { root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.join("memory")
    }

    pub fn chronicle_dir(&self) -> PathBuf {
        self.join("chronicle")
    }

    pub fn spiral_dir(&self) -> PathBuf {
        self.join("spiral")
    }

    pub fn compaction_path(&self) -> PathBuf {
        self.join("compaction_memory").join("buffer.json")
    }

    pub fn governance_audit_path(&self) -> PathBuf {
        self.join("governance").join("audit.jsonl")
    }

    pub fn ensure_exists(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_composes_under_root() {
        let ctx = RootContext::new("/tmp/sovereign-test-root");
        assert_eq!(
            ctx.compaction_path(),
            PathBuf::from("/tmp/sovereign-test-root/compaction_memory/buffer.json")
        );
    }
}
