//! sovereign_compaction
//!
//! Bounded FIFO ring of session summaries, capacity exactly three,
//! persisted as a single JSON document under a file-level advisory lock
//! (`spec.md` §4.10, §5).

use fs4::FileExt;
use serde::{Deserialize, Serialize};
use sovereign_common::{atomic_write, RootContext};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const CAPACITY: usize = 3;

#[derive(Debug, Error)]
pub enum CompactionError {
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("json error")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionSummary {
    pub timestamp: f64,
    pub summary_text: String,
    pub session_id: String,
    pub compaction_number: u64,
    pub key_points: Vec<String>,
    pub active_tasks: Vec<String>,
    pub recent_breakthroughs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompactionBuffer {
    pub entries: VecDeque<CompactionSummary>,
    pub compaction_number: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactionStats {
    pub capacity: String,
    pub total_compactions: u64,
}

pub struct CompactionStore {
    root: RootContext,
}

impl CompactionStore {
    pub fn new(root: RootContext) -> Self {
        Self { root }
    }

    fn path(&self) -> std::path::PathBuf {
        self.root.compaction_path()
    }

    fn load(&self) -> Result<CompactionBuffer, CompactionError> {
        let path = self.path();
        if !path.exists() {
            return Ok(CompactionBuffer::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn store(
        &self,
        summary_text: &str,
        session_id: &str,
        key_points: Vec<String>,
        active_tasks: Vec<String>,
        recent_breakthroughs: Vec<String>,
    ) -> Result<CompactionSummary, CompactionError> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock_path = path.with_extension("lock");
        let lock_file = OpenOptions::new().create(true).write(true).open(&lock_path)?;
        lock_file.lock_exclusive()?;

        let result = (|| {
            let mut buffer = self.load()?;
            buffer.compaction_number += 1;
            let summary = CompactionSummary {
                timestamp: SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs_f64(),
                summary_text: summary_text.to_string(),
                session_id: session_id.to_string(),
                compaction_number: buffer.compaction_number,
                key_points,
                active_tasks,
                recent_breakthroughs,
            };

            if buffer.entries.len() >= CAPACITY {
                buffer.entries.pop_front();
            }
            buffer.entries.push_back(summary.clone());

            atomic_write(&path, &serde_json::to_vec_pretty(&buffer)?)?;
            Ok(summary)
        })();

        FileExt::unlock(&lock_file)?;
        result
    }

    pub fn get_context(&self) -> Result<Vec<CompactionSummary>, CompactionError> {
        Ok(self.load()?.entries.into_iter().collect())
    }

    /// Renders the current buffer as UTF-8 text for direct agent
    /// consumption, oldest entry first.
    pub fn get_context_text(&self) -> Result<String, CompactionError> {
        let entries = self.get_context()?;
        if entries.is_empty() {
            return Ok("No compaction summaries recorded yet.".to_string());
        }
        let mut out = String::new();
        for entry in entries {
            out.push_str(&format!(
                "## Compaction #{} (session {})\n{}\n",
                entry.compaction_number, entry.session_id, entry.summary_text
            ));
            if !entry.key_points.is_empty() {
                out.push_str(&format!("Key points: {}\n", entry.key_points.join("; ")));
            }
            if !entry.active_tasks.is_empty() {
                out.push_str(&format!("Active tasks: {}\n", entry.active_tasks.join("; ")));
            }
            if !entry.recent_breakthroughs.is_empty() {
                out.push_str(&format!("Recent breakthroughs: {}\n", entry.recent_breakthroughs.join("; ")));
            }
            out.push('\n');
        }
        Ok(out)
    }

    pub fn get_stats(&self) -> Result<CompactionStats, CompactionError> {
        let buffer = self.load()?;
        Ok(CompactionStats {
            capacity: format!("{}/{}", buffer.entries.len(), CAPACITY),
            total_compactions: buffer.compaction_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_evicts_oldest_past_capacity() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CompactionStore::new(RootContext::new(tmp.path()));

        for label in ["S1", "S2", "S3", "S4"] {
            store.store(label, "session-a", vec![], vec![], vec![]).unwrap();
        }

        let context = store.get_context().unwrap();
        let labels: Vec<&str> = context.iter().map(|s| s.summary_text.as_str()).collect();
        assert_eq!(labels, vec!["S2", "S3", "S4"]);

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.capacity, "3/3");
        assert_eq!(stats.total_compactions, 4);
    }
}
