//! sovereign_audit_log
//!
//! Append-only JSONL governance audit log with hash chaining.
//! - Each record includes: event, prev_hash, hash
//! - Hash is computed over canonical JSON of (prev_hash, event)
//! - A verifier replays and checks integrity end-to-end
//!
//! The log file is a singleton guarded by a file-level advisory lock held
//! for the duration of a single read-modify-write append (SPEC_FULL.md §9,
//! §14 / spec.md §5): concurrent `govern` calls serialize rather than race.

use fs4::FileExt;
use serde::{Deserialize, Serialize};
use sovereign_audit_spec::AuditEvent;
use sovereign_common::sha256_canonical_json;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditLogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("canonical json error: {0}")]
    Canon(#[from] sovereign_common::CanonError),
    #[error("hash mismatch at line {line}: expected {expected}, got {got}")]
    HashMismatch {
        line: usize,
        expected: String,
        got: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub prev_hash: String, // sha256:... or genesis for the first entry
    pub hash: String,
    pub event: AuditEvent,
}

#[derive(Debug, Clone, Serialize)]
struct HashPayload<'a> {
    prev_hash: &'a str,
    event: &'a AuditEvent,
}

pub fn genesis_hash() -> String {
    "sha256:0000000000000000000000000000000000000000000000000000000000000000".to_string()
}

pub fn compute_record_hash(prev_hash: &str, event: &AuditEvent) -> Result<String, AuditLogError> {
    let payload = HashPayload { prev_hash, event };
    Ok(sha256_canonical_json(&payload)?)
}

/// Append-only handle onto a single audit log file. Each `append` call
/// acquires an exclusive advisory lock, re-reads the current tail hash from
/// disk, appends the new record, and releases the lock -- so two processes
/// (or two tool handlers in the same process) never interleave writes.
pub struct AuditAppender {
    path: std::path::PathBuf,
}

impl AuditAppender {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditLogError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path })
    }

    fn last_hash_locked(file: &File) -> Result<String, AuditLogError> {
        let mut file = file.try_clone()?;
        file.seek(SeekFrom::Start(0))?;
        let reader = BufReader::new(&file);
        let mut last = genesis_hash();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let rec: AuditRecord = serde_json::from_str(&line)?;
            last = rec.hash;
        }
        Ok(last)
    }

    pub fn append(&mut self, event: AuditEvent) -> Result<AuditRecord, AuditLogError> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let result = (|| {
            let prev_hash = Self::last_hash_locked(&file)?;
            let hash = compute_record_hash(&prev_hash, &event)?;
            let record = AuditRecord {
                prev_hash,
                hash,
                event,
            };
            let line = serde_json::to_string(&record)?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
            file.flush()?;
            Ok(record)
        })();

        FileExt::unlock(&file)?;
        result
    }
}

pub fn verify_log(path: impl AsRef<Path>) -> Result<String, AuditLogError> {
    let f = File::open(path)?;
    let reader = BufReader::new(f);
    let mut expected_prev = genesis_hash();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let rec: AuditRecord = serde_json::from_str(&line)?;
        if rec.prev_hash != expected_prev {
            return Err(AuditLogError::HashMismatch {
                line: line_no,
                expected: expected_prev,
                got: rec.prev_hash,
            });
        }
        let computed = compute_record_hash(&rec.prev_hash, &rec.event)?;
        if computed != rec.hash {
            return Err(AuditLogError::HashMismatch {
                line: line_no,
                expected: computed,
                got: rec.hash,
            });
        }
        expected_prev = rec.hash;
    }

    Ok(expected_prev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sovereign_audit_spec::*;
    use std::fs;
    use uuid::Uuid;

    fn threshold_event(path: &str) -> AuditEvent {
        AuditEvent::ThresholdScan(ThresholdScanRecorded {
            schema_version: 1,
            entry_id: Uuid::new_v4(),
            ts: 1.0,
            actor: "governance".into(),
            target: path.into(),
            events: vec![],
            complete: true,
        })
    }

    #[test]
    fn hash_chain_verifies() {
        let tmp = std::env::temp_dir().join("sovereign_audit_test.jsonl");
        let _ = fs::remove_file(&tmp);

        let mut app = AuditAppender::open(&tmp).unwrap();
        app.append(threshold_event("memory/")).unwrap();

        let last = verify_log(&tmp).unwrap();
        assert!(last.starts_with("sha256:"));
    }

    #[test]
    fn first_entry_has_genesis_prev_hash() {
        let tmp = std::env::temp_dir().join("sovereign_audit_genesis_test.jsonl");
        let _ = fs::remove_file(&tmp);

        let mut app = AuditAppender::open(&tmp).unwrap();
        let rec = app.append(threshold_event("memory/")).unwrap();
        assert_eq!(rec.prev_hash, genesis_hash());
    }

    #[test]
    fn tampering_breaks_the_chain() {
        let tmp = std::env::temp_dir().join("sovereign_audit_tamper_test.jsonl");
        let _ = fs::remove_file(&tmp);

        let mut app = AuditAppender::open(&tmp).unwrap();
        app.append(threshold_event("memory/a")).unwrap();
        app.append(threshold_event("memory/b")).unwrap();

        let contents = fs::read_to_string(&tmp).unwrap();
        let mut lines: Vec<String> = contents.lines().map(String::from).collect();
        lines[0] = lines[0].replace("memory/a", "memory/TAMPERED");
        fs::write(&tmp, lines.join("\n") + "\n").unwrap();

        let err = verify_log(&tmp).unwrap_err();
        assert!(matches!(err, AuditLogError::HashMismatch { line: 1, .. }));
    }
}
