//! sovereign_threshold
//!
//! Read-only subtree scanner evaluating five configured metrics
//! (file_count, depth, entropy, self_reference, growth_rate) and emitting
//! `ThresholdEventRecord`s, cooperatively yielding to a wall-clock deadline
//! at each directory boundary.

use sovereign_audit_spec::{Severity, ThresholdEventRecord};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThresholdError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("scan root does not exist: {0}")]
    MissingRoot(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ThresholdConfig {
    pub max_files_per_dir: usize,
    pub max_depth: usize,
    pub max_entropy: f64,
    pub max_growth_per_window: usize,
    pub growth_window_secs: u64,
    pub timeout: Duration,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            max_files_per_dir: 200,
            max_depth: 12,
            max_entropy: 4.5,
            max_growth_per_window: 50,
            growth_window_secs: 3600,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdReport {
    pub events: Vec<ThresholdEventRecord>,
    pub complete: bool,
}

pub fn scan(scan_root: &Path, recursive: bool, config: &ThresholdConfig) -> Result<ThresholdReport, ThresholdError> {
    if !scan_root.exists() {
        return Err(ThresholdError::MissingRoot(scan_root.to_path_buf()));
    }

    let deadline = Instant::now() + config.timeout;
    let mut events = Vec::new();
    let mut complete = true;

    let mut stack = vec![(scan_root.to_path_buf(), 0usize)];

    while let Some((dir, depth)) = stack.pop() {
        if Instant::now() >= deadline {
            complete = false;
            break;
        }

        scan_directory(&dir, depth, scan_root, config, &mut events)?;

        if depth + 1 > config.max_depth {
            let observed = (depth + 1) as f64;
            events.push(ThresholdEventRecord {
                metric: "depth".into(),
                path: dir.display().to_string(),
                observed,
                limit: config.max_depth as f64,
                severity: Severity::Warning,
            });
        }

        if recursive {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    stack.push((entry.path(), depth + 1));
                }
            }
        }
    }

    Ok(ThresholdReport { events, complete })
}

fn scan_directory(
    dir: &Path,
    depth: usize,
    scan_root: &Path,
    config: &ThresholdConfig,
    events: &mut Vec<ThresholdEventRecord>,
) -> Result<(), ThresholdError> {
    let mut filenames = Vec::new();
    let mut mtimes = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            if let Some(name) = entry.file_name().to_str() {
                filenames.push(name.to_string());
            }
            if let Ok(meta) = entry.metadata() {
                if let Ok(modified) = meta.modified() {
                    mtimes.push(modified);
                }
            }
        }
    }

    let file_count = filenames.len();
    if file_count > config.max_files_per_dir {
        events.push(ThresholdEventRecord {
            metric: "file_count".into(),
            path: dir.display().to_string(),
            observed: file_count as f64,
            limit: config.max_files_per_dir as f64,
            severity: Severity::Warning,
        });
    }

    let entropy = filename_entropy(&filenames);
    if entropy > config.max_entropy {
        events.push(ThresholdEventRecord {
            metric: "entropy".into(),
            path: dir.display().to_string(),
            observed: entropy,
            limit: config.max_entropy,
            severity: Severity::Warning,
        });
    }

    if let Some(cycle_at) = self_reference_cycle(dir, scan_root, &filenames) {
        events.push(ThresholdEventRecord {
            metric: "self_reference".into(),
            path: cycle_at,
            observed: 1.0,
            limit: 0.0,
            severity: Severity::Critical,
        });
    }

    if let Some(peak) = growth_violation(&mtimes, config) {
        events.push(ThresholdEventRecord {
            metric: "growth_rate".into(),
            path: dir.display().to_string(),
            observed: peak as f64,
            limit: config.max_growth_per_window as f64,
            severity: Severity::Warning,
        });
    }

    let _ = depth;
    Ok(())
}

fn filename_entropy(filenames: &[String]) -> f64 {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut total = 0usize;
    for name in filenames {
        for token in name.split(|c| c == '.' || c == '_' || c == '-') {
            if token.is_empty() {
                continue;
            }
            *counts.entry(token.to_lowercase()).or_insert(0) += 1;
            total += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    -counts
        .values()
        .map(|&c| {
            let p = c as f64 / total;
            p * p.log2()
        })
        .sum::<f64>()
}

/// A directory is self-referential if one of its filenames (minus
/// extension), case-insensitively, matches an ancestor directory's name at
/// or above the scan root.
fn self_reference_cycle(dir: &Path, scan_root: &Path, filenames: &[String]) -> Option<String> {
    let mut ancestors: Vec<String> = Vec::new();
    let mut cur = Some(dir);
    while let Some(d) = cur {
        if let Some(name) = d.file_name().and_then(|n| n.to_str()) {
            ancestors.push(name.to_lowercase());
        }
        if d == scan_root {
            break;
        }
        cur = d.parent();
    }

    for name in filenames {
        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name)
            .to_lowercase();
        if ancestors.iter().any(|a| *a == stem) {
            return Some(dir.join(name).display().to_string());
        }
    }
    None
}

fn growth_violation(mtimes: &[std::time::SystemTime], config: &ThresholdConfig) -> Option<usize> {
    if mtimes.is_empty() || config.growth_window_secs == 0 {
        return None;
    }
    let now = SystemTime::now();
    let window = config.growth_window_secs;
    let mut buckets: HashMap<u64, usize> = HashMap::new();

    for mtime in mtimes {
        let age = now.duration_since(*mtime).unwrap_or_default().as_secs();
        let bucket = age / window;
        *buckets.entry(bucket).or_insert(0) += 1;
    }

    let peak = *buckets.values().max().unwrap_or(&0);
    if peak > config.max_growth_per_window {
        Some(peak)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn flags_excess_file_count() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..5 {
            fs::write(tmp.path().join(format!("f{i}.txt")), b"x").unwrap();
        }
        let config = ThresholdConfig {
            max_files_per_dir: 3,
            ..Default::default()
        };
        let report = scan(tmp.path(), true, &config).unwrap();
        assert!(report.complete);
        assert!(report.events.iter().any(|e| e.metric == "file_count"));
    }

    #[test]
    fn flags_self_reference_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("widgets");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("widgets.json"), b"{}").unwrap();

        let report = scan(tmp.path(), true, &ThresholdConfig::default()).unwrap();
        assert!(report.events.iter().any(|e| e.metric == "self_reference"));
    }

    #[test]
    fn timeout_returns_partial_incomplete_report() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), b"x").unwrap();

        let config = ThresholdConfig {
            timeout: Duration::from_nanos(1),
            ..Default::default()
        };
        std::thread::sleep(Duration::from_millis(2));
        let report = scan(tmp.path(), true, &config).unwrap();
        assert!(!report.complete);
    }
}
