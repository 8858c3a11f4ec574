//! sovereign_governance
//!
//! Composes detector -> simulator -> deliberator -> audit into the
//! detect/simulate/deliberate/intervene circuit of `spec.md` §4.7. Holds no
//! intervention code itself -- the deliberated outcome is a data value
//! returned to the external caller.

use sovereign_audit_log::{AuditAppender, AuditLogError};
use sovereign_audit_spec::{AuditEvent, GovernRecorded, ScenarioRecord, ThresholdScanRecorded, Vote};
use sovereign_common::RootContext;
use sovereign_deliberator::{deliberate, StakeholderVote};
use sovereign_simulator::rank_scenarios;
use sovereign_threshold::{ThresholdConfig, ThresholdError};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("threshold detector timed out scanning {path}")]
    DetectorTimeout { path: String },
    #[error("threshold detector failed: {0}")]
    DetectorFailure(#[from] ThresholdError),
    #[error("audit chain broken at line {line}")]
    ChainBroken { line: usize },
    #[error("audit log error: {0}")]
    AuditLog(#[from] AuditLogError),
}

fn now_ts() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs_f64()
}

pub struct GovernanceCircuit {
    root: RootContext,
    config: ThresholdConfig,
    reversibility_floor: f64,
}

impl GovernanceCircuit {
    pub fn new(root: RootContext) -> Self {
        Self {
            root,
            config: ThresholdConfig::default(),
            reversibility_floor: 0.3,
        }
    }

    pub fn with_config(mut self, config: ThresholdConfig) -> Self {
        self.config = config;
        self
    }

    fn audit_path(&self) -> std::path::PathBuf {
        self.root.governance_audit_path()
    }

    fn verify_or_chain_broken(&self) -> Result<(), GovernanceError> {
        if !self.audit_path().exists() {
            return Ok(());
        }
        match sovereign_audit_log::verify_log(self.audit_path()) {
            Ok(_) => Ok(()),
            Err(AuditLogError::HashMismatch { line, .. }) => Err(GovernanceError::ChainBroken { line }),
            Err(other) => Err(GovernanceError::AuditLog(other)),
        }
    }

    pub fn scan_thresholds(
        &self,
        target: &Path,
        recursive: bool,
        actor: &str,
    ) -> Result<sovereign_threshold::ThresholdReport, GovernanceError> {
        self.verify_or_chain_broken()?;

        let report = sovereign_threshold::scan(target, recursive, &self.config)?;
        if !report.complete {
            tracing::warn!(path = %target.display(), "threshold scan timed out; returning partial results");
        }

        let mut appender = AuditAppender::open(self.audit_path())?;
        appender.append(AuditEvent::ThresholdScan(ThresholdScanRecorded {
            schema_version: 1,
            entry_id: Uuid::new_v4(),
            ts: now_ts(),
            actor: actor.to_string(),
            target: target.display().to_string(),
            events: report.events.clone(),
            complete: report.complete,
        }))?;

        Ok(report)
    }

    /// Reruns the detector on `target`, ranks scenarios, folds the single
    /// caller vote into the deliberator, and writes one chained audit
    /// entry recording the outcome. `govern` exposes a single-vote
    /// convenience call over `sovereign_deliberator`'s general
    /// multi-stakeholder API (see DESIGN.md).
    pub fn govern(
        &self,
        target: &str,
        vote: Vote,
        rationale: Option<String>,
        actor: &str,
    ) -> Result<GovernRecorded, GovernanceError> {
        self.verify_or_chain_broken()?;

        let report = sovereign_threshold::scan(Path::new(target), true, &self.config)?;
        if !report.complete {
            return Err(GovernanceError::DetectorTimeout {
                path: target.to_string(),
            });
        }

        let ranking = rank_scenarios(&report.events);
        let ranking_records: Vec<ScenarioRecord> = ranking.iter().map(|s| s.to_record()).collect();
        let top_violations = ranking.first().map(|s| s.projected_violations.clone()).unwrap_or_default();

        let votes = vec![StakeholderVote {
            stakeholder: actor.to_string(),
            vote,
            rationale: rationale.clone(),
            cited_reversibility: None,
        }];
        let result = deliberate(&votes, &top_violations, self.reversibility_floor);

        let action = match result.outcome {
            Vote::Proceed => "intervention_approved",
            Vote::Pause => "intervention_paused",
            Vote::Reject => "intervention_rejected",
        };

        let mut appender = AuditAppender::open(self.audit_path())?;
        let entry_id = Uuid::new_v4();
        let record = GovernRecorded {
            schema_version: 1,
            entry_id,
            ts: now_ts(),
            actor: actor.to_string(),
            action: action.to_string(),
            target: target.to_string(),
            vote,
            rationale,
            events: report.events,
            ranking: ranking_records,
            outcome: result.outcome,
            dissent: result.dissent,
        };
        appender.append(AuditEvent::Govern(record.clone()))?;

        Ok(record)
    }

    pub fn verify_audit(&self) -> Result<String, GovernanceError> {
        if !self.audit_path().exists() {
            return Ok(sovereign_audit_log::genesis_hash());
        }
        sovereign_audit_log::verify_log(self.audit_path()).map_err(|e| match e {
            AuditLogError::HashMismatch { line, .. } => GovernanceError::ChainBroken { line },
            other => GovernanceError::AuditLog(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn govern_produces_chained_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let root = RootContext::new(tmp.path());
        let circuit = GovernanceCircuit::new(root);

        let target_dir = tmp.path().join("watched");
        std::fs::create_dir_all(&target_dir).unwrap();

        let first = circuit
            .govern(target_dir.to_str().unwrap(), Vote::Proceed, None, "operator")
            .unwrap();
        let second = circuit
            .govern(target_dir.to_str().unwrap(), Vote::Proceed, Some("looks fine".into()), "operator")
            .unwrap();

        assert_ne!(first.entry_id, second.entry_id);
        assert!(circuit.verify_audit().is_ok());
    }

    #[test]
    fn tampered_audit_log_blocks_further_governance() {
        let tmp = tempfile::tempdir().unwrap();
        let root = RootContext::new(tmp.path());
        let circuit = GovernanceCircuit::new(root);

        let target_dir = tmp.path().join("watched");
        std::fs::create_dir_all(&target_dir).unwrap();
        circuit
            .govern(target_dir.to_str().unwrap(), Vote::Proceed, None, "operator")
            .unwrap();

        let path = circuit.audit_path();
        let contents = std::fs::read_to_string(&path).unwrap();
        let tampered = contents.replace("operator", "TAMPERED");
        std::fs::write(&path, tampered).unwrap();

        let err = circuit
            .govern(target_dir.to_str().unwrap(), Vote::Proceed, None, "operator")
            .unwrap_err();
        assert!(matches!(err, GovernanceError::ChainBroken { .. }));
    }
}
