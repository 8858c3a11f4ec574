//! sovereign_audit_spec
//!
//! Strongly-typed governance audit events, generalized from the teacher
//! workspace's model-call audit events to the detect -> simulate ->
//! deliberate -> intervene circuit of SPEC_FULL.md §9-10.
//!
//! NOTE: schema_version increments are per-event, not global.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Proceed,
    Pause,
    Reject,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdEventRecord {
    pub metric: String,
    pub path: String,
    pub observed: f64,
    pub limit: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub kind: String,
    pub reversibility: f64,
    pub confidence: f64,
    pub projected_violation_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DissentRecord {
    pub stakeholder: String,
    pub vote: Vote,
    pub rationale: Option<String>,
}

/// A governance decision as persisted in the audit log. Mirrors
/// `spec.md` §3's `AuditEntry` shape (`ts, actor, action, target, vote?,
/// rationale?, prev_hash, hash`) -- `prev_hash`/`hash` are attached by
/// `sovereign_audit_log`, not by this type, so they are not duplicated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum AuditEvent {
    ThresholdScan(ThresholdScanRecorded),
    Govern(GovernRecorded),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdScanRecorded {
    pub schema_version: u8,
    pub entry_id: Uuid,
    pub ts: f64,
    pub actor: String,
    pub target: String,
    pub events: Vec<ThresholdEventRecord>,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernRecorded {
    pub schema_version: u8,
    pub entry_id: Uuid,
    pub ts: f64,
    pub actor: String,
    /// "intervention_approved" | "intervention_paused" | "intervention_rejected"
    pub action: String,
    pub target: String,
    pub vote: Vote,
    pub rationale: Option<String>,
    pub events: Vec<ThresholdEventRecord>,
    pub ranking: Vec<ScenarioRecord>,
    pub outcome: Vote,
    pub dissent: Vec<DissentRecord>,
}
