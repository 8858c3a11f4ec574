//! sovereign_deliberator
//!
//! Aggregates stakeholder votes by plurality with two ordered overrides
//! (`spec.md` §4.5): a reject citing low reversibility forces a pause, and
//! any critical projected violation requires unanimous proceed. Dissenting
//! rationale is preserved verbatim, never summarized.

use serde::{Deserialize, Serialize};
use sovereign_audit_spec::{DissentRecord, Severity, ThresholdEventRecord, Vote};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeholderVote {
    pub stakeholder: String,
    pub vote: Vote,
    pub rationale: Option<String>,
    pub cited_reversibility: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct DeliberationResult {
    pub outcome: Vote,
    pub dissent: Vec<DissentRecord>,
}

pub fn deliberate(
    votes: &[StakeholderVote],
    projected_violations: &[ThresholdEventRecord],
    reversibility_floor: f64,
) -> DeliberationResult {
    let outcome = if let Some(reject_vote) = votes.iter().find(|v| {
        v.vote == Vote::Reject && v.cited_reversibility.map(|r| r < reversibility_floor).unwrap_or(false)
    }) {
        let _ = reject_vote;
        Vote::Pause
    } else {
        let mut winner = plurality_winner(votes);
        let has_critical = projected_violations.iter().any(|v| v.severity == Severity::Critical);
        let unanimous_proceed = !votes.is_empty() && votes.iter().all(|v| v.vote == Vote::Proceed);
        if has_critical && winner == Vote::Proceed && !unanimous_proceed {
            winner = Vote::Pause;
        }
        winner
    };

    let dissent = votes
        .iter()
        .filter(|v| v.vote != outcome)
        .map(|v| DissentRecord {
            stakeholder: v.stakeholder.clone(),
            vote: v.vote,
            rationale: v.rationale.clone(),
        })
        .collect();

    DeliberationResult { outcome, dissent }
}

/// Most common vote wins; ties break toward the more cautious option
/// (`Pause` over `Reject` over `Proceed`).
fn plurality_winner(votes: &[StakeholderVote]) -> Vote {
    if votes.is_empty() {
        return Vote::Pause;
    }
    let count = |v: Vote| votes.iter().filter(|x| x.vote == v).count();
    let (proceed, pause, reject) = (count(Vote::Proceed), count(Vote::Pause), count(Vote::Reject));
    let max = proceed.max(pause).max(reject);

    if pause == max {
        Vote::Pause
    } else if reject == max {
        Vote::Reject
    } else {
        Vote::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(stakeholder: &str, v: Vote, cited_reversibility: Option<f64>) -> StakeholderVote {
        StakeholderVote {
            stakeholder: stakeholder.into(),
            vote: v,
            rationale: Some(format!("{stakeholder} rationale")),
            cited_reversibility,
        }
    }

    fn critical_event() -> ThresholdEventRecord {
        ThresholdEventRecord {
            metric: "self_reference".into(),
            path: "x".into(),
            observed: 1.0,
            limit: 0.0,
            severity: Severity::Critical,
        }
    }

    #[test]
    fn low_reversibility_reject_forces_pause() {
        let votes = vec![
            vote("a", Vote::Proceed, None),
            vote("b", Vote::Proceed, None),
            vote("c", Vote::Reject, Some(0.1)),
        ];
        let result = deliberate(&votes, &[], 0.5);
        assert_eq!(result.outcome, Vote::Pause);
        assert_eq!(result.dissent.len(), 3);
    }

    #[test]
    fn critical_violation_requires_unanimous_proceed() {
        let votes = vec![vote("a", Vote::Proceed, None), vote("b", Vote::Proceed, None), vote("c", Vote::Pause, None)];
        let result = deliberate(&votes, &[critical_event()], 0.5);
        assert_eq!(result.outcome, Vote::Pause);
    }

    #[test]
    fn unanimous_proceed_survives_critical_violation() {
        let votes = vec![vote("a", Vote::Proceed, None), vote("b", Vote::Proceed, None)];
        let result = deliberate(&votes, &[critical_event()], 0.5);
        assert_eq!(result.outcome, Vote::Proceed);
        assert!(result.dissent.is_empty());
    }

    #[test]
    fn dissent_preserves_rationale_verbatim() {
        let votes = vec![vote("a", Vote::Proceed, None), vote("b", Vote::Proceed, None), vote("c", Vote::Reject, None)];
        let result = deliberate(&votes, &[], 0.5);
        assert_eq!(result.outcome, Vote::Proceed);
        assert_eq!(result.dissent.len(), 1);
        assert_eq!(result.dissent[0].rationale.as_deref(), Some("c rationale"));
    }
}
