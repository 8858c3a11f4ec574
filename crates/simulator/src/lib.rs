//! sovereign_simulator
//!
//! Evaluates the five fixed intervention scenarios against a
//! `ThresholdEventRecord` corpus and ranks them by the fixed policy of
//! `spec.md` §4.4: higher reversibility first, then fewer projected
//! violations, then higher confidence.

use serde::{Deserialize, Serialize};
use sovereign_audit_spec::{ScenarioRecord, ThresholdEventRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Reorganize,
    Defer,
    Incremental,
    Proceed,
    Reject,
}

impl ScenarioKind {
    pub fn all() -> [ScenarioKind; 5] {
        [
            ScenarioKind::Reorganize,
            ScenarioKind::Defer,
            ScenarioKind::Incremental,
            ScenarioKind::Proceed,
            ScenarioKind::Reject,
        ]
    }

    fn label(self) -> &'static str {
        match self {
            ScenarioKind::Reorganize => "REORGANIZE",
            ScenarioKind::Defer => "DEFER",
            ScenarioKind::Incremental => "INCREMENTAL",
            ScenarioKind::Proceed => "PROCEED",
            ScenarioKind::Reject => "REJECT",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub kind: ScenarioKind,
    pub reversibility: f64,
    pub confidence: f64,
    pub projected_violations: Vec<ThresholdEventRecord>,
}

impl ScenarioOutcome {
    pub fn to_record(&self) -> ScenarioRecord {
        ScenarioRecord {
            kind: self.kind.label().to_string(),
            reversibility: self.reversibility,
            confidence: self.confidence,
            projected_violation_count: self.projected_violations.len(),
        }
    }
}

/// Evaluate a single scenario against the current violation corpus.
pub fn evaluate(events: &[ThresholdEventRecord], kind: ScenarioKind) -> ScenarioOutcome {
    match kind {
        ScenarioKind::Reorganize => {
            let entropy_violations = events.iter().filter(|e| e.metric == "entropy").count();
            let confidence = if events.is_empty() {
                1.0
            } else {
                entropy_violations as f64 / events.len() as f64
            };
            let projected_violations = events.iter().filter(|e| e.metric != "entropy").cloned().collect();
            ScenarioOutcome {
                kind,
                reversibility: 0.9,
                confidence,
                projected_violations,
            }
        }
        ScenarioKind::Defer => ScenarioOutcome {
            kind,
            reversibility: 1.0,
            confidence: 1.0,
            projected_violations: Vec::new(),
        },
        ScenarioKind::Incremental => {
            let half = (events.len() + 1) / 2;
            ScenarioOutcome {
                kind,
                reversibility: 0.7,
                confidence: 0.6,
                projected_violations: events.iter().take(half).cloned().collect(),
            }
        }
        ScenarioKind::Proceed => ScenarioOutcome {
            kind,
            reversibility: 0.2,
            confidence: 0.3,
            projected_violations: events.to_vec(),
        },
        ScenarioKind::Reject => ScenarioOutcome {
            kind,
            reversibility: 1.0,
            confidence: 1.0,
            projected_violations: events.to_vec(),
        },
    }
}

/// Evaluate and rank all five scenarios, most preferred first.
pub fn rank_scenarios(events: &[ThresholdEventRecord]) -> Vec<ScenarioOutcome> {
    let mut outcomes: Vec<ScenarioOutcome> = ScenarioKind::all().iter().map(|&k| evaluate(events, k)).collect();
    outcomes.sort_by(|a, b| {
        b.reversibility
            .partial_cmp(&a.reversibility)
            .unwrap()
            .then(a.projected_violations.len().cmp(&b.projected_violations.len()))
            .then(b.confidence.partial_cmp(&a.confidence).unwrap())
    });
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use sovereign_audit_spec::Severity;

    fn event(metric: &str) -> ThresholdEventRecord {
        ThresholdEventRecord {
            metric: metric.into(),
            path: "x".into(),
            observed: 10.0,
            limit: 5.0,
            severity: Severity::Warning,
        }
    }

    #[test]
    fn defer_has_zero_projected_violations() {
        let events = vec![event("file_count"), event("entropy")];
        let outcome = evaluate(&events, ScenarioKind::Defer);
        assert_eq!(outcome.reversibility, 1.0);
        assert!(outcome.projected_violations.is_empty());
    }

    #[test]
    fn incremental_halves_violations_rounded_up() {
        let events = vec![event("file_count"), event("entropy"), event("depth")];
        let outcome = evaluate(&events, ScenarioKind::Incremental);
        assert_eq!(outcome.projected_violations.len(), 2);
    }

    #[test]
    fn ranking_prefers_reversibility_then_fewer_violations_then_confidence() {
        let events = vec![event("file_count"), event("entropy")];
        let ranked = rank_scenarios(&events);
        assert_eq!(ranked[0].reversibility, 1.0);
        assert!(ranked.windows(2).all(|w| w[0].reversibility >= w[1].reversibility));
    }
}
