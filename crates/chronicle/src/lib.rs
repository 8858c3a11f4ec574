//! sovereign_chronicle
//!
//! A layered, append-only memory store: ground-truth / hypothesis /
//! open-thread insights, substring-scored learnings, and resolvable open
//! threads, plus the porous-inheritance package assembly of `spec.md` §4.9.
//! Grounded on the teacher workspace's `pie_episodes::EpisodeStore`
//! append-and-read-back pattern, generalized to Chronicle's three record
//! kinds and its disjoint-directory layer partition (so no separate index
//! file is needed -- the directory structure already partitions records).

use rand::Rng;
use serde::{Deserialize, Serialize};
use sovereign_common::{atomic_write, sanitize_segment, RootContext};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChronicleError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("json error")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightLayer {
    GroundTruth,
    Hypothesis,
    OpenThread,
}

impl InsightLayer {
    fn dirname(self) -> &'static str {
        match self {
            InsightLayer::GroundTruth => "ground_truth",
            InsightLayer::Hypothesis => "hypothesis",
            InsightLayer::OpenThread => "open_thread",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub timestamp: f64,
    pub domain: String,
    pub content: String,
    pub intensity: f64,
    pub layer: InsightLayer,
    pub confidence: Option<f64>,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learning {
    pub id: String,
    pub timestamp: f64,
    pub what_happened: String,
    pub what_learned: String,
    pub applies_to: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenThread {
    pub id: String,
    pub timestamp: f64,
    pub question: String,
    pub context: String,
    pub domain: String,
    pub resolved: bool,
    pub resolution: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HypothesisView {
    #[serde(flatten)]
    pub insight: Insight,
    pub note: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct InheritablePackage {
    pub ground_truth: Vec<Insight>,
    pub hypotheses: Vec<HypothesisView>,
    pub open_threads: Vec<OpenThread>,
}

fn now_secs() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs_f64()
}

fn new_id() -> String {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis();
    let suffix: u16 = rand::thread_rng().gen();
    format!("{millis}-{suffix:04x}")
}

fn safe_domain(domain: &str) -> Result<String, ChronicleError> {
    sanitize_segment(domain).ok_or_else(|| ChronicleError::InvalidInput(format!("unsafe domain: {domain}")))
}

/// Handle onto a single Chronicle tree rooted at `root.chronicle_dir()`.
pub struct ChronicleStore {
    root: RootContext,
}

impl ChronicleStore {
    pub fn new(root: RootContext) -> Self {
        Self { root }
    }

    fn insights_dir(&self) -> PathBuf {
        self.root.chronicle_dir().join("insights")
    }

    fn learnings_dir(&self) -> PathBuf {
        self.root.chronicle_dir().join("learnings")
    }

    fn open_threads_dir(&self) -> PathBuf {
        self.root.chronicle_dir().join("open_threads")
    }

    pub fn record_insight(
        &self,
        domain: &str,
        content: &str,
        intensity: f64,
        layer: InsightLayer,
        confidence: Option<f64>,
        session_id: &str,
    ) -> Result<String, ChronicleError> {
        match (layer, confidence) {
            (InsightLayer::Hypothesis, None) => {
                return Err(ChronicleError::InvalidInput(
                    "layer=hypothesis requires confidence".into(),
                ))
            }
            (InsightLayer::Hypothesis, Some(c)) if !(0.0..=1.0).contains(&c) => {
                return Err(ChronicleError::InvalidInput("confidence must be in [0,1]".into()))
            }
            (InsightLayer::GroundTruth, Some(_)) | (InsightLayer::OpenThread, Some(_)) => {
                return Err(ChronicleError::InvalidInput(
                    "confidence is forbidden unless layer=hypothesis".into(),
                ))
            }
            _ => {}
        }

        let domain_safe = safe_domain(domain)?;
        let id = new_id();
        let insight = Insight {
            id: id.clone(),
            timestamp: now_secs(),
            domain: domain_safe.clone(),
            content: content.to_string(),
            intensity,
            layer,
            confidence,
            session_id: session_id.to_string(),
        };

        let path = self
            .insights_dir()
            .join(&domain_safe)
            .join(layer.dirname())
            .join(format!("{id}.json"));
        atomic_write(&path, &serde_json::to_vec_pretty(&insight)?)?;
        Ok(id)
    }

    pub fn recall_insights(
        &self,
        domain: Option<&str>,
        layer: Option<InsightLayer>,
        limit: usize,
    ) -> Result<Vec<Insight>, ChronicleError> {
        let mut insights = self.read_insights(domain, layer)?;
        insights.sort_by(|a, b| b.timestamp.partial_cmp(&a.timestamp).unwrap());
        insights.truncate(limit);
        Ok(insights)
    }

    fn read_insights(&self, domain: Option<&str>, layer: Option<InsightLayer>) -> Result<Vec<Insight>, ChronicleError> {
        let base = self.insights_dir();
        if !base.exists() {
            return Ok(Vec::new());
        }

        let domain_dirs: Vec<PathBuf> = match domain {
            Some(d) => vec![base.join(safe_domain(d)?)],
            None => list_dirs(&base)?,
        };

        let mut out = Vec::new();
        for domain_dir in domain_dirs {
            let layer_dirs: Vec<PathBuf> = match layer {
                Some(l) => vec![domain_dir.join(l.dirname())],
                None => list_dirs(&domain_dir)?,
            };
            for layer_dir in layer_dirs {
                for file in list_json_files(&layer_dir)? {
                    let raw = std::fs::read_to_string(&file)?;
                    out.push(serde_json::from_str(&raw)?);
                }
            }
        }
        Ok(out)
    }

    pub fn record_learning(
        &self,
        what_happened: &str,
        what_learned: &str,
        applies_to: &str,
        session_id: &str,
    ) -> Result<String, ChronicleError> {
        let id = new_id();
        let learning = Learning {
            id: id.clone(),
            timestamp: now_secs(),
            what_happened: what_happened.to_string(),
            what_learned: what_learned.to_string(),
            applies_to: applies_to.to_string(),
            session_id: session_id.to_string(),
        };
        let path = self.learnings_dir().join(format!("{id}.json"));
        atomic_write(&path, &serde_json::to_vec_pretty(&learning)?)?;
        Ok(id)
    }

    pub fn check_mistakes(&self, context: &str, limit: usize) -> Result<Vec<Learning>, ChronicleError> {
        let dir = self.learnings_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let context_tokens = tokenize(context);

        let mut scored: Vec<(usize, Learning)> = Vec::new();
        for file in list_json_files(&dir)? {
            let raw = std::fs::read_to_string(&file)?;
            let learning: Learning = serde_json::from_str(&raw)?;
            let haystack = format!("{} {} {}", learning.what_happened, learning.what_learned, learning.applies_to);
            let score = overlap_score(&context_tokens, &tokenize(&haystack));
            if score > 0 {
                scored.push((score, learning));
            }
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.timestamp.partial_cmp(&a.1.timestamp).unwrap()));
        Ok(scored.into_iter().take(limit).map(|(_, l)| l).collect())
    }

    pub fn record_open_thread(
        &self,
        question: &str,
        context: &str,
        domain: &str,
        session_id: &str,
    ) -> Result<String, ChronicleError> {
        let domain_safe = safe_domain(domain)?;
        let id = new_id();
        let thread = OpenThread {
            id: id.clone(),
            timestamp: now_secs(),
            question: question.to_string(),
            context: context.to_string(),
            domain: domain_safe.clone(),
            resolved: false,
            resolution: None,
            session_id: session_id.to_string(),
        };
        let path = self.open_threads_dir().join(&domain_safe).join(format!("{id}.json"));
        atomic_write(&path, &serde_json::to_vec_pretty(&thread)?)?;
        Ok(id)
    }

    /// Finds the most recent unresolved thread in `domain` whose `question`
    /// contains `question_fragment`, marks it resolved in place, and emits
    /// a companion ground-truth insight citing the question and resolution
    /// (the one operation that writes two records per `spec.md` §4.2).
    pub fn resolve_thread(
        &self,
        domain: &str,
        question_fragment: &str,
        resolution: &str,
        session_id: &str,
    ) -> Result<String, ChronicleError> {
        let domain_safe = safe_domain(domain)?;
        let dir = self.open_threads_dir().join(&domain_safe);
        let mut candidates: Vec<(PathBuf, OpenThread)> = Vec::new();
        for file in list_json_files(&dir)? {
            let raw = std::fs::read_to_string(&file)?;
            let thread: OpenThread = serde_json::from_str(&raw)?;
            if !thread.resolved && thread.question.contains(question_fragment) {
                candidates.push((file, thread));
            }
        }
        candidates.sort_by(|a, b| b.1.timestamp.partial_cmp(&a.1.timestamp).unwrap());
        let (path, mut thread) = candidates.into_iter().next().ok_or_else(|| {
            ChronicleError::NotFound(format!("no unresolved thread matching '{question_fragment}' in {domain}"))
        })?;

        thread.resolved = true;
        thread.resolution = Some(resolution.to_string());
        atomic_write(&path, &serde_json::to_vec_pretty(&thread)?)?;

        self.record_insight(
            &domain_safe,
            &format!("Resolved: '{}' -> {}", thread.question, resolution),
            0.5,
            InsightLayer::GroundTruth,
            None,
            session_id,
        )?;

        Ok(thread.id)
    }

    pub fn get_open_threads(&self, domain: Option<&str>) -> Result<Vec<OpenThread>, ChronicleError> {
        let base = self.open_threads_dir();
        if !base.exists() {
            return Ok(Vec::new());
        }
        let domain_dirs: Vec<PathBuf> = match domain {
            Some(d) => vec![base.join(safe_domain(d)?)],
            None => list_dirs(&base)?,
        };

        let mut out = Vec::new();
        for domain_dir in domain_dirs {
            for file in list_json_files(&domain_dir)? {
                let raw = std::fs::read_to_string(&file)?;
                let thread: OpenThread = serde_json::from_str(&raw)?;
                if !thread.resolved {
                    out.push(thread);
                }
            }
        }
        out.sort_by(|a, b| b.timestamp.partial_cmp(&a.timestamp).unwrap());
        Ok(out)
    }

    /// Assembles the porous-inheritance package of `spec.md` §4.9: ground
    /// truth verbatim, hypotheses flagged non-canonical, open threads as
    /// invitations. The three lists are read from disjoint directories so
    /// they are disjoint by construction.
    pub fn get_inheritable_context(&self, limit: usize) -> Result<InheritablePackage, ChronicleError> {
        let ground_truth = self.recall_insights(None, Some(InsightLayer::GroundTruth), limit)?;
        let hypotheses = self
            .recall_insights(None, Some(InsightLayer::Hypothesis), limit)?
            .into_iter()
            .map(|insight| HypothesisView {
                insight,
                note: "offered, not canon",
            })
            .collect();
        let open_threads = self
            .get_open_threads(None)?
            .into_iter()
            .take(limit)
            .collect();
        Ok(InheritablePackage {
            ground_truth,
            hypotheses,
            open_threads,
        })
    }
}

fn list_dirs(base: &Path) -> Result<Vec<PathBuf>, ChronicleError> {
    if !base.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(base)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            out.push(entry.path());
        }
    }
    Ok(out)
}

fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>, ChronicleError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            out.push(path);
        }
    }
    Ok(out)
}

fn tokenize(s: &str) -> std::collections::BTreeSet<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

fn overlap_score(a: &std::collections::BTreeSet<String>, b: &std::collections::BTreeSet<String>) -> usize {
    a.intersection(b).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ChronicleStore) {
        let tmp = tempfile::tempdir().unwrap();
        let root = RootContext::new(tmp.path());
        let store = ChronicleStore::new(root);
        (tmp, store)
    }

    #[test]
    fn hypothesis_requires_confidence() {
        let (_tmp, store) = store();
        let err = store
            .record_insight("d", "content", 0.8, InsightLayer::Hypothesis, None, "s1")
            .unwrap_err();
        assert!(matches!(err, ChronicleError::InvalidInput(_)));

        let id = store
            .record_insight("d", "content", 0.8, InsightLayer::Hypothesis, Some(0.9), "s1")
            .unwrap();
        assert!(!id.is_empty());
    }

    #[test]
    fn ground_truth_forbids_confidence() {
        let (_tmp, store) = store();
        let err = store
            .record_insight("d", "content", 0.8, InsightLayer::GroundTruth, Some(0.5), "s1")
            .unwrap_err();
        assert!(matches!(err, ChronicleError::InvalidInput(_)));
    }

    #[test]
    fn recall_is_most_recent_first() {
        let (_tmp, store) = store();
        store.record_insight("d", "first", 0.1, InsightLayer::GroundTruth, None, "s1").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.record_insight("d", "second", 0.1, InsightLayer::GroundTruth, None, "s1").unwrap();

        let recalled = store.recall_insights(Some("d"), Some(InsightLayer::GroundTruth), 10).unwrap();
        assert_eq!(recalled.len(), 2);
        assert_eq!(recalled[0].content, "second");
    }

    #[test]
    fn resolve_thread_writes_companion_ground_truth_insight() {
        let (_tmp, store) = store();
        store.record_open_thread("does X scale?", "ctx", "d", "s1").unwrap();
        let id = store.resolve_thread("d", "scale", "yes, tested", "s1").unwrap();

        let threads = store.get_open_threads(Some("d")).unwrap();
        assert!(threads.is_empty());

        let ground_truths = store.recall_insights(Some("d"), Some(InsightLayer::GroundTruth), 10).unwrap();
        assert_eq!(ground_truths.len(), 1);
        assert!(ground_truths[0].content.contains("does X scale?"));
        assert!(ground_truths[0].content.contains("yes, tested"));
        assert!(!id.is_empty());
    }

    #[test]
    fn inheritable_context_keeps_layers_disjoint() {
        let (_tmp, store) = store();
        store.record_insight("d", "truth", 0.5, InsightLayer::GroundTruth, None, "A").unwrap();
        store.record_insight("d", "guess", 0.5, InsightLayer::Hypothesis, Some(0.4), "A").unwrap();
        store.record_open_thread("q?", "ctx", "d", "A").unwrap();

        let package = store.get_inheritable_context(20).unwrap();
        assert_eq!(package.ground_truth.len(), 1);
        assert_eq!(package.hypotheses.len(), 1);
        assert_eq!(package.open_threads.len(), 1);
        assert_eq!(package.hypotheses[0].note, "offered, not canon");
    }

    #[test]
    fn check_mistakes_scores_by_token_overlap() {
        let (_tmp, store) = store();
        store
            .record_learning("deployed without migration", "always run migrations first", "deploys", "s1")
            .unwrap();
        store
            .record_learning("unrelated incident", "unrelated lesson", "unrelated", "s1")
            .unwrap();

        let hits = store.check_mistakes("about to deploy a migration", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].applies_to, "deploys");
    }
}
