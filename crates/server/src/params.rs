//! JSON-Schema-shaped argument structs for every MCP tool, grounded on the
//! `other_examples` memory-mcp server's `#[derive(JsonSchema)]` + `#[schemars]`
//! parameter idiom.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_dry_run() -> bool {
    false
}
fn default_recall_limit() -> usize {
    10
}
fn default_inherit_limit() -> usize {
    20
}
fn default_recursive() -> bool {
    true
}
fn default_actor() -> String {
    "agent".to_string()
}
fn default_session() -> String {
    "default".to_string()
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RouteParams {
    #[schemars(description = "Packet of scalar fields to route and persist")]
    pub packet: serde_json::Map<String, serde_json::Value>,
    #[schemars(description = "Routing template, e.g. 'outcome={outcome}/decile(step)/{step}.json'")]
    pub schema: String,
    #[schemars(description = "If true, compute the destination path without writing")]
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeriveParams {
    #[schemars(description = "Corpus of previously-routed paths to infer a schema from")]
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ScanThresholdsParams {
    #[schemars(description = "Subtree path to scan")]
    pub path: String,
    #[schemars(description = "Recurse into subdirectories")]
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VoteParam {
    Proceed,
    Pause,
    Reject,
}

impl From<VoteParam> for sovereign_audit_spec::Vote {
    fn from(v: VoteParam) -> Self {
        match v {
            VoteParam::Proceed => sovereign_audit_spec::Vote::Proceed,
            VoteParam::Pause => sovereign_audit_spec::Vote::Pause,
            VoteParam::Reject => sovereign_audit_spec::Vote::Reject,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GovernParams {
    #[schemars(description = "Target path the intervention would apply to")]
    pub target: String,
    #[schemars(description = "Caller's vote: proceed, pause, or reject")]
    pub vote: VoteParam,
    #[schemars(description = "Optional rationale for the vote")]
    pub rationale: Option<String>,
    #[schemars(description = "Identity of the voting stakeholder")]
    #[serde(default = "default_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LayerParam {
    GroundTruth,
    Hypothesis,
    OpenThread,
}

impl From<LayerParam> for sovereign_chronicle::InsightLayer {
    fn from(l: LayerParam) -> Self {
        match l {
            LayerParam::GroundTruth => sovereign_chronicle::InsightLayer::GroundTruth,
            LayerParam::Hypothesis => sovereign_chronicle::InsightLayer::Hypothesis,
            LayerParam::OpenThread => sovereign_chronicle::InsightLayer::OpenThread,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecordInsightParams {
    pub domain: String,
    pub content: String,
    pub intensity: f64,
    pub layer: LayerParam,
    #[schemars(description = "Required when layer=hypothesis, forbidden otherwise")]
    pub confidence: Option<f64>,
    #[serde(default = "default_session")]
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecallInsightsParams {
    pub domain: Option<String>,
    pub layer: Option<LayerParam>,
    #[serde(default = "default_recall_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecordLearningParams {
    pub what_happened: String,
    pub what_learned: String,
    pub applies_to: String,
    #[serde(default = "default_session")]
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CheckMistakesParams {
    pub context: String,
    #[serde(default = "default_recall_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecordOpenThreadParams {
    pub question: String,
    pub context: String,
    pub domain: String,
    #[serde(default = "default_session")]
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ResolveThreadParams {
    pub domain: String,
    pub question_fragment: String,
    pub resolution: String,
    #[serde(default = "default_session")]
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetOpenThreadsParams {
    pub domain: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetInheritableContextParams {
    #[serde(default = "default_inherit_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SpiralStatusParams {
    #[serde(default = "default_session")]
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SpiralReflectParams {
    pub observation: String,
    #[serde(default = "default_session")]
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SpiralInheritParams {
    #[schemars(description = "Id for the new, inheriting session")]
    pub new_session_id: String,
    #[schemars(description = "Prior session to inherit from; most recently updated if omitted")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoreCompactionSummaryParams {
    pub summary_text: String,
    #[serde(default = "default_session")]
    pub session_id: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub active_tasks: Vec<String>,
    #[serde(default)]
    pub recent_breakthroughs: Vec<String>,
}
