//! sovereign_server
//!
//! `SovereignServer` registers one `#[tool]` per row of `spec.md` §6's
//! tool catalog over `rmcp`'s `#[tool_router]`/`#[tool_handler]` macros,
//! grounded on the `other_examples` memory-mcp and attention-matters
//! reference servers. Three resources (`welcome`, `manifest`,
//! `spiral/state`) are registered via `ServerHandler::list_resources` /
//! `read_resource`.

pub mod error;
pub mod params;

use error::{ErrorKind, SovereignError};
use params::*;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use sovereign_chronicle::ChronicleStore;
use sovereign_coherence::{Packet, PacketValue, Schema};
use sovereign_common::RootContext;
use sovereign_compaction::CompactionStore;
use sovereign_governance::GovernanceCircuit;
use sovereign_spiral::SpiralStore;
use std::sync::Arc;
use std::time::Duration;

/// Default per-tool-call deadline (`spec.md` §5 / SPEC_FULL.md §14).
const TOOL_TIMEOUT: Duration = Duration::from_secs(30);

async fn with_timeout<F>(fut: F) -> Result<CallToolResult, McpError>
where
    F: std::future::Future<Output = Result<CallToolResult, McpError>>,
{
    match tokio::time::timeout(TOOL_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(McpError::internal_error("tool call exceeded the per-call deadline", None)),
    }
}

fn to_mcp_error(err: impl Into<SovereignError>) -> McpError {
    let err = err.into();
    match err.kind() {
        ErrorKind::Internal => McpError::internal_error(err.message.clone(), None),
        _ => McpError::invalid_params(err.to_string(), None),
    }
}

fn success_json<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn packet_from_json(raw: serde_json::Map<String, serde_json::Value>) -> Result<Packet, McpError> {
    let mut packet = Packet::new();
    for (key, value) in raw {
        let scalar = match value {
            serde_json::Value::String(s) => PacketValue::Str(s),
            serde_json::Value::Number(n) => PacketValue::Num(n.as_f64().unwrap_or_default()),
            serde_json::Value::Bool(b) => PacketValue::Bool(b),
            other => {
                return Err(to_mcp_error(SovereignError::new(
                    ErrorKind::InvalidInput,
                    format!("packet field '{key}' must be a scalar, got {other}"),
                )))
            }
        };
        packet.insert(key, scalar);
    }
    Ok(packet)
}

/// Runs the server over stdio transport until the peer disconnects.
/// Shared by `bin/stdio.rs` and the `sovereign serve-stdio` CLI subcommand.
pub async fn run_stdio(root: RootContext) -> anyhow::Result<()> {
    use rmcp::transport::stdio;
    use rmcp::ServiceExt;

    tracing::info!(root = %root.path().display(), "starting sovereign-mcp-stdio");
    let server = SovereignServer::new(root);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

/// Runs the server over SSE transport bound to `bind_addr`, merged with a
/// `GET /health` route, until ctrl-c. Shared by `bin/sse.rs` and the
/// `sovereign serve-sse` CLI subcommand.
pub async fn run_sse(root: RootContext, bind_addr: std::net::SocketAddr) -> anyhow::Result<()> {
    use axum::routing::get;
    use axum::Router;
    use rmcp::transport::sse_server::{SseServer, SseServerConfig};

    async fn health() -> axum::Json<serde_json::Value> {
        axum::Json(serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
    }

    tracing::info!(root = %root.path().display(), %bind_addr, "starting sovereign-mcp-sse");

    let config = SseServerConfig {
        bind: bind_addr,
        sse_path: "/sse".to_string(),
        post_path: "/messages".to_string(),
        ct: Default::default(),
        sse_keep_alive: None,
    };

    let (sse_server, sse_router) = SseServer::new(config);
    let cancellation = sse_server.with_service(move || SovereignServer::new(root.clone()));

    let app = Router::new().route("/health", get(health)).merge(sse_router);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let serve = axum::serve(listener, app);

    tokio::select! {
        result = serve => { result?; }
        _ = tokio::signal::ctrl_c() => {
            cancellation.cancel();
        }
    }

    Ok(())
}

#[derive(Clone)]
pub struct SovereignServer {
    root: RootContext,
    governance: Arc<GovernanceCircuit>,
    chronicle: Arc<ChronicleStore>,
    spiral: Arc<SpiralStore>,
    compaction: Arc<CompactionStore>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SovereignServer {
    pub fn new(root: RootContext) -> Self {
        Self {
            governance: Arc::new(GovernanceCircuit::new(root.clone())),
            chronicle: Arc::new(ChronicleStore::new(root.clone())),
            spiral: Arc::new(SpiralStore::new(root.clone())),
            compaction: Arc::new(CompactionStore::new(root.clone())),
            root,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Route a packet to a filesystem path via a schema template and persist it as JSON")]
    async fn route(&self, Parameters(params): Parameters<RouteParams>) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let schema = Schema::parse(&params.schema).map_err(to_mcp_error)?;
            let packet = packet_from_json(params.packet)?;
            let path =
                sovereign_coherence::transmit(&self.root, &packet, &schema, params.dry_run).map_err(to_mcp_error)?;
            success_json(&serde_json::json!({ "path": path.display().to_string() }))
        })
        .await
    }

    #[tool(description = "Infer a routing schema from a corpus of previously-routed paths")]
    async fn derive(&self, Parameters(params): Parameters<DeriveParams>) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let schema = sovereign_coherence::derive(&params.paths).map_err(to_mcp_error)?;
            success_json(&serde_json::json!({ "schema": schema.render_template() }))
        })
        .await
    }

    #[tool(description = "Scan a subtree for file_count/depth/entropy/self_reference/growth_rate threshold violations")]
    async fn scan_thresholds(
        &self,
        Parameters(params): Parameters<ScanThresholdsParams>,
    ) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let report = self
                .governance
                .scan_thresholds(std::path::Path::new(&params.path), params.recursive, "agent")
                .map_err(to_mcp_error)?;
            success_json(&serde_json::json!({ "events": report.events, "complete": report.complete }))
        })
        .await
    }

    #[tool(description = "Rerun detection, rank scenarios, deliberate on a vote, and append a chained audit entry")]
    async fn govern(&self, Parameters(params): Parameters<GovernParams>) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let decision = self
                .governance
                .govern(&params.target, params.vote.into(), params.rationale, &params.actor)
                .map_err(to_mcp_error)?;
            success_json(&serde_json::json!({ "decision": decision }))
        })
        .await
    }

    #[tool(description = "Record an insight in the ground_truth, hypothesis, or open_thread layer")]
    async fn record_insight(
        &self,
        Parameters(params): Parameters<RecordInsightParams>,
    ) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let id = self
                .chronicle
                .record_insight(
                    &params.domain,
                    &params.content,
                    params.intensity,
                    params.layer.into(),
                    params.confidence,
                    &params.session_id,
                )
                .map_err(to_mcp_error)?;
            success_json(&serde_json::json!({ "id": id }))
        })
        .await
    }

    #[tool(description = "Recall the most recent insights, optionally filtered by domain/layer")]
    async fn recall_insights(
        &self,
        Parameters(params): Parameters<RecallInsightsParams>,
    ) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let insights = self
                .chronicle
                .recall_insights(params.domain.as_deref(), params.layer.map(Into::into), params.limit)
                .map_err(to_mcp_error)?;
            success_json(&serde_json::json!({ "insights": insights }))
        })
        .await
    }

    #[tool(description = "Record a learning: what happened, what was learned, and what it applies to")]
    async fn record_learning(
        &self,
        Parameters(params): Parameters<RecordLearningParams>,
    ) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let id = self
                .chronicle
                .record_learning(&params.what_happened, &params.what_learned, &params.applies_to, &params.session_id)
                .map_err(to_mcp_error)?;
            success_json(&serde_json::json!({ "id": id }))
        })
        .await
    }

    #[tool(description = "Retrieve learnings scored by token overlap with the given context")]
    async fn check_mistakes(
        &self,
        Parameters(params): Parameters<CheckMistakesParams>,
    ) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let learnings = self.chronicle.check_mistakes(&params.context, params.limit).map_err(to_mcp_error)?;
            success_json(&serde_json::json!({ "learnings": learnings }))
        })
        .await
    }

    #[tool(description = "Record an open question with its context, to be resolved later")]
    async fn record_open_thread(
        &self,
        Parameters(params): Parameters<RecordOpenThreadParams>,
    ) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let id = self
                .chronicle
                .record_open_thread(&params.question, &params.context, &params.domain, &params.session_id)
                .map_err(to_mcp_error)?;
            success_json(&serde_json::json!({ "id": id }))
        })
        .await
    }

    #[tool(description = "Resolve the most recent unresolved thread matching a question fragment, emitting a companion ground-truth insight")]
    async fn resolve_thread(
        &self,
        Parameters(params): Parameters<ResolveThreadParams>,
    ) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let id = self
                .chronicle
                .resolve_thread(&params.domain, &params.question_fragment, &params.resolution, &params.session_id)
                .map_err(to_mcp_error)?;
            success_json(&serde_json::json!({ "id": id }))
        })
        .await
    }

    #[tool(description = "List unresolved open threads, optionally filtered by domain")]
    async fn get_open_threads(
        &self,
        Parameters(params): Parameters<GetOpenThreadsParams>,
    ) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let threads = self.chronicle.get_open_threads(params.domain.as_deref()).map_err(to_mcp_error)?;
            success_json(&serde_json::json!({ "open_threads": threads }))
        })
        .await
    }

    #[tool(description = "Assemble a porous-inheritance package: ground_truth, hypotheses, and open_threads")]
    async fn get_inheritable_context(
        &self,
        Parameters(params): Parameters<GetInheritableContextParams>,
    ) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let package = self.chronicle.get_inheritable_context(params.limit).map_err(to_mcp_error)?;
            success_json(&package)
        })
        .await
    }

    #[tool(description = "Return the current spiral session snapshot")]
    async fn spiral_status(&self, Parameters(params): Parameters<SpiralStatusParams>) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let state = self.spiral.status(&params.session_id).map_err(to_mcp_error)?;
            success_json(&state)
        })
        .await
    }

    #[tool(description = "Append a reflection observation, advancing the session's spiral phase")]
    async fn spiral_reflect(
        &self,
        Parameters(params): Parameters<SpiralReflectParams>,
    ) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let state = self.spiral.reflect(&params.session_id, &params.observation).map_err(to_mcp_error)?;
            success_json(&state)
        })
        .await
    }

    #[tool(description = "Start a new session that porously inherits from a prior one")]
    async fn spiral_inherit(
        &self,
        Parameters(params): Parameters<SpiralInheritParams>,
    ) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let state = self
                .spiral
                .inherit(&params.new_session_id, params.session_id.as_deref())
                .map_err(to_mcp_error)?;
            success_json(&state)
        })
        .await
    }

    #[tool(description = "Store a high-fidelity session summary in the three-entry compaction ring")]
    async fn store_compaction_summary(
        &self,
        Parameters(params): Parameters<StoreCompactionSummaryParams>,
    ) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let summary = self
                .compaction
                .store(
                    &params.summary_text,
                    &params.session_id,
                    params.key_points,
                    params.active_tasks,
                    params.recent_breakthroughs,
                )
                .map_err(to_mcp_error)?;
            success_json(&summary)
        })
        .await
    }

    #[tool(description = "Render the current compaction buffer as agent-consumable text")]
    async fn get_compaction_context(&self) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let text = self.compaction.get_context_text().map_err(to_mcp_error)?;
            Ok(CallToolResult::success(vec![Content::text(text)]))
        })
        .await
    }

    #[tool(description = "Report compaction buffer occupancy and total compactions performed")]
    async fn get_compaction_stats(&self) -> Result<CallToolResult, McpError> {
        with_timeout(async {
            let stats = self.compaction.get_stats().map_err(to_mcp_error)?;
            success_json(&stats)
        })
        .await
    }
}

const WELCOME_URI: &str = "welcome";
const MANIFEST_URI: &str = "manifest";
const SPIRAL_STATE_URI: &str = "spiral/state";

impl SovereignServer {
    fn welcome_text(&self) -> String {
        let recent = self
            .chronicle
            .recall_insights(None, Some(sovereign_chronicle::InsightLayer::GroundTruth), 5)
            .unwrap_or_default();
        let mut out = String::from("Sovereign Stack is online.\n\nRecent ground-truth insights:\n");
        if recent.is_empty() {
            out.push_str("(none recorded yet)\n");
        }
        for insight in recent {
            out.push_str(&format!("- [{}] {}\n", insight.domain, insight.content));
        }
        out
    }

    fn manifest_text(&self) -> String {
        let audit_ok = self.governance.verify_audit().is_ok();
        format!(
            "Sovereign Stack manifest\nroot: {}\ncomponents: coherence, chronicle, threshold, simulator, deliberator, audit_log, governance, spiral, compaction\naudit_chain_ok: {audit_ok}\n",
            self.root.path().display()
        )
    }

    fn spiral_state_text(&self) -> String {
        match self.spiral.status("default") {
            Ok(state) => serde_json::to_string_pretty(&state).unwrap_or_default(),
            Err(_) => "{}".to_string(),
        }
    }
}

#[tool_handler]
impl ServerHandler for SovereignServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Sovereign Stack: local memory, coherence routing, and governance server. \
                 Accumulates layered experiential memory across sessions, routes structured \
                 packets into a semantically-addressed filesystem, and runs a detect/simulate/ \
                 deliberate/intervene circuit with a tamper-evident audit log."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().enable_resources().build(),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let resources = vec![
            RawResource::new(WELCOME_URI, "welcome").no_annotation(),
            RawResource::new(MANIFEST_URI, "manifest").no_annotation(),
            RawResource::new(SPIRAL_STATE_URI, "spiral/state").no_annotation(),
        ];
        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        request: rmcp::model::ReadResourceRequestParam,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = match request.uri.as_str() {
            WELCOME_URI => self.welcome_text(),
            MANIFEST_URI => self.manifest_text(),
            SPIRAL_STATE_URI => self.spiral_state_text(),
            other => {
                return Err(McpError::resource_not_found(
                    format!("no such resource: {other}"),
                    None,
                ))
            }
        };
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }
}
