//! `sovereign-mcp-sse` runs `SovereignServer` over an SSE transport bound to
//! `/sse` (events) and `/messages` (client requests), merged with a small
//! `axum` router exposing `GET /health` (SPEC_FULL.md §13).

use sovereign_common::RootContext;
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let repo_env = std::path::Path::new(".env");
    if repo_env.exists() {
        let _ = dotenvy::from_path(repo_env);
    }

    let root = RootContext::from_env();
    root.ensure_exists()?;

    let bind_addr: SocketAddr = std::env::var("SOVEREIGN_BIND")
        .unwrap_or_else(|_| "127.0.0.1:8700".to_string())
        .parse()?;

    sovereign_server::run_sse(root, bind_addr).await
}
