//! `sovereign-mcp-stdio` runs `SovereignServer` over stdio transport, for
//! agents that launch the server as a subprocess.

use sovereign_common::RootContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let repo_env = std::path::Path::new(".env");
    if repo_env.exists() {
        let _ = dotenvy::from_path(repo_env);
    }

    let root = RootContext::from_env();
    root.ensure_exists()?;

    sovereign_server::run_stdio(root).await
}
