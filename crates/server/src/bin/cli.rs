//! `sovereign` operator CLI: verify the audit chain, route/derive packets,
//! run the governance circuit, or launch either MCP transport, all from a
//! shell. Grounded on the teacher workspace's `pie-control` CLI (clap
//! derive + one subcommand per operation).

use clap::{Parser, Subcommand};
use sovereign_audit_spec::Vote;
use sovereign_common::RootContext;
use sovereign_coherence::{Packet, Schema};
use sovereign_governance::GovernanceCircuit;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("coherence error: {0}")]
    Coherence(#[from] sovereign_coherence::CoherenceError),
    #[error("governance error: {0}")]
    Governance(#[from] sovereign_governance::GovernanceError),
    #[error("invalid vote: {0}")]
    InvalidVote(String),
    #[error("invalid bind address: {0}")]
    Addr(#[from] std::net::AddrParseError),
    #[error("server error: {0}")]
    Server(#[from] anyhow::Error),
}

#[derive(Parser)]
#[command(name = "sovereign", version, about = "Sovereign Stack operator CLI")]
struct Args {
    /// Overrides SOVEREIGN_ROOT / ~/.sovereign for this invocation
    #[arg(long)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify the governance audit log's hash chain and print the final hash.
    VerifyAudit,

    /// Route a packet (JSON object of scalar fields) to a path via a schema template.
    Route {
        /// Path to a JSON file containing the packet object
        #[arg(long)]
        packet_json: PathBuf,

        /// Routing template, e.g. 'outcome={outcome}/decile(step)/{step}.json'
        #[arg(long)]
        schema: String,

        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Infer a routing schema from a corpus of previously-routed paths.
    Derive {
        /// Paths to infer a schema from (repeat --path for each)
        #[arg(long = "path")]
        paths: Vec<String>,
    },

    /// Scan a subtree for threshold violations.
    ScanThresholds {
        #[arg(long)]
        target: PathBuf,

        #[arg(long, default_value_t = true)]
        recursive: bool,
    },

    /// Run the detect/simulate/deliberate circuit and record the outcome.
    Govern {
        #[arg(long)]
        target: String,

        /// proceed, pause, or reject
        #[arg(long)]
        vote: String,

        #[arg(long)]
        rationale: Option<String>,

        #[arg(long, default_value = "operator")]
        actor: String,
    },

    /// Run the MCP server over stdio transport (blocks until the peer disconnects).
    ServeStdio,

    /// Run the MCP server over SSE transport (blocks until ctrl-c).
    ServeSse {
        /// Address to bind, e.g. 127.0.0.1:8700. Defaults to SOVEREIGN_BIND or 127.0.0.1:8700.
        #[arg(long)]
        bind: Option<String>,
    },
}

fn parse_vote(raw: &str) -> Result<Vote, CliError> {
    match raw.to_lowercase().as_str() {
        "proceed" => Ok(Vote::Proceed),
        "pause" => Ok(Vote::Pause),
        "reject" => Ok(Vote::Reject),
        other => Err(CliError::InvalidVote(other.to_string())),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let args = Args::parse();
    let root = match args.root {
        Some(path) => RootContext::new(path),
        None => RootContext::from_env(),
    };
    root.ensure_exists()?;

    match args.cmd {
        Command::VerifyAudit => {
            let circuit = GovernanceCircuit::new(root);
            let hash = circuit.verify_audit()?;
            println!("{hash}");
            Ok(())
        }

        Command::Route { packet_json, schema, dry_run } => {
            let raw = std::fs::read_to_string(packet_json)?;
            let packet: Packet = serde_json::from_str(&raw)?;
            let schema = Schema::parse(&schema)?;
            let path = sovereign_coherence::transmit(&root, &packet, &schema, dry_run)?;
            println!("{}", path.display());
            Ok(())
        }

        Command::Derive { paths } => {
            let schema = sovereign_coherence::derive(&paths)?;
            println!("{}", schema.render_template());
            Ok(())
        }

        Command::ScanThresholds { target, recursive } => {
            let circuit = GovernanceCircuit::new(root);
            let report = circuit.scan_thresholds(&target, recursive, "operator")?;
            println!("{}", serde_json::to_string_pretty(&report.events)?);
            if !report.complete {
                eprintln!("warning: scan timed out before covering the whole subtree");
            }
            Ok(())
        }

        Command::Govern { target, vote, rationale, actor } => {
            let vote = parse_vote(&vote)?;
            let circuit = GovernanceCircuit::new(root);
            let record = circuit.govern(&target, vote, rationale, &actor)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }

        Command::ServeStdio => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(sovereign_server::run_stdio(root))?;
            Ok(())
        }

        Command::ServeSse { bind } => {
            let bind_addr: std::net::SocketAddr = bind
                .or_else(|| std::env::var("SOVEREIGN_BIND").ok())
                .unwrap_or_else(|| "127.0.0.1:8700".to_string())
                .parse()?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(sovereign_server::run_sse(root, bind_addr))?;
            Ok(())
        }
    }
}

