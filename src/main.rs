//! Consensus oracle entry point.
//!
//! Loads configuration, initialises structured logging, builds the
//! configured oracle clients and either serves the resolution API or,
//! when invoked as `oracle-consensus resolve "<question>" [context]`,
//! resolves one question and prints the wire JSON.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use oracle_consensus::api::{
    self,
    routes::{ApiState, ResolveResponse},
};
use oracle_consensus::config::{self, AppConfig};
use oracle_consensus::engine::ConsensusEngine;
use oracle_consensus::llm;
use oracle_consensus::types::ResolutionRequest;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("ORACLE_CONFIG").unwrap_or_else(|_| config::DEFAULT_CONFIG_PATH.to_string());
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    info!(
        config = %config_path,
        threshold = cfg.consensus.agreement_threshold,
        provider_timeout_secs = cfg.consensus.provider_timeout_secs,
        "Consensus oracle starting up"
    );

    let clients = llm::build_clients(&cfg)?;
    let engine = ConsensusEngine::from_config(clients, &cfg.consensus);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("resolve") => {
            let question = args
                .get(1)
                .context("usage: oracle-consensus resolve \"<question>\" [context]")?;
            run_once(&engine, &cfg, question, args.get(2).cloned()).await
        }
        Some(other) => anyhow::bail!("unknown command: {other}"),
        None => serve(engine, &cfg).await,
    }
}

/// Resolve a single question and print the response JSON to stdout.
async fn run_once(
    engine: &ConsensusEngine,
    cfg: &AppConfig,
    question: &str,
    context: Option<String>,
) -> Result<()> {
    let request = ResolutionRequest {
        question: question.to_string(),
        context,
        agreement_threshold: cfg.consensus.agreement_threshold,
    };

    let result = engine.resolve(&request).await?;
    info!(%result, "Resolution complete");

    let response = ResolveResponse::from_result(result, chrono::Utc::now().timestamp());
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn serve(engine: ConsensusEngine, cfg: &AppConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid server address {}:{}",
                cfg.server.host, cfg.server.port
            )
        })?;

    info!(
        providers = ?engine.source_ids(),
        total_models = engine.total_models(),
        "Oracle providers ready"
    );

    let state = Arc::new(ApiState::new(engine, cfg.consensus.agreement_threshold));
    api::serve(state, addr, shutdown_signal()).await?;

    info!("Consensus oracle shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining in-flight requests");
}

/// Initialise the tracing subscriber.
///
/// Uses JSON format if `ORACLE_LOG_JSON` is set, otherwise human-readable.
/// Log level controlled by `RUST_LOG` env var (default: info).
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("oracle_consensus=info"));

    if std::env::var("ORACLE_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
