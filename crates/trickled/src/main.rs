//! trickled — serves a data stream to one client, a chunk per request.
//!
//! Usage: trickled [FILE]
//!
//! A FILE argument serves that file regardless of the configured source.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tokio::net::TcpListener;

use trickle_core::config::{SourceKind, TrickleConfig};
use trickle_services::TransferService;

const USAGE: &str = "usage: trickled [FILE]";

#[derive(Debug, PartialEq, Eq)]
enum Cli {
    Help,
    /// Serve, optionally overriding the configured source with a file.
    Serve(Option<PathBuf>),
}

fn parse_args(args: &[String]) -> Result<Cli> {
    match args {
        [] => Ok(Cli::Serve(None)),
        [flag] if flag == "-h" || flag == "--help" => Ok(Cli::Help),
        [flag] if flag.starts_with('-') => bail!("unknown option {flag}\n{USAGE}"),
        [file] => Ok(Cli::Serve(Some(PathBuf::from(file)))),
        _ => bail!("too many arguments\n{USAGE}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let file = match parse_args(&args)? {
        Cli::Help => {
            println!("{USAGE}");
            return Ok(());
        }
        Cli::Serve(file) => file,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load config
    if let Err(e) = TrickleConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = TrickleConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        TrickleConfig::default()
    });

    if let Some(path) = file {
        config.source.kind = SourceKind::File;
        config.source.path = path;
    }
    tracing::info!(
        source = ?config.source.kind,
        listen = %config.server.listen,
        chunk_size = config.chunk.chunk_size,
        "trickled starting"
    );

    let layout = config.chunk.layout()?;
    let source = trickle_services::from_config(&config.source, layout).await?;
    let transfer = TransferService::new(source);

    // ── Shutdown ─────────────────────────────────────────────────────────────
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutdown signal received");
    };

    let listener = TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen))?;

    let state = trickle_api::ApiState {
        transfer: transfer.clone(),
    };
    let served = trickle_api::serve(listener, state, shutdown).await;

    transfer.shutdown().await;
    tracing::info!("trickled stopped");
    served
}
