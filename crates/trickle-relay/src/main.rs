//! trickle-relay — serves one file over the relay side channel.
//!
//! Usage: trickle-relay <FILE> [--listen <addr>]

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tokio::net::TcpListener;

use trickle_core::config::TrickleConfig;
use trickle_relay::RelayServer;
use trickle_services::FileSource;

const USAGE: &str = "usage: trickle-relay <FILE> [--listen <addr>]";

#[derive(Debug, PartialEq, Eq)]
enum Cli {
    Help,
    Serve {
        path: PathBuf,
        listen: Option<String>,
    },
}

fn parse_args(args: &[String]) -> Result<Cli> {
    let mut listen = None;
    let mut path: Option<PathBuf> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(Cli::Help),
            "--listen" => {
                i += 1;
                listen = Some(args.get(i).context("--listen requires a value")?.clone());
            }
            flag if flag.starts_with('-') => bail!("unknown option {flag}\n{USAGE}"),
            file if path.is_none() => path = Some(PathBuf::from(file)),
            extra => bail!("unexpected argument {extra}\n{USAGE}"),
        }
        i += 1;
    }
    let path = path.context(USAGE)?;
    Ok(Cli::Serve { path, listen })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (path, listen) = match parse_args(&args)? {
        Cli::Help => {
            println!("{USAGE}");
            return Ok(());
        }
        Cli::Serve { path, listen } => (path, listen),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = TrickleConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        TrickleConfig::default()
    });
    let listen = listen.unwrap_or_else(|| config.relay.listen.clone());

    let layout = config.chunk.layout()?;
    let source = FileSource::open(&path, layout)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    let listener = TcpListener::bind(&listen)
        .await
        .with_context(|| format!("failed to bind relay on {listen}"))?;

    let server = RelayServer::new(listener, Box::new(source))
        .with_idle_timeout(config.relay.idle_timeout());
    server
        .run_until(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
        })
        .await
}
