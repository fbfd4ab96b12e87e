//! Status and abort commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{api_url, delete_json, get_json};

#[derive(Deserialize)]
struct StatusResponse {
    source: String,
    active: Option<ActiveTransaction>,
}

#[derive(Deserialize)]
struct ActiveTransaction {
    id: String,
    awaiting_ack: bool,
    chunks_sent: u64,
    age_secs: u64,
    last_chunk_bytes: usize,
    last_chunk_digest: String,
}

#[derive(Deserialize)]
struct AbortResponse {
    aborted: Option<String>,
}

pub async fn cmd_status(base: &str) -> Result<()> {
    let resp: StatusResponse = get_json(&api_url(base, "/status")).await?;

    println!("═══════════════════════════════════════");
    println!("  Trickle Status");
    println!("═══════════════════════════════════════");
    println!("  Source : {}", resp.source);

    match resp.active {
        None => println!("\n  No active transaction."),
        Some(tx) => {
            println!("\n  Transaction:");
            println!("  ┌─ {}", tx.id);
            println!("  │  state       : {}", if tx.awaiting_ack { "awaiting ack" } else { "acked" });
            println!("  │  chunks sent : {}", tx.chunks_sent);
            println!("  │  last chunk  : {} bytes", tx.last_chunk_bytes);
            println!("  │  digest      : {}", &tx.last_chunk_digest[..16.min(tx.last_chunk_digest.len())]);
            println!("  └─ age         : {}s", tx.age_secs);
        }
    }
    Ok(())
}

pub async fn cmd_abort(base: &str) -> Result<()> {
    let resp: AbortResponse = delete_json(&api_url(base, "/transaction")).await?;
    match resp.aborted {
        Some(id) => println!("Aborted transaction {}.", id),
        None => println!("No active transaction."),
    }
    Ok(())
}
