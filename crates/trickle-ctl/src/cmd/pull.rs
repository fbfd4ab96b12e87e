//! `pull` — drives the fetch/acknowledge loop the way a device does.

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;

use trickle_core::chunk;

use super::http::transfer_url;

pub struct PullOptions<'a> {
    pub id: &'a str,
    pub out: Option<&'a str>,
    /// Stop after this many chunks even if more remain.
    pub max_chunks: Option<u64>,
}

/// Validate a chunk's block counter and return its payload.
fn check_chunk(expected: u32, body: &[u8]) -> Result<&[u8]> {
    let block = chunk::block_no(body).context("chunk is shorter than its header")?;
    if block != expected {
        bail!("expected block {expected}, server sent block {block}");
    }
    Ok(chunk::payload(body))
}

/// GET the current chunk, retrying once on a transport error.
/// Retrying is safe: an unacknowledged chunk is resent unchanged.
async fn fetch(client: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    match client.get(url).send().await {
        Ok(resp) => Ok(resp),
        Err(e) => {
            eprintln!("fetch failed ({e}), retrying once");
            client
                .get(url)
                .send()
                .await
                .with_context(|| format!("failed to connect to trickled at {url}"))
        }
    }
}

pub async fn cmd_pull(base: &str, opts: PullOptions<'_>) -> Result<()> {
    let client = reqwest::Client::new();
    let url = transfer_url(base, opts.id);

    let mut out = match opts.out {
        Some(path) => Some(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("failed to create {path}"))?,
        ),
        None => None,
    };

    let mut hasher = blake3::Hasher::new();
    let mut chunks: u32 = 0;
    let mut bytes: u64 = 0;

    loop {
        if opts.max_chunks.is_some_and(|max| u64::from(chunks) >= max) {
            println!("Stopping after {chunks} chunks (--max).");
            break;
        }

        let resp = fetch(&client, &url).await?;
        match resp.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => break,
            status => {
                let reason = resp.text().await.unwrap_or_default();
                bail!("fetch {} failed: {status} {reason}", opts.id);
            }
        }
        let body = resp.bytes().await.context("failed to read chunk body")?;
        let payload = check_chunk(chunks, &body)?;

        hasher.update(payload);
        if let Some(file) = out.as_mut() {
            file.write_all(payload).await.context("failed to write payload")?;
        }
        bytes += payload.len() as u64;

        let ack = client
            .put(&url)
            .body("ack")
            .send()
            .await
            .with_context(|| format!("failed to acknowledge {}", opts.id))?;
        if !ack.status().is_success() {
            bail!("acknowledge {} failed: {}", opts.id, ack.status());
        }
        chunks += 1;
    }

    if let Some(mut file) = out {
        file.flush().await?;
    }

    println!("═══════════════════════════════════════");
    println!("  Transfer {} complete", opts.id);
    println!("═══════════════════════════════════════");
    println!("  Chunks : {}", chunks);
    println!("  Bytes  : {} ({:.1} KB)", bytes, bytes as f64 / 1024.0);
    println!("  BLAKE3 : {}", hex::encode(hasher.finalize().as_bytes()));
    Ok(())
}
