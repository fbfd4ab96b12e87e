//! trickle-ctl — command-line client for the Trickle daemon.

mod cmd;

use anyhow::{Context, Result};

use cmd::pull::PullOptions;

const DEFAULT_URL: &str = "http://127.0.0.1:8888";

fn print_usage() {
    println!("Usage: trickle-ctl [--url <url>] <command>");
    println!();
    println!("Commands:");
    println!("  pull <id> [--out <file>] [--max <n>]");
    println!("                Fetch and acknowledge chunks until the stream ends");
    println!("  status        Show the source and the active transaction");
    println!("  abort         Drop the active transaction");
    println!();
    println!("Options:");
    println!("  --url <url>   Daemon base URL (default: {})", DEFAULT_URL);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut url = DEFAULT_URL.to_string();
    let mut out: Option<String> = None;
    let mut max_chunks: Option<u64> = None;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--url" => {
                i += 1;
                url = args.get(i).context("--url requires a value")?.clone();
            }
            "--out" => {
                i += 1;
                out = Some(args.get(i).context("--out requires a value")?.clone());
            }
            "--max" => {
                i += 1;
                max_chunks = Some(
                    args.get(i)
                        .context("--max requires a value")?
                        .parse()
                        .context("--max must be a number")?,
                );
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["pull", id] => {
            let opts = PullOptions {
                id: *id,
                out: out.as_deref(),
                max_chunks,
            };
            cmd::pull::cmd_pull(&url, opts).await
        }
        ["status"] | [] => cmd::status::cmd_status(&url).await,
        ["abort"] => cmd::status::cmd_abort(&url).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
