//! Example: print every received event to the console
//!
//! Connects to an SSE endpoint, prints each event as it arrives and
//! quits when `q` is entered on stdin.
//!
//! Run with: cargo run --example console -- --uri http://localhost:3000/events

use clap::Parser;
use rust_sse_client::{SseClient, SseConfig, TracingLogger};
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Print server-sent events from an endpoint")]
struct Args {
    /// Endpoint to subscribe to
    #[arg(long)]
    uri: String,

    /// Reconnect delay in milliseconds when the server sends no retry
    #[arg(long, default_value_t = 3000)]
    retry_ms: u64,

    /// Print each event as wire-format text instead of one summary line
    #[arg(long)]
    raw: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    // Verbose maps to debug; set RUST_LOG=debug to see every connection attempt
    let config = SseConfig::get(&args.uri).default_retry(Duration::from_millis(args.retry_ms));
    let client = SseClient::with_config(config, Arc::new(TracingLogger));

    let raw = args.raw;
    client.subscribe(move |batch| {
        for event in batch.iter() {
            if raw {
                print!("{}", event.to_frame());
                continue;
            }
            println!(
                "[Message] Id:{}, Event:{}, Retry:{}, Data:{}",
                event.id(),
                event.event(),
                event.retry(),
                event.data().join("\n")
            );
        }
    });

    match client.start() {
        Ok(readiness) => readiness.wait_blocking(),
        Err(e) => {
            eprintln!("Failed to start: {e}");
            return;
        }
    }

    println!("Listening on {} (enter q to quit)", args.uri);

    for line in std::io::stdin().lock().lines() {
        match line {
            Ok(line) if line.trim() == "q" => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }

    client.stop();
}
