//! relay-ctl — share files through a relay, and inspect it.

use anyhow::{Context, Result};

mod cmd;

use cmd::http::DEFAULT_SERVER;

fn print_usage() {
    println!("Usage: relay-ctl [--server <url>] <command>");
    println!();
    println!("Commands:");
    println!("  share [--secret <secret>] <file>...   Share files until interrupted");
    println!("  status                                 Show relay sessions and pending chunks");
    println!();
    println!("Options:");
    println!("  --server <url>     Relay base URL (default: {})", DEFAULT_SERVER);
    println!("  --secret <secret>  Resume an earlier session so its links stay valid");
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut server = std::env::var("RELAY_SERVER").unwrap_or_else(|_| DEFAULT_SERVER.to_string());
    let mut secret = None;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--server" => {
                i += 1;
                server = args.get(i).context("--server requires a value")?.clone();
            }
            "--secret" => {
                i += 1;
                secret = Some(args.get(i).context("--secret requires a value")?.clone());
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | []                => cmd::status::cmd_status(&server).await,
        ["share", files @ ..]          => cmd::share::cmd_share(&server, files, secret).await,
        ["help"] | ["--help"] | ["-h"] => { print_usage(); Ok(()) }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
