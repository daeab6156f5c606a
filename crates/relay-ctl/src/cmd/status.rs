//! `relay-ctl status`.

use anyhow::Result;
use serde::Deserialize;

use super::http::{api_url, get_json};

#[derive(Deserialize)]
struct StatusResponse {
    sessions: usize,
    connected: usize,
    files: usize,
    pending_chunks: usize,
}

pub async fn cmd_status(server: &str) -> Result<()> {
    let status: StatusResponse = get_json(&api_url(server, "status")).await?;
    println!("Sessions:        {}", status.sessions);
    println!("  connected:     {}", status.connected);
    println!("Files shared:    {}", status.files);
    println!("Pending chunks:  {}", status.pending_chunks);
    Ok(())
}
