//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

pub fn api_url(server: &str, path: &str) -> String {
    format!("{}/api/{}", server.trim_end_matches('/'), path)
}

/// `http://host` → `ws://host/ws`, `https://host` → `wss://host/ws`.
pub fn control_url(server: &str) -> String {
    let base = server.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{base}/ws")
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to relayd at {}, is it running?", url))?
        .json::<T>()
        .await
        .context("failed to parse response")
}
