//! relayd — pull-through file relay daemon.

use std::sync::Arc;

use anyhow::{Context, Result};

use relay_api::ApiState;
use relay_core::config::RelayConfig;
use relay_services::{IdentityStore, MemoryStore, SessionDirectory, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = RelayConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = RelayConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        RelayConfig::default()
    });
    tracing::info!(
        addr = %config.listen_addr(),
        ledger_cap = config.relay.ledger_cap,
        fetch_timeout_secs = config.relay.fetch_timeout_secs,
        "relayd starting"
    );

    // ── Identity store ───────────────────────────────────────────────────────
    let store: Arc<dyn IdentityStore> = if config.storage.in_memory {
        tracing::info!("identity store in memory, share links end with this process");
        Arc::new(MemoryStore::new())
    } else {
        let path = &config.storage.db_path;
        let store = SqliteStore::open(path)
            .with_context(|| format!("failed to open identity store at {}", path.display()))?;
        tracing::info!(path = %path.display(), "identity store ready");
        Arc::new(store)
    };

    let directory = Arc::new(SessionDirectory::with_ledger_cap(
        store,
        config.relay.ledger_cap,
    ));
    let state = ApiState::new(directory, config);

    // ── Serve until ctrl-c ───────────────────────────────────────────────────
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutdown signal received");
    };
    relay_api::serve(state, shutdown).await
}
