//! HTTP handlers: receiver downloads and relay status.

use std::sync::Arc;

use axum::http::StatusCode;

use relay_core::config::RelayConfig;
use relay_services::{RelayError, SessionDirectory};

pub mod range;
pub mod status;
pub mod stream;

pub use status::handle_status;
pub use stream::handle_download;

#[derive(Clone)]
pub struct ApiState {
    pub directory: Arc<SessionDirectory>,
    pub config: Arc<RelayConfig>,
}

impl ApiState {
    pub fn new(directory: Arc<SessionDirectory>, config: RelayConfig) -> Self {
        Self {
            directory,
            config: Arc::new(config),
        }
    }
}

/// Receivers only ever learn "not found" or "internal error"; the detail
/// goes to the log.
pub(crate) fn error_response(e: RelayError) -> (StatusCode, String) {
    match e {
        RelayError::NotFound(what) => {
            tracing::debug!(what = %what, "not found");
            (StatusCode::NOT_FOUND, "File not found".to_string())
        }
        other => {
            tracing::error!(error = %other, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}
