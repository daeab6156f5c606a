//! Error taxonomy for the relay services.

use relay_core::WireError;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Unknown or malformed code, or a path the session does not advertise.
    /// Receivers see 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Range outside the file. Receivers see 416.
    #[error("invalid range for file of {size} bytes")]
    InvalidRange { size: u64 },

    /// Oversized INIT frame. Closes the control connection.
    #[error("payload length {0} exceeds maximum")]
    PayloadTooLarge(usize),

    /// Malformed frame from the sender. Closes the control connection.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// DATA reply for a chunk id that is unknown, evicted, or already resolved.
    #[error("stale reply for chunk {0}")]
    StaleChunkReply(u64),

    /// The sender delivered fewer bytes than the range needs.
    #[error("chunk {index} of {path} truncated: need {needed} bytes, got {got}")]
    TruncatedChunk {
        path: String,
        index: u64,
        needed: usize,
        got: usize,
    },

    #[error("chunk fetch timed out")]
    FetchTimeout,

    /// The pending resolution was dropped without a value.
    #[error("sender went away before delivering chunk")]
    SenderGone,

    /// Building or sending a response failed on our side.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("identity store: {0}")]
    Store(#[from] rusqlite::Error),

    /// The identity store cannot be used: unreachable file, poisoned lock,
    /// or no free identifiers left.
    #[error("identity store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<WireError> for RelayError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::PayloadTooLarge(n) => RelayError::PayloadTooLarge(n),
            other => RelayError::InvalidInput(other.to_string()),
        }
    }
}
