//! JSON payloads carried on the control connection.
//!
//! Field names are camelCase on the wire; the browser client reads and writes
//! them verbatim.

use serde::{Deserialize, Serialize};

/// Client → server, type INIT. An absent or empty secret asks for a new session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_secret: Option<String>,
}

impl InitRequest {
    /// The secret, treating an empty string the same as no secret.
    pub fn secret(&self) -> Option<&str> {
        self.session_secret.as_deref().filter(|s| !s.is_empty())
    }
}

/// Server → client reply to INIT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    pub session_secret: String,
    pub code: String,
}

/// A file the sender makes available, as declared by the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub path: String,
    pub size: u64,
    /// Browser-reported MIME type. Informational; responses derive the
    /// content type from the path extension.
    #[serde(rename = "type", default)]
    pub mime: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub last_modified: u64,
}

/// Per-file reply to FILES_ADVERTISE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertiseAck {
    pub path: String,
    /// `{code}/{path}`, relative to the server root.
    pub link: String,
    pub size: u64,
}

/// Per-path reply to FILES_WITHDRAW.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawAck {
    pub path: String,
    pub deleted: bool,
}

/// Server → client: "send me chunk `chunk_index` of `path`, tag it `chunk_id`".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRequest {
    pub path: String,
    pub chunk_id: u64,
    pub chunk_index: u64,
}
