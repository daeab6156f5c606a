//! Relay wire format: framing for everything on the control connection.
//!
//! Every frame starts with an 8-byte little-endian message type. DATA frames
//! follow it with an 8-byte little-endian chunk id and the raw chunk bytes;
//! every other type carries a UTF-8 JSON payload. Nothing outside this module
//! parses frame bytes.
//!
//! Headers are zerocopy structs over explicit little-endian integers, so the
//! layout is the same on every host and there is no unsafe code here.

use bytes::Bytes;
use serde::Serialize;
use static_assertions::assert_eq_size;
use zerocopy::byteorder::{LittleEndian, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::message::{FileMeta, InitRequest};

// ── Headers ──────────────────────────────────────────────────────────────────

/// Leading header of every frame.
///
/// Wire size: 8 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct FrameHeader {
    pub message_type: U64<LittleEndian>,
}

assert_eq_size!(FrameHeader, [u8; 8]);

/// Second header of a DATA frame, directly after the `FrameHeader`.
///
/// Wire size: 8 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct DataHeader {
    /// Correlates the reply with the chunk request that asked for it.
    pub chunk_id: U64<LittleEndian>,
}

assert_eq_size!(DataHeader, [u8; 8]);

const FRAME_HEADER_LEN: usize = std::mem::size_of::<FrameHeader>();
const DATA_HEADER_LEN: usize = std::mem::size_of::<DataHeader>();

// ── Message types ────────────────────────────────────────────────────────────

/// Message type carried in `FrameHeader::message_type`.
///
/// Values 2 and 3 belonged to retired message kinds and decode as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum MessageType {
    /// Session bootstrap. Payload: `InitRequest` JSON.
    Init = 0,
    /// Chunk payload reply. Payload: `DataHeader` + raw bytes.
    Data = 1,
    /// Sender declares available files. Payload: `[FileMeta]` JSON.
    FilesAdvertise = 4,
    /// Sender retracts files. Payload: `[path]` JSON.
    FilesWithdraw = 5,
}

impl TryFrom<u64> for MessageType {
    type Error = WireError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageType::Init),
            1 => Ok(MessageType::Data),
            4 => Ok(MessageType::FilesAdvertise),
            5 => Ok(MessageType::FilesWithdraw),
            other => Err(WireError::UnknownType(other)),
        }
    }
}

impl From<MessageType> for u64 {
    fn from(t: MessageType) -> u64 {
        t as u64
    }
}

// ── Constants ────────────────────────────────────────────────────────────────

/// Every shared file is partitioned into chunks of this many bytes.
/// The last chunk of a file may be shorter.
pub const CHUNK_SIZE: u64 = 2_000_000;

/// Upper bound on an INIT payload. Larger frames are rejected and the
/// connection is dropped.
pub const MAX_INIT_PAYLOAD: usize = 1_000_000;

// ── Frames ───────────────────────────────────────────────────────────────────

/// A decoded client → server frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Init(InitRequest),
    Data { chunk_id: u64, payload: Bytes },
    Advertise(Vec<FileMeta>),
    Withdraw(Vec<String>),
}

impl Frame {
    pub fn message_type(&self) -> MessageType {
        match self {
            Frame::Init(_) => MessageType::Init,
            Frame::Data { .. } => MessageType::Data,
            Frame::Advertise(_) => MessageType::FilesAdvertise,
            Frame::Withdraw(_) => MessageType::FilesWithdraw,
        }
    }
}

/// Decode one frame.
///
/// Returns `Ok(None)` for a message type this version does not know, so newer
/// clients can talk to older servers.
pub fn decode(frame: Bytes) -> Result<Option<Frame>, WireError> {
    let header = FrameHeader::read_from_prefix(&frame).ok_or(WireError::Truncated {
        needed: FRAME_HEADER_LEN,
        got: frame.len(),
    })?;

    let message_type = match MessageType::try_from(header.message_type.get()) {
        Ok(t) => t,
        Err(_) => return Ok(None),
    };
    let body = frame.slice(FRAME_HEADER_LEN..);

    let decoded = match message_type {
        MessageType::Init => {
            if body.len() > MAX_INIT_PAYLOAD {
                return Err(WireError::PayloadTooLarge(body.len()));
            }
            if body.is_empty() {
                Frame::Init(InitRequest::default())
            } else {
                Frame::Init(parse_json(&body)?)
            }
        }
        MessageType::Data => {
            let data = DataHeader::read_from_prefix(&body).ok_or(WireError::Truncated {
                needed: FRAME_HEADER_LEN + DATA_HEADER_LEN,
                got: frame.len(),
            })?;
            Frame::Data {
                chunk_id: data.chunk_id.get(),
                payload: body.slice(DATA_HEADER_LEN..),
            }
        }
        MessageType::FilesAdvertise => Frame::Advertise(parse_json(&body)?),
        MessageType::FilesWithdraw => Frame::Withdraw(parse_json(&body)?),
    };

    Ok(Some(decoded))
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, WireError> {
    serde_json::from_slice(body).map_err(|e| WireError::InvalidInput(e.to_string()))
}

/// Frame a raw payload under the given message type.
pub fn encode(message_type: MessageType, payload: &[u8]) -> Vec<u8> {
    let header = FrameHeader {
        message_type: U64::new(message_type.into()),
    };
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Frame a JSON payload. Used for INIT, FILES_ADVERTISE and FILES_WITHDRAW.
pub fn encode_json<T: Serialize>(message_type: MessageType, value: &T) -> Result<Vec<u8>, WireError> {
    let payload = serde_json::to_vec(value).map_err(|e| WireError::InvalidInput(e.to_string()))?;
    Ok(encode(message_type, &payload))
}

/// Frame a DATA reply for `chunk_id`.
pub fn encode_data(chunk_id: u64, payload: &[u8]) -> Vec<u8> {
    let header = FrameHeader {
        message_type: U64::new(MessageType::Data.into()),
    };
    let data = DataHeader {
        chunk_id: U64::new(chunk_id),
    };
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + DATA_HEADER_LEN + payload.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(data.as_bytes());
    out.extend_from_slice(payload);
    out
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting a frame.
///
/// Every variant is fatal for the connection that produced the frame and for
/// nothing else.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("frame truncated: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("unknown message type: {0}")]
    UnknownType(u64),

    #[error("payload length {0} exceeds maximum {}", MAX_INIT_PAYLOAD)]
    PayloadTooLarge(usize),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

// ── Tests ────────────────────────────────────────────────────────────────────
