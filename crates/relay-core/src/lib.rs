//! relay-core — wire format, message types, identifiers and configuration.
//! All other Relay crates depend on this one.

pub mod config;
pub mod ident;
pub mod message;
pub mod wire;

pub use message::{AdvertiseAck, ChunkRequest, FileMeta, InitRequest, InitResponse, WithdrawAck};
pub use wire::{Frame, MessageType, WireError, CHUNK_SIZE};
