//! relay-services — sessions, advertised files and chunk correlation.
//!
//! Nothing here touches sockets. The API crate feeds decoded frames in and
//! drains chunk requests out.

pub mod correlator;
pub mod directory;
pub mod error;
pub mod files;
pub mod session;
pub mod store;

pub use correlator::{ChunkCorrelator, ChunkFuture, ControlListener, CorrelatorStats};
pub use directory::SessionDirectory;
pub use error::RelayError;
pub use files::FileRegistry;
pub use session::{ControlHandle, Session};
pub use store::{IdentityStore, MemoryStore, SqliteStore, StoreError};
