//! Chunk correlator: turns byte ranges into chunk fetches over the sender's
//! control connection and matches DATA replies back to the waiting readers.
//!
//! One correlator exists per session. All of its tables sit behind a single
//! mutex because both the HTTP side (fetch) and the control-connection side
//! (resolve, attach) touch the same chunk indices.
//!
//! Fetches are coalesced: while a request for `(path, chunk_index)` is pending
//! or still remembered as resolved, every reader gets a clone of the same
//! shared future, so overlapping ranges cost one upstream request per chunk.
//!
//! The ledger is bounded. Once it grows past its cap the oldest *resolved*
//! entry is dropped, then the next, until the ledger is back at the cap or
//! only unresolved entries remain. Unresolved entries are never dropped.

use std::collections::{HashMap, VecDeque};

use bytes::{Bytes, BytesMut};
use futures::future::{FutureExt, Shared};
use tokio::sync::{mpsc, oneshot, Mutex};

use relay_core::{ChunkRequest, FileMeta, CHUNK_SIZE};

use crate::error::RelayError;

/// Default number of chunk requests remembered per session.
pub const DEFAULT_LEDGER_CAP: usize = 300;

/// A pending (or already resolved) chunk. Clone it to wait on it from
/// several places.
pub type ChunkFuture = Shared<oneshot::Receiver<Bytes>>;

/// The single control connection currently answering chunk requests.
#[derive(Debug, Clone)]
pub struct ControlListener {
    pub conn_id: u64,
    pub tx: mpsc::UnboundedSender<ChunkRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelatorStats {
    /// Requests still waiting for a DATA reply.
    pub pending: usize,
    /// Requests remembered in the ledger, resolved or not.
    pub ledger: usize,
    pub listener_attached: bool,
}

struct Entry {
    path: String,
    chunk_index: u64,
    resolved: bool,
    tx: Option<oneshot::Sender<Bytes>>,
    future: ChunkFuture,
}

#[derive(Default)]
struct State {
    next_id: u64,
    /// chunk_id → entry. Holds exactly the ids in `ledger`.
    entries: HashMap<u64, Entry>,
    /// path → chunk_index → chunk_id
    by_index: HashMap<String, HashMap<u64, u64>>,
    /// chunk ids in insertion order
    ledger: VecDeque<u64>,
    listener: Option<ControlListener>,
}

pub struct ChunkCorrelator {
    state: Mutex<State>,
    ledger_cap: usize,
}

impl Default for ChunkCorrelator {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAP)
    }
}

impl ChunkCorrelator {
    pub fn new(ledger_cap: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            ledger_cap,
        }
    }

    /// Get the chunk at `chunk_index` of `path`, requesting it from the
    /// sender unless a request for it is already known.
    pub async fn fetch(&self, path: &str, chunk_index: u64) -> ChunkFuture {
        let mut state = self.state.lock().await;

        let known = state
            .by_index
            .get(path)
            .and_then(|indices| indices.get(&chunk_index))
            .copied();
        if let Some(entry) = known.and_then(|id| state.entries.get(&id)) {
            return entry.future.clone();
        }

        let chunk_id = state.allocate_id();
        let (tx, rx) = oneshot::channel();
        let future = rx.shared();

        state.entries.insert(
            chunk_id,
            Entry {
                path: path.to_string(),
                chunk_index,
                resolved: false,
                tx: Some(tx),
                future: future.clone(),
            },
        );
        state
            .by_index
            .entry(path.to_string())
            .or_default()
            .insert(chunk_index, chunk_id);

        state.emit(ChunkRequest {
            path: path.to_string(),
            chunk_id,
            chunk_index,
        });

        state.ledger.push_back(chunk_id);
        state.evict(self.ledger_cap);

        future
    }

    /// Hand the sender's bytes to whoever waits on `chunk_id`.
    ///
    /// Unknown, evicted and already-resolved ids yield `StaleChunkReply`;
    /// duplicate and late replies are expected, so callers log and go on.
    pub async fn resolve(&self, chunk_id: u64, bytes: Bytes) -> Result<(), RelayError> {
        let mut state = self.state.lock().await;
        let entry = state
            .entries
            .get_mut(&chunk_id)
            .filter(|e| !e.resolved)
            .ok_or(RelayError::StaleChunkReply(chunk_id))?;

        entry.resolved = true;
        if let Some(tx) = entry.tx.take() {
            // The receiver half lives in `entry.future`, so this cannot fail.
            let _ = tx.send(bytes);
        }
        tracing::trace!(
            chunk_id,
            path = %entry.path,
            chunk_index = entry.chunk_index,
            "chunk resolved"
        );
        Ok(())
    }

    /// Read the inclusive byte range `[start, end]` of `file`.
    ///
    /// Every chunk the range touches is fetched concurrently; the result is
    /// the concatenation with the head of the first chunk and the tail of the
    /// last chunk trimmed away.
    pub async fn read(&self, file: &FileMeta, start: u64, end: u64) -> Result<Bytes, RelayError> {
        if start > end || end >= file.size {
            return Err(RelayError::InvalidRange { size: file.size });
        }

        let first = start / CHUNK_SIZE;
        let last = end / CHUNK_SIZE;

        let mut pending = Vec::with_capacity((last - first + 1) as usize);
        for index in first..=last {
            pending.push(self.fetch(&file.path, index));
        }
        let pending = futures::future::join_all(pending).await;
        let chunks = futures::future::try_join_all(pending)
            .await
            .map_err(|_| RelayError::SenderGone)?;

        let head = (start % CHUNK_SIZE) as usize;
        let tail = (end % CHUNK_SIZE) as usize + 1;
        let full = CHUNK_SIZE as usize;

        let truncated = |index: u64, needed: usize, got: usize| RelayError::TruncatedChunk {
            path: file.path.clone(),
            index,
            needed,
            got,
        };

        if let [only] = chunks.as_slice() {
            if only.len() < tail {
                return Err(truncated(first, tail, only.len()));
            }
            return Ok(only.slice(head..tail));
        }

        let mut out = BytesMut::with_capacity((end - start + 1) as usize);
        for (chunk, index) in chunks.iter().zip(first..=last) {
            let lo = if index == first { head } else { 0 };
            let hi = if index == last { tail } else { full };
            if chunk.len() < hi {
                return Err(truncated(index, hi, chunk.len()));
            }
            out.extend_from_slice(&chunk[lo..hi]);
        }
        Ok(out.freeze())
    }

    /// Make `listener` the one connection that receives chunk requests.
    ///
    /// The previous listener is detached first. Every request still waiting
    /// for a reply is re-sent to the new listener, since the connection that
    /// was asked may be gone. Returns the number of replayed requests.
    pub async fn attach(&self, listener: ControlListener) -> usize {
        let mut state = self.state.lock().await;
        if let Some(previous) = state.listener.take() {
            tracing::debug!(
                old = previous.conn_id,
                new = listener.conn_id,
                "replacing chunk request listener"
            );
        }

        let mut replayed = 0;
        for id in &state.ledger {
            let Some(entry) = state.entries.get(id).filter(|e| !e.resolved) else {
                continue;
            };
            let request = ChunkRequest {
                path: entry.path.clone(),
                chunk_id: *id,
                chunk_index: entry.chunk_index,
            };
            if listener.tx.send(request).is_ok() {
                replayed += 1;
            }
        }

        state.listener = Some(listener);
        replayed
    }

    /// Drop every resolved chunk remembered for `path`, so the next read
    /// goes back to the sender. Called when the file behind a path changes
    /// or goes away. Unresolved requests stay: their readers are still
    /// waiting and the sender answers them from whatever it now holds.
    pub async fn forget(&self, path: &str) -> usize {
        let mut state = self.state.lock().await;
        let State {
            entries,
            by_index,
            ledger,
            ..
        } = &mut *state;

        let Some(indices) = by_index.get_mut(path) else {
            return 0;
        };
        let before = ledger.len();
        indices.retain(|_, id| entries.get(&*id).is_some_and(|e| !e.resolved));
        if indices.is_empty() {
            by_index.remove(path);
        }
        ledger.retain(|id| {
            let stale = entries
                .get(id)
                .is_some_and(|e| e.resolved && e.path == path);
            if stale {
                entries.remove(id);
            }
            !stale
        });

        let dropped = before - ledger.len();
        if dropped > 0 {
            tracing::debug!(path = %path, dropped, "forgot cached chunks");
        }
        dropped
    }

    /// Clear the listener slot if `conn_id` still owns it. A connection that
    /// has already been superseded must not detach its successor.
    pub async fn detach(&self, conn_id: u64) -> bool {
        let mut state = self.state.lock().await;
        let owned = state
            .listener
            .as_ref()
            .is_some_and(|l| l.conn_id == conn_id);
        if owned {
            state.listener = None;
        }
        owned
    }

    pub async fn stats(&self) -> CorrelatorStats {
        let state = self.state.lock().await;
        CorrelatorStats {
            pending: state.entries.values().filter(|e| !e.resolved).count(),
            ledger: state.ledger.len(),
            listener_attached: state.listener.is_some(),
        }
    }
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if !self.entries.contains_key(&id) {
                return id;
            }
        }
    }

    fn emit(&mut self, request: ChunkRequest) {
        let Some(listener) = &self.listener else {
            tracing::debug!(
                chunk_id = request.chunk_id,
                path = %request.path,
                "no control connection, request waits for the sender to reconnect"
            );
            return;
        };
        if listener.tx.send(request).is_err() {
            tracing::debug!(
                conn_id = listener.conn_id,
                "chunk request listener closed, dropping it"
            );
            self.listener = None;
        }
    }

    fn evict(&mut self, cap: usize) {
        while self.ledger.len() > cap {
            let entries = &self.entries;
            let Some(pos) = self
                .ledger
                .iter()
                .position(|id| entries.get(id).map_or(true, |e| e.resolved))
            else {
                break;
            };
            let Some(id) = self.ledger.remove(pos) else {
                break;
            };
            let Some(entry) = self.entries.remove(&id) else {
                continue;
            };
            if let Some(indices) = self.by_index.get_mut(&entry.path) {
                if indices.get(&entry.chunk_index) == Some(&id) {
                    indices.remove(&entry.chunk_index);
                }
                if indices.is_empty() {
                    self.by_index.remove(&entry.path);
                }
            }
        }
    }
}
