//! Session: one sender identity with its advertised files and chunk traffic.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot, Mutex};

use relay_core::{AdvertiseAck, ChunkRequest, FileMeta, WithdrawAck};

use crate::correlator::{ChunkCorrelator, ControlListener};
use crate::files::FileRegistry;

/// Connection ids are unique across the process so a late detach can never
/// match a different session's connection.
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

pub struct Session {
    /// Private; only the sender knows it.
    pub secret: String,
    /// Public; appears in share links.
    pub code: String,
    pub files: FileRegistry,
    pub chunks: ChunkCorrelator,
    control: Mutex<Option<ControlSlot>>,
}

struct ControlSlot {
    conn_id: u64,
    evict: oneshot::Sender<()>,
}

/// What a freshly attached control connection needs to run.
pub struct ControlHandle {
    pub conn_id: u64,
    /// Chunk requests to forward to the sender.
    pub requests: mpsc::UnboundedReceiver<ChunkRequest>,
    /// Fires when a newer connection takes over this session.
    pub evicted: oneshot::Receiver<()>,
    /// Unanswered requests re-sent on attach.
    pub replayed: usize,
}

impl Session {
    pub fn new(secret: String, code: String, ledger_cap: usize) -> Self {
        Self {
            secret,
            code,
            files: FileRegistry::new(),
            chunks: ChunkCorrelator::new(ledger_cap),
            control: Mutex::new(None),
        }
    }

    /// Record the sender's files. A path whose size or modification time
    /// changed no longer matches the chunks cached for it, so they are
    /// dropped.
    pub async fn advertise(&self, entries: Vec<FileMeta>) -> Vec<AdvertiseAck> {
        let mut changed = Vec::new();
        for meta in &entries {
            if let Some(previous) = self.files.get(&meta.path) {
                if previous.size != meta.size || previous.last_modified != meta.last_modified {
                    changed.push(meta.path.clone());
                }
            }
        }
        let acks = self.files.advertise(&self.code, entries);
        for path in &changed {
            self.chunks.forget(path).await;
        }
        acks
    }

    pub async fn withdraw(&self, paths: Vec<String>) -> Vec<WithdrawAck> {
        let acks = self.files.withdraw(paths);
        for ack in &acks {
            self.chunks.forget(&ack.path).await;
        }
        acks
    }

    /// Make a new control connection the session's only one. A previous
    /// connection is told to close and stops receiving chunk requests before
    /// the new one is attached.
    pub async fn attach_control(&self) -> ControlHandle {
        let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, requests) = mpsc::unbounded_channel();
        let (evict_tx, evicted) = oneshot::channel();

        let mut slot = self.control.lock().await;
        if let Some(previous) = slot.take() {
            tracing::info!(
                code = %self.code,
                old = previous.conn_id,
                new = conn_id,
                "control connection superseded"
            );
            self.chunks.detach(previous.conn_id).await;
            let _ = previous.evict.send(());
        }
        let replayed = self.chunks.attach(ControlListener { conn_id, tx }).await;
        *slot = Some(ControlSlot {
            conn_id,
            evict: evict_tx,
        });

        ControlHandle {
            conn_id,
            requests,
            evicted,
            replayed,
        }
    }

    /// Release the session if `conn_id` still holds it.
    pub async fn detach_control(&self, conn_id: u64) -> bool {
        let mut slot = self.control.lock().await;
        if slot.as_ref().map(|s| s.conn_id) != Some(conn_id) {
            return false;
        }
        *slot = None;
        self.chunks.detach(conn_id).await
    }

    pub async fn is_connected(&self) -> bool {
        self.control.lock().await.is_some()
    }
}
