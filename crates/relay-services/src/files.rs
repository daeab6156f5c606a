//! File registry: the files a session's sender has advertised.

use dashmap::DashMap;
use relay_core::{AdvertiseAck, FileMeta, WithdrawAck};

/// Path → metadata for one session. Only the sender's advertise and
/// withdraw messages mutate it; entries never expire.
#[derive(Default)]
pub struct FileRegistry {
    files: DashMap<String, FileMeta>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert each entry by path and return the links the sender should share.
    pub fn advertise(&self, code: &str, entries: Vec<FileMeta>) -> Vec<AdvertiseAck> {
        entries
            .into_iter()
            .map(|meta| {
                let ack = AdvertiseAck {
                    link: format!("{}/{}", code, meta.path),
                    path: meta.path.clone(),
                    size: meta.size,
                };
                self.files.insert(meta.path.clone(), meta);
                ack
            })
            .collect()
    }

    /// Remove the given paths. Every path is acknowledged, present or not.
    pub fn withdraw(&self, paths: Vec<String>) -> Vec<WithdrawAck> {
        paths
            .into_iter()
            .map(|path| {
                self.files.remove(&path);
                WithdrawAck {
                    path,
                    deleted: true,
                }
            })
            .collect()
    }

    pub fn get(&self, path: &str) -> Option<FileMeta> {
        self.files.get(path).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
