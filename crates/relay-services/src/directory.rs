//! Session directory: maps sender secrets and public codes to live sessions.
//!
//! The directory owns the in-memory session table; the identity store owns
//! the durable `code ⇄ secret` mapping. After a restart the store still knows
//! every code, but a session only reappears in memory once its sender
//! reconnects with the secret.

use std::sync::Arc;

use dashmap::DashMap;

use relay_core::ident;

use crate::correlator::DEFAULT_LEDGER_CAP;
use crate::error::RelayError;
use crate::session::Session;
use crate::store::{IdentityStore, StoreError};

/// Fresh identifiers colliding this many times in a row means the store is
/// broken, not unlucky.
const MINT_ATTEMPTS: usize = 8;

pub struct SessionDirectory {
    sessions: DashMap<String, Arc<Session>>,
    store: Arc<dyn IdentityStore>,
    ledger_cap: usize,
}

impl SessionDirectory {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self::with_ledger_cap(store, DEFAULT_LEDGER_CAP)
    }

    pub fn with_ledger_cap(store: Arc<dyn IdentityStore>, ledger_cap: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            store,
            ledger_cap,
        }
    }

    /// Find or create the session for a sender.
    ///
    /// A secret the store knows resumes its session (rehydrated with empty
    /// files if this process has not seen it yet). No secret, or one the
    /// store has never issued, gets freshly minted identifiers.
    pub fn resolve(&self, secret: Option<&str>) -> Result<Arc<Session>, RelayError> {
        if let Some(secret) = secret.filter(|s| !s.is_empty()) {
            if let Some(session) = self.sessions.get(secret) {
                return Ok(session.value().clone());
            }
            if let Some(code) = self.store.code_for_secret(secret)? {
                let session = self
                    .sessions
                    .entry(secret.to_string())
                    .or_insert_with(|| {
                        tracing::info!(code = %code, "session resumed");
                        Arc::new(Session::new(secret.to_string(), code, self.ledger_cap))
                    })
                    .value()
                    .clone();
                return Ok(session);
            }
            tracing::debug!("unknown secret presented, issuing a new identity");
        }
        self.mint()
    }

    /// Receiver-side lookup.
    pub fn resolve_by_code(&self, code: &str) -> Result<Option<Arc<Session>>, RelayError> {
        let Some(secret) = self.store.secret_for_code(code)? else {
            return Ok(None);
        };
        Ok(self.sessions.get(&secret).map(|s| s.value().clone()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshot of the live sessions.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }

    fn mint(&self) -> Result<Arc<Session>, RelayError> {
        for _ in 0..MINT_ATTEMPTS {
            let secret = ident::mint();
            let code = ident::mint();
            match self.store.insert(&secret, &code) {
                Ok(()) => {
                    tracing::info!(code = %code, "session created");
                    let session = Arc::new(Session::new(secret.clone(), code, self.ledger_cap));
                    self.sessions.insert(secret, session.clone());
                    return Ok(session);
                }
                Err(StoreError::Conflict) => {
                    tracing::warn!("identifier collision, minting again");
                }
                Err(StoreError::Backend(e)) => return Err(e),
            }
        }
        Err(RelayError::StoreUnavailable(format!(
            "no unique identifiers after {MINT_ATTEMPTS} attempts"
        )))
    }
}
