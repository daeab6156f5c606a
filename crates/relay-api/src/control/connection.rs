//! One sender's control connection.
//!
//! The first frame must be INIT. After that the connection carries the
//! sender's file advertisements and DATA replies inbound, and chunk requests
//! outbound. A newer connection for the same session evicts this one.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

use relay_core::wire::{self, Frame};
use relay_core::{ChunkRequest, InitRequest, InitResponse};
use relay_services::{ControlHandle, RelayError, Session};

use super::liveness::{Beat, Heartbeat};
use crate::handlers::ApiState;

enum Outcome {
    Nothing,
    Reply(String),
    Attached { reply: String, handle: ControlHandle },
    Close,
}

pub struct ControlConnection {
    state: ApiState,
    session: Option<Arc<Session>>,
    conn_id: Option<u64>,
    heartbeat: Heartbeat,
}

impl ControlConnection {
    pub fn new(state: ApiState) -> Self {
        Self {
            state,
            session: None,
            conn_id: None,
            heartbeat: Heartbeat::new(),
        }
    }

    pub async fn run(mut self, socket: WebSocket) {
        let (mut sink, mut stream) = socket.split();

        let period = self.state.config.liveness.ping_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Both exist once INIT has attached this connection to a session.
        let mut requests: Option<mpsc::UnboundedReceiver<ChunkRequest>> = None;
        let mut evicted: Option<oneshot::Receiver<()>> = None;

        loop {
            tokio::select! {
                inbound = stream.next() => {
                    let message = match inbound {
                        Some(Ok(m)) => m,
                        Some(Err(e)) => {
                            tracing::debug!(error = %e, "control connection read failed");
                            break;
                        }
                        None => break,
                    };
                    self.heartbeat.saw_traffic();

                    let reply = match self.on_message(message).await {
                        Ok(Outcome::Nothing) => continue,
                        Ok(Outcome::Close) => break,
                        Ok(Outcome::Reply(reply)) => reply,
                        Ok(Outcome::Attached { reply, handle }) => {
                            requests = Some(handle.requests);
                            evicted = Some(handle.evicted);
                            reply
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "protocol violation, closing control connection");
                            break;
                        }
                    };
                    if sink.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                }

                Some(request) = next_request(&mut requests) => {
                    let text = match serde_json::to_string(&request) {
                        Ok(t) => t,
                        Err(e) => {
                            tracing::error!(error = %e, "failed to encode chunk request");
                            continue;
                        }
                    };
                    tracing::trace!(chunk_id = request.chunk_id, path = %request.path, "requesting chunk");
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }

                _ = superseded(&mut evicted) => {
                    tracing::info!(conn_id = ?self.conn_id, "closing superseded control connection");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }

                _ = ticker.tick() => match self.heartbeat.tick() {
                    Beat::Ping => {
                        let keepalive = sink.send(Message::Text(String::new().into())).await;
                        let ping = sink.send(Message::Ping(Bytes::new())).await;
                        if keepalive.is_err() || ping.is_err() {
                            break;
                        }
                    }
                    Beat::Dead => {
                        tracing::warn!(conn_id = ?self.conn_id, "control connection unresponsive, terminating");
                        break;
                    }
                },
            }
        }

        if let (Some(session), Some(conn_id)) = (&self.session, self.conn_id) {
            session.detach_control(conn_id).await;
            tracing::info!(code = %session.code, conn_id, "control connection closed");
        }
    }

    async fn on_message(&mut self, message: Message) -> Result<Outcome, RelayError> {
        match message {
            Message::Binary(bytes) => self.on_frame(bytes).await,
            Message::Text(_) => {
                tracing::trace!("ignoring text frame from sender");
                Ok(Outcome::Nothing)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(Outcome::Nothing),
            Message::Close(_) => Ok(Outcome::Close),
        }
    }

    async fn on_frame(&mut self, bytes: Bytes) -> Result<Outcome, RelayError> {
        let Some(frame) = wire::decode(bytes)? else {
            tracing::debug!("ignoring frame of unknown type");
            return Ok(Outcome::Nothing);
        };

        let Some(session) = self.session.clone() else {
            return match frame {
                Frame::Init(request) => self.init(request).await,
                other => Err(RelayError::InvalidInput(format!(
                    "{:?} before INIT",
                    other.message_type()
                ))),
            };
        };

        match frame {
            // Repeated INIT: same identity, nothing else changes.
            Frame::Init(_) => Ok(Outcome::Reply(to_json(&identity(&session))?)),
            Frame::Advertise(entries) => {
                let acks = session.advertise(entries).await;
                tracing::info!(code = %session.code, count = acks.len(), "files advertised");
                Ok(Outcome::Reply(to_json(&acks)?))
            }
            Frame::Withdraw(paths) => {
                let acks = session.withdraw(paths).await;
                tracing::info!(code = %session.code, count = acks.len(), "files withdrawn");
                Ok(Outcome::Reply(to_json(&acks)?))
            }
            Frame::Data { chunk_id, payload } => {
                if let Err(e) = session.chunks.resolve(chunk_id, payload).await {
                    tracing::debug!(code = %session.code, error = %e, "ignoring DATA reply");
                }
                Ok(Outcome::Nothing)
            }
        }
    }

    async fn init(&mut self, request: InitRequest) -> Result<Outcome, RelayError> {
        let session = self.state.directory.resolve(request.secret())?;
        let handle = session.attach_control().await;
        tracing::info!(
            code = %session.code,
            conn_id = handle.conn_id,
            replayed = handle.replayed,
            "control connection attached"
        );

        let reply = to_json(&identity(&session))?;
        self.conn_id = Some(handle.conn_id);
        self.session = Some(session);
        Ok(Outcome::Attached { reply, handle })
    }
}

fn identity(session: &Session) -> InitResponse {
    InitResponse {
        session_secret: session.secret.clone(),
        code: session.code.clone(),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, RelayError> {
    serde_json::to_string(value).map_err(|e| RelayError::TransportFailure(e.to_string()))
}

async fn next_request(
    requests: &mut Option<mpsc::UnboundedReceiver<ChunkRequest>>,
) -> Option<ChunkRequest> {
    match requests {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Resolves once a newer connection has taken the session over.
async fn superseded(evicted: &mut Option<oneshot::Receiver<()>>) {
    match evicted {
        Some(rx) => {
            let _ = rx.await;
        }
        None => std::future::pending().await,
    }
}
