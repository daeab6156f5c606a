//! `relay-ctl share`: serve local files through the relay.
//!
//! The files never leave this machine until a receiver asks: the relay sends
//! a chunk request over the control connection and we answer with that slice
//! of the file. The connection is watched; if the relay goes quiet for longer
//! than `WATCHDOG` we reconnect with the same secret and advertise again.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_tungstenite::tungstenite::Message;

use relay_core::wire::{self, MessageType};
use relay_core::{AdvertiseAck, CHUNK_SIZE, ChunkRequest, FileMeta, InitRequest, InitResponse, WithdrawAck};

use super::http::control_url;

/// The relay pings every 2s; miss a few and assume the connection is dead.
const WATCHDOG: Duration = Duration::from_millis(5000 + 2000);
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Anything the relay sends us as text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ServerMessage {
    Chunk(ChunkRequest),
    Identity(InitResponse),
    Advertised(Vec<AdvertiseAck>),
    Withdrawn(Vec<WithdrawAck>),
}

#[derive(Debug, Clone)]
struct LocalFile {
    disk_path: PathBuf,
    meta: FileMeta,
}

pub async fn cmd_share(server: &str, paths: &[&str], secret: Option<String>) -> Result<()> {
    let files = collect_files(paths)?;
    let url = control_url(server);
    let mut sharer = Sharer {
        server: server.trim_end_matches('/').to_string(),
        files,
        secret,
        announced: false,
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped sharing.");
                return Ok(());
            }
            result = sharer.connect_and_serve(&url) => match result {
                Ok(()) => tracing::info!("relay closed the connection"),
                Err(e) => tracing::warn!(error = %e, "control connection lost"),
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
        tracing::info!(url = %url, "reconnecting");
    }
}

struct Sharer {
    server: String,
    /// Advertised name → file on disk.
    files: HashMap<String, LocalFile>,
    secret: Option<String>,
    announced: bool,
}

impl Sharer {
    async fn connect_and_serve(&mut self, url: &str) -> Result<()> {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .with_context(|| format!("failed to connect to {url}"))?;
        let (mut sink, mut stream) = ws.split();

        let init = InitRequest {
            session_secret: self.secret.clone(),
        };
        sink.send(Message::Binary(wire::encode_json(MessageType::Init, &init)?))
            .await?;

        let metas: Vec<FileMeta> = self.files.values().map(|f| f.meta.clone()).collect();
        let mut advertised = false;

        loop {
            let message = match tokio::time::timeout(WATCHDOG, stream.next()).await {
                Err(_) => bail!("no frame from relay for {:?}", WATCHDOG),
                Ok(None) => return Ok(()),
                Ok(Some(message)) => message?,
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => return Ok(()),
                _ => continue,
            };
            // Empty text frames are the relay's keepalive.
            if text.is_empty() {
                continue;
            }

            match serde_json::from_str::<ServerMessage>(&text) {
                Ok(ServerMessage::Identity(identity)) => {
                    self.on_identity(identity);
                    if !advertised {
                        let frame = wire::encode_json(MessageType::FilesAdvertise, &metas)?;
                        sink.send(Message::Binary(frame)).await?;
                        advertised = true;
                    }
                }
                Ok(ServerMessage::Advertised(acks)) => {
                    for ack in acks {
                        println!("{}  {}/{}", ack.path, self.server, ack.link);
                    }
                }
                Ok(ServerMessage::Withdrawn(acks)) => {
                    tracing::debug!(count = acks.len(), "files withdrawn");
                }
                Ok(ServerMessage::Chunk(request)) => {
                    match self.read_chunk(&request).await {
                        Ok(bytes) => {
                            let frame = wire::encode_data(request.chunk_id, &bytes);
                            sink.send(Message::Binary(frame)).await?;
                        }
                        Err(e) => tracing::warn!(
                            path = %request.path,
                            chunk_index = request.chunk_index,
                            error = %e,
                            "cannot serve chunk"
                        ),
                    }
                }
                Err(e) => tracing::debug!(error = %e, "ignoring unrecognised message"),
            }
        }
    }

    fn on_identity(&mut self, identity: InitResponse) {
        if self.secret.as_deref() != Some(identity.session_secret.as_str()) {
            if self.secret.is_some() {
                tracing::warn!("relay did not recognise our secret, links have changed");
            }
            self.secret = Some(identity.session_secret.clone());
            self.announced = false;
        }
        if !self.announced {
            println!("Sharing as {}", identity.code);
            println!("Resume later with --secret {}", identity.session_secret);
            self.announced = true;
        }
        tracing::info!(code = %identity.code, "session ready");
    }

    async fn read_chunk(&self, request: &ChunkRequest) -> Result<Vec<u8>> {
        let file = self
            .files
            .get(&request.path)
            .with_context(|| format!("not sharing {}", request.path))?;
        read_chunk(&file.disk_path, request.chunk_index).await
    }
}

/// Bytes `[index * CHUNK_SIZE, (index + 1) * CHUNK_SIZE)` of the file, shorter
/// at the end of the file.
async fn read_chunk(path: &Path, index: u64) -> Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.seek(SeekFrom::Start(index * CHUNK_SIZE)).await?;
    let mut buf = Vec::with_capacity(CHUNK_SIZE as usize);
    file.take(CHUNK_SIZE).read_to_end(&mut buf).await?;
    Ok(buf)
}

fn collect_files(paths: &[&str]) -> Result<HashMap<String, LocalFile>> {
    if paths.is_empty() {
        bail!("share needs at least one file");
    }
    let mut files = HashMap::new();
    for raw in paths {
        let disk_path = PathBuf::from(*raw);
        let metadata = std::fs::metadata(&disk_path)
            .with_context(|| format!("cannot read {}", disk_path.display()))?;
        if !metadata.is_file() {
            bail!("{} is not a regular file", disk_path.display());
        }
        let name = disk_path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("{} has no usable file name", disk_path.display()))?
            .to_string();
        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let meta = FileMeta {
            path: name.clone(),
            size: metadata.len(),
            mime: String::new(),
            last_modified,
        };
        files.insert(name, LocalFile { disk_path, meta });
    }
    Ok(files)
}
