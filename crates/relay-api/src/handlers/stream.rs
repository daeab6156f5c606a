//! GET /{code}/{*path}: stream an advertised file out of the sender.
//!
//! The body is pulled segment by segment: the next segment is only fetched
//! from the sender once hyper has taken the previous one, so a slow receiver
//! slows the sender down instead of filling server memory. Dropping the
//! response drops the stream and stops further fetches.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::stream::{self, StreamExt};

use relay_core::{ident, FileMeta};
use relay_services::{RelayError, Session};

use super::range::{parse_range, ByteRange};
use super::{error_response, ApiState};

/// Bytes handed to the transport per step.
pub const SEGMENT_SIZE: u64 = 2_000_000;

pub async fn handle_download(
    State(state): State<ApiState>,
    Path((code, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, String)> {
    let (session, file) = lookup(&state, &code, &path).map_err(error_response)?;

    let content_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();

    // A header that is not even ASCII is as unusable as a malformed one.
    let range_header = headers
        .get(header::RANGE)
        .map(|v| v.to_str().unwrap_or_default());

    let (status, start, end) = match parse_range(range_header, file.size) {
        ByteRange::Unsatisfiable => {
            tracing::debug!(
                code = %code,
                path = %path,
                range = ?range_header,
                size = file.size,
                "unsatisfiable range"
            );
            return Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{}", file.size))
                .body(Body::empty())
                .map_err(transport_failure);
        }
        ByteRange::Full if file.size == 0 => {
            return Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, 0)
                .header(header::ACCEPT_RANGES, "bytes")
                .body(Body::empty())
                .map_err(transport_failure);
        }
        ByteRange::Full => (StatusCode::OK, 0, file.size - 1),
        ByteRange::Partial { start, end } => (StatusCode::PARTIAL_CONTENT, start, end),
    };

    let size = file.size;
    let settings = &state.config.relay;
    let cursor = Cursor {
        session,
        file,
        next: start,
        end,
        delay: settings.segment_delay(),
        timeout: settings.fetch_timeout(),
        done: false,
    };

    tracing::debug!(code = %code, path = %path, start, end, "streaming");

    // Fetch the first segment up front so a sender that cannot deliver turns
    // into a 500 instead of a truncated 200/206.
    let (first, rest) = cursor.advance().await.map_err(error_response)?;
    let body = stream::once(async move { Ok::<_, std::io::Error>(first) })
        .chain(stream::unfold(rest, |cursor| async move {
            if cursor.done || cursor.next > cursor.end {
                return None;
            }
            tokio::time::sleep(cursor.delay).await;
            match cursor.clone().advance().await {
                Ok((bytes, next)) => Some((Ok(bytes), next)),
                Err(e) => {
                    tracing::warn!(
                        path = %cursor.file.path,
                        offset = cursor.next,
                        error = %e,
                        "aborting response body"
                    );
                    let stopped = Cursor {
                        done: true,
                        ..cursor
                    };
                    Some((Err(std::io::Error::other(e)), stopped))
                }
            }
        }));

    let mut response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, end - start + 1)
        .header(header::ACCEPT_RANGES, "bytes");
    if status == StatusCode::PARTIAL_CONTENT {
        response = response.header(
            header::CONTENT_RANGE,
            format!("bytes {start}-{end}/{size}"),
        );
    }
    response
        .body(Body::from_stream(body))
        .map_err(transport_failure)
}

fn lookup(
    state: &ApiState,
    code: &str,
    path: &str,
) -> Result<(Arc<Session>, FileMeta), RelayError> {
    let missing = || RelayError::NotFound(format!("{code}/{path}"));
    // Malformed codes cannot exist; skip the store.
    if !ident::is_well_formed(code) {
        return Err(missing());
    }
    let session = state.directory.resolve_by_code(code)?.ok_or_else(missing)?;
    let file = session.files.get(path).ok_or_else(missing)?;
    Ok((session, file))
}

fn transport_failure(e: axum::http::Error) -> (StatusCode, String) {
    error_response(RelayError::TransportFailure(e.to_string()))
}

/// Position within the byte range still to be sent.
#[derive(Clone)]
struct Cursor {
    session: Arc<Session>,
    file: FileMeta,
    next: u64,
    end: u64,
    delay: Duration,
    timeout: Option<Duration>,
    done: bool,
}

impl Cursor {
    /// Read the next segment and return it with the cursor moved past it.
    async fn advance(self) -> Result<(Bytes, Cursor), RelayError> {
        let seg_end = self.next.saturating_add(SEGMENT_SIZE - 1).min(self.end);
        let read = self.session.chunks.read(&self.file, self.next, seg_end);
        let bytes = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| RelayError::FetchTimeout)??,
            None => read.await?,
        };
        let done = seg_end == self.end;
        Ok((
            bytes,
            Cursor {
                next: seg_end.saturating_add(1),
                done,
                ..self
            },
        ))
    }
}
