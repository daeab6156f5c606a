//! GET /ws: the sender's control connection.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;

use crate::handlers::ApiState;

pub mod connection;
pub mod liveness;

pub use connection::ControlConnection;

pub async fn handle_ws(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| ControlConnection::new(state).run(socket))
}
