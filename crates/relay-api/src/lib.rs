pub mod control;
pub mod handlers;

use std::future::Future;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

pub use handlers::ApiState;

pub fn router(state: ApiState) -> Router {
    let origin = &state.config.network.allowed_origin;
    let allow_origin = if origin.is_empty() {
        AllowOrigin::from(Any)
    } else {
        match HeaderValue::from_str(origin) {
            Ok(v) => AllowOrigin::exact(v),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "invalid allowed_origin, allowing any");
                AllowOrigin::from(Any)
            }
        }
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new().route("/status", get(handlers::handle_status));

    Router::new()
        .route("/ws", get(control::handle_ws))
        .nest("/api", api_routes)
        .route("/{code}/{*path}", get(handlers::handle_download))
        .layer(cors)
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_on(
    listener: TcpListener,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "relay listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

pub async fn serve(
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = state.config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    serve_on(listener, state, shutdown).await
}
