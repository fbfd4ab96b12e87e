pub mod handlers;

use std::future::Future;

use axum::http::{header, HeaderValue};
use axum::routing::{delete, get};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub use handlers::ApiState;

/// Transfer routes at the root, operator routes under `/api`.
///
/// Every response carries `Connection: close`; clients open one
/// connection per call.
pub fn router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/transaction", delete(handlers::handle_abort));

    Router::new()
        .route(
            "/",
            get(handlers::handle_missing_id).put(handlers::handle_missing_id),
        )
        .route(
            "/{id}",
            get(handlers::handle_fetch).put(handlers::handle_acknowledge),
        )
        .nest("/api", api_routes)
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::CONNECTION,
            HeaderValue::from_static("close"),
        ))
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(
    listener: TcpListener,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "transfer surface listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
