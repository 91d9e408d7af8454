//! Router construction and server entry points.

use std::{future::Future, net::SocketAddr, sync::Arc};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    domain::MessageRepository,
    infrastructure::repository::InMemoryMessageRepository,
    ui::{handler, signal::shutdown_signal, state::AppState},
};

/// Build the application router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handler::health_check))
        .route(
            "/messages",
            get(handler::list_messages).post(handler::create_message),
        )
        .route("/ws/{room_id}", get(handler::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    repository: Arc<dyn MessageRepository>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = Arc::new(AppState::new(repository));
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Bind `addr` and serve with an in-memory message store until Ctrl+C.
pub async fn run(addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(
        listener,
        Arc::new(InMemoryMessageRepository::new()),
        shutdown_signal(),
    )
    .await
}
