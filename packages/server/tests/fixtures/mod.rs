//! Test fixtures: an in-process server on an ephemeral port.

use std::{net::SocketAddr, sync::Arc};

use nebula_server::infrastructure::repository::InMemoryMessageRepository;
use tokio::{net::TcpListener, sync::oneshot};

/// Running server, stopped when dropped
pub struct TestServer {
    addr: SocketAddr,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    /// Start a server with an empty in-memory store
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let _ = nebula_server::serve(
                listener,
                Arc::new(InMemoryMessageRepository::new()),
                async move {
                    let _ = shutdown_rx.await;
                },
            )
            .await;
        });

        Self {
            addr,
            _shutdown: shutdown_tx,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, room_id: &str) -> String {
        format!("ws://{}/ws/{}", self.addr, room_id)
    }
}
