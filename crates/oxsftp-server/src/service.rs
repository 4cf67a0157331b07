//! Connection service: one engine per byte stream.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use oxsftp_core::{Engine, Result, SessionConfig};

use crate::backend::LocalBackend;

/// Serve one SFTP session on stdin/stdout, the way an SSH daemon invokes a
/// subsystem. Returns when the peer closes the stream.
pub async fn serve_stdio(config: SessionConfig) -> Result<()> {
    let backend = Arc::new(LocalBackend::new());
    let engine = Engine::new(config, backend, Box::new(tokio::io::stdout()));
    engine.run(tokio::io::stdin()).await
}

/// Accept TCP connections and run an independent engine per connection.
///
/// This transport carries no authentication or encryption of its own; bind
/// it to loopback or an otherwise trusted network.
pub async fn serve_tcp(addr: SocketAddr, config: SessionConfig) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        info!(peer = %peer, "accepted connection");
        let config = config.clone();
        tokio::spawn(async move {
            let (read_half, write_half) = stream.into_split();
            let backend = Arc::new(LocalBackend::new());
            let engine = Engine::new(config, backend, Box::new(write_half));
            match engine.run(read_half).await {
                Ok(()) => info!(peer = %peer, "connection closed"),
                Err(e) => warn!(peer = %peer, error = %e, "connection failed"),
            }
        });
    }
}
