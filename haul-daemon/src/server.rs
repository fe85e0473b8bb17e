//! TLS accept loop

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

use crate::connection;
use crate::state::DaemonState;

/// Accept connections until shutdown is signalled.
pub async fn run(state: Arc<DaemonState>, acceptor: TlsAcceptor) -> std::io::Result<()> {
    let listener = TcpListener::bind(&state.config.listen_addr).await?;
    info!(addr = %state.config.listen_addr, "daemon listening");

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                info!("shutdown signalled, no longer accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let acceptor = acceptor.clone();
                let state = state.clone();
                tokio::spawn(async move {
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => connection::drive(tls_stream, peer, state).await,
                        Err(e) => warn!(peer = %peer, error = %e, "TLS handshake failed"),
                    }
                });
            }
        }
    }
}
