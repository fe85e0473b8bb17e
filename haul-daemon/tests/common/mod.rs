//! Shared fixture: an in-process daemon driven over an in-memory duplex
//! stream, speaking the real wire protocol through the real codec.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tempfile::TempDir;
use tokio::io::DuplexStream;
use tokio_util::codec::Framed;

use haul_core::MockEngine;
use haul_daemon::{DaemonConfig, DaemonState, connection};
use haul_proto::{
    Compression, Envelope, EnvelopeCodec, Event, Message, Request, Response,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

pub struct TestDaemon {
    pub state: Arc<DaemonState>,
    pub engine: Arc<MockEngine>,
    _dir: TempDir,
}

/// Accounts available in every test daemon: `admin`, `worker` (normal
/// level), and `watcher` (read-only).
pub async fn daemon() -> TestDaemon {
    let dir = TempDir::new().unwrap();
    let auth_file = dir.path().join("auth.toml");
    std::fs::write(
        &auth_file,
        r#"
[accounts.admin]
password = "adminpass"
level = "admin"

[accounts.worker]
password = "workerpass"
level = "normal"

[accounts.watcher]
password = "watcherpass"
level = "read_only"
"#,
    )
    .unwrap();

    let config = DaemonConfig {
        auth_file,
        plugin_dir: dir.path().join("plugins"),
        idle_timeout_secs: 5,
        handler_timeout_secs: 0,
        outbound_queue_capacity: 8,
        ..DaemonConfig::default()
    };

    let engine = Arc::new(MockEngine::new());
    let state = DaemonState::build(config, engine.clone()).await.unwrap();
    TestDaemon {
        state,
        engine,
        _dir: dir,
    }
}

impl TestDaemon {
    /// Open a connection without performing the handshake.
    pub fn connect_raw(&self) -> TestClient {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let peer: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        tokio::spawn(connection::drive(server_io, peer, self.state.clone()));
        TestClient {
            framed: Framed::new(client_io, EnvelopeCodec::default()),
            next_id: 1,
        }
    }

    /// Open a connection and complete the hello handshake.
    pub async fn connect(&self) -> TestClient {
        let mut client = self.connect_raw();
        client
            .send(Message::Hello {
                compression: vec![Compression::None],
            })
            .await;
        match client.recv().await {
            Some(Message::HelloAck { compression }) => {
                assert_eq!(compression, Compression::None);
            }
            other => panic!("expected hello_ack, got {other:?}"),
        }
        client
    }

    /// Open a connection, handshake, and log in.
    pub async fn connect_as(&self, username: &str, password: &str) -> TestClient {
        let mut client = self.connect().await;
        let response = client.login(username, password).await;
        assert!(
            response.as_fault().is_none(),
            "login failed: {:?}",
            response.as_fault()
        );
        client
    }
}

pub struct TestClient {
    framed: Framed<DuplexStream, EnvelopeCodec>,
    next_id: u64,
}

impl TestClient {
    pub async fn send(&mut self, message: Message) {
        self.send_envelope(Envelope::new(message)).await;
    }

    pub async fn send_envelope(&mut self, envelope: Envelope) {
        self.framed.send(envelope).await.unwrap();
    }

    /// Next message from the daemon, or `None` if the connection closed.
    pub async fn recv(&mut self) -> Option<Message> {
        match tokio::time::timeout(RECV_TIMEOUT, self.framed.next()).await {
            Err(_elapsed) => panic!("timed out waiting for a frame"),
            Ok(None) => None,
            Ok(Some(frame)) => Some(frame.unwrap().message),
        }
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Response {
        self.request(
            "daemon.login",
            vec![
                serde_json::json!(username),
                serde_json::json!(password),
            ],
        )
        .await
    }

    /// Issue a request and wait for its response, letting events pass by.
    pub async fn request(&mut self, operation: &str, args: Vec<serde_json::Value>) -> Response {
        let id = self.send_request(operation, args).await;
        self.response(id).await
    }

    /// Issue a request without waiting; returns the request id.
    pub async fn send_request(&mut self, operation: &str, args: Vec<serde_json::Value>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.send(Message::Request(Request {
            id,
            operation: operation.to_string(),
            args,
            kwargs: serde_json::Map::new(),
        }))
        .await;
        id
    }

    /// Wait for the response carrying this id, skipping events.
    pub async fn response(&mut self, id: u64) -> Response {
        loop {
            match self.recv().await {
                Some(Message::Response(response)) if response.id == id => return response,
                Some(Message::Event(_)) => continue,
                other => panic!("expected response {id}, got {other:?}"),
            }
        }
    }

    /// Wait for the next event, skipping nothing else.
    pub async fn expect_event(&mut self) -> Event {
        match self.recv().await {
            Some(Message::Event(event)) => event,
            other => panic!("expected event, got {other:?}"),
        }
    }

    /// Assert the daemon closed the connection.
    pub async fn expect_closed(&mut self) {
        assert!(self.recv().await.is_none(), "connection still open");
    }
}
