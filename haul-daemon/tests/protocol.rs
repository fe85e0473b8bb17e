//! Wire protocol behavior: handshake, login, and protocol violations.

mod common;

use haul_proto::{Compression, Envelope, FaultKind, Message, Request};
use serde_json::json;

#[tokio::test]
async fn handshake_then_login_succeeds() {
    let daemon = common::daemon().await;
    let mut client = daemon.connect().await;

    let response = client.login("admin", "adminpass").await;
    match response.body {
        haul_proto::ResponseBody::Result(value) => {
            assert_eq!(value["level"], json!("admin"));
        }
        haul_proto::ResponseBody::Fault(fault) => panic!("login fault: {}", fault.message),
    }
}

#[tokio::test]
async fn wrong_password_is_auth_fault_and_session_survives() {
    let daemon = common::daemon().await;
    let mut client = daemon.connect().await;

    let response = client.login("admin", "wrong").await;
    assert_eq!(response.as_fault().unwrap().kind, FaultKind::AuthError);

    // Connection still usable: a second login with good credentials works
    let response = client.login("admin", "adminpass").await;
    assert!(response.as_fault().is_none());
}

#[tokio::test]
async fn unauthenticated_request_is_denied_not_fatal() {
    let daemon = common::daemon().await;
    let mut client = daemon.connect().await;

    // No login: level is none, and even read-only operations require more
    let response = client.request("daemon.info", vec![]).await;
    assert_eq!(response.as_fault().unwrap().kind, FaultKind::AuthError);

    let response = client.login("watcher", "watcherpass").await;
    assert!(response.as_fault().is_none());
    let response = client.request("daemon.info", vec![]).await;
    assert!(response.as_fault().is_none());
}

#[tokio::test]
async fn request_before_hello_closes_connection() {
    let daemon = common::daemon().await;
    let mut client = daemon.connect_raw();

    client
        .send(Message::Request(Request {
            id: 1,
            operation: "daemon.info".to_string(),
            args: Vec::new(),
            kwargs: serde_json::Map::new(),
        }))
        .await;

    client.expect_closed().await;
}

#[tokio::test]
async fn unsupported_version_closes_connection() {
    let daemon = common::daemon().await;
    let mut client = daemon.connect_raw();

    client
        .send_envelope(Envelope {
            version: 99,
            message: Message::Hello {
                compression: vec![Compression::None],
            },
        })
        .await;

    client.expect_closed().await;
}

#[tokio::test]
async fn daemon_never_negotiates_compression() {
    let daemon = common::daemon().await;
    let mut client = daemon.connect_raw();

    client
        .send(Message::Hello {
            compression: vec![Compression::None],
        })
        .await;

    match client.recv().await {
        Some(Message::HelloAck { compression }) => assert_eq!(compression, Compression::None),
        other => panic!("expected hello_ack, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_operation_is_method_not_found_and_session_survives() {
    let daemon = common::daemon().await;
    let mut client = daemon.connect_as("admin", "adminpass").await;

    let response = client.request("no.such.operation", vec![]).await;
    let fault = response.as_fault().unwrap();
    assert_eq!(fault.kind, FaultKind::MethodNotFound);
    assert!(fault.message.contains("no.such.operation"));

    let response = client.request("daemon.info", vec![]).await;
    assert!(response.as_fault().is_none());
}

#[tokio::test]
async fn client_sending_event_is_a_protocol_violation() {
    let daemon = common::daemon().await;
    let mut client = daemon.connect().await;

    client
        .send(Message::Event(haul_proto::Event::new("fake", json!({}))))
        .await;

    client.expect_closed().await;
}

#[tokio::test]
async fn closing_a_session_frees_it_in_the_manager() {
    let daemon = common::daemon().await;
    let client = daemon.connect().await;
    assert_eq!(daemon.state.sessions.session_count().await, 1);

    drop(client);

    // The driver notices EOF and tears the session down
    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while daemon.state.sessions.session_count().await != 0 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session was never closed");
}
