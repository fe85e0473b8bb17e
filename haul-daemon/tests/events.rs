//! Event fan-out over the wire: subscription filters, multi-session
//! delivery, and isolation between sessions.

mod common;

use haul_core::{JobStatusChange, StatusKind};
use serde_json::json;

fn status_change(job_id: &str, detail: serde_json::Value) -> JobStatusChange {
    JobStatusChange {
        job_id: job_id.to_string(),
        kind: StatusKind::StatusChanged,
        detail,
    }
}

#[tokio::test]
async fn two_subscribed_sessions_each_get_the_event_once() {
    let daemon = common::daemon().await;
    let mut first = daemon.connect_as("watcher", "watcherpass").await;
    let mut second = daemon.connect_as("worker", "workerpass").await;

    let response = first.request("daemon.subscribe", vec![json!("job.status")]).await;
    assert!(response.as_fault().is_none());
    let response = second.request("daemon.subscribe", vec![json!("job.status")]).await;
    assert!(response.as_fault().is_none());

    daemon.engine.emit(status_change("j-1", json!({"state": "seeding"})));

    for client in [&mut first, &mut second] {
        let event = client.expect_event().await;
        assert_eq!(event.name, "job.status");
        assert_eq!(event.payload["job_id"], json!("j-1"));
    }
}

#[tokio::test]
async fn unsubscribed_session_receives_nothing() {
    let daemon = common::daemon().await;
    let mut subscribed = daemon.connect_as("watcher", "watcherpass").await;
    let mut bystander = daemon.connect_as("worker", "workerpass").await;

    let response = subscribed
        .request("daemon.subscribe", vec![json!("job.status")])
        .await;
    assert!(response.as_fault().is_none());

    daemon.engine.emit(status_change("j-1", json!({})));

    subscribed.expect_event().await;

    // The bystander sees only its next response, no stray event
    let response = bystander.request("daemon.info", vec![]).await;
    assert!(response.as_fault().is_none());
}

#[tokio::test]
async fn events_arrive_in_publish_order() {
    let daemon = common::daemon().await;
    let mut client = daemon.connect_as("watcher", "watcherpass").await;
    let response = client
        .request("daemon.subscribe", vec![json!("job.progress")])
        .await;
    assert!(response.as_fault().is_none());

    for i in 0..4 {
        daemon.engine.emit(JobStatusChange {
            job_id: "j-1".to_string(),
            kind: StatusKind::Progress,
            detail: json!({ "seq": i }),
        });
    }

    for i in 0..4 {
        let event = client.expect_event().await;
        assert_eq!(event.payload["detail"]["seq"], json!(i));
    }
}

#[tokio::test]
async fn unsubscribe_stops_the_stream() {
    let daemon = common::daemon().await;
    let mut client = daemon.connect_as("watcher", "watcherpass").await;

    let response = client
        .request("daemon.subscribe", vec![json!("job.status")])
        .await;
    assert!(response.as_fault().is_none());
    let response = client
        .request("daemon.unsubscribe", vec![json!("job.status")])
        .await;
    assert!(response.as_fault().is_none());

    daemon.engine.emit(status_change("j-1", json!({})));

    // Only the next response arrives; the event was filtered out
    let response = client.request("daemon.info", vec![]).await;
    assert!(response.as_fault().is_none());
}

#[tokio::test]
async fn closing_one_subscriber_leaves_the_other_delivering() {
    let daemon = common::daemon().await;
    let mut doomed = daemon.connect_as("watcher", "watcherpass").await;
    let mut survivor = daemon.connect_as("worker", "workerpass").await;

    let response = doomed.request("daemon.subscribe", vec![json!("job.status")]).await;
    assert!(response.as_fault().is_none());
    let response = survivor
        .request("daemon.subscribe", vec![json!("job.status")])
        .await;
    assert!(response.as_fault().is_none());

    drop(doomed);

    // Wait for the daemon to reap the dropped session
    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while daemon.state.sessions.session_count().await != 1 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("closed session was never reaped");

    daemon.engine.emit(status_change("j-1", json!({})));

    let event = survivor.expect_event().await;
    assert_eq!(event.name, "job.status");
}

#[tokio::test]
async fn job_add_notifies_subscribers_of_other_sessions() {
    let daemon = common::daemon().await;
    let mut watcher = daemon.connect_as("watcher", "watcherpass").await;
    let mut admin = daemon.connect_as("admin", "adminpass").await;

    let response = watcher
        .request("daemon.subscribe", vec![json!("job.added")])
        .await;
    assert!(response.as_fault().is_none());

    let response = admin.request("job.add", vec![json!("magnet:?x")]).await;
    assert!(response.as_fault().is_none());

    let event = watcher.expect_event().await;
    assert_eq!(event.name, "job.added");
}
