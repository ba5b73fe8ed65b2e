//! Integration test: liveness probes over real UDP.

use std::time::Duration;

use strand_integration_tests::UdpCluster;
use strand_ring::NodeEvent;
use strand_types::NodeId;

/// Wait for the next ping-related event on `receiver`.
async fn next_ping_event(
    receiver: &mut tokio::sync::broadcast::Receiver<NodeEvent>,
) -> NodeEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("timed out waiting for ping event")
            .expect("event stream closed");
        match event {
            NodeEvent::PingSucceeded { .. }
            | NodeEvent::PingFailed { .. }
            | NodeEvent::PingReceived { .. } => return event,
            _ => {}
        }
    }
}

/// A ping between two live nodes echoes the text back and is reported
/// on both sides.
#[tokio::test]
async fn test_ping_roundtrip() {
    let c = UdpCluster::start(&["1", "2"]).await;
    let mut sender_events = c.node(0).subscribe();
    let mut receiver_events = c.node(1).subscribe();

    c.node(0)
        .send_ping(c.node_id(1), "you alive?".into())
        .await
        .unwrap();

    match next_ping_event(&mut sender_events).await {
        NodeEvent::PingSucceeded { peer, text } => {
            assert_eq!(peer, c.node_id(1));
            assert_eq!(text, "you alive?");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    match next_ping_event(&mut receiver_events).await {
        NodeEvent::PingReceived { from, text } => {
            assert_eq!(from, c.node_id(0));
            assert_eq!(text, "you alive?");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    c.shutdown().await;
}

/// Pinging an identifier absent from the roster fails without waiting
/// for any timeout.
#[tokio::test]
async fn test_ping_unknown_node_fails_immediately() {
    let c = UdpCluster::start(&["1"]).await;
    let mut events = c.node(0).subscribe();

    c.node(0)
        .send_ping(NodeId::from("ghost"), "hello?".into())
        .await
        .unwrap();

    match next_ping_event(&mut events).await {
        NodeEvent::PingFailed { peer, .. } => assert_eq!(peer, NodeId::from("ghost")),
        other => panic!("unexpected event: {other:?}"),
    }
    c.shutdown().await;
}

/// A ping to a node that never answers is reported failed by the audit
/// once the timeout elapses.
#[tokio::test]
async fn test_ping_timeout_reported() {
    let c = UdpCluster::start(&["1", "2"]).await;
    // Stop node 2's task: datagrams still land on its socket buffer but
    // nothing ever answers.
    c.node(1).abort();
    let mut events = c.node(0).subscribe();

    c.node(0)
        .send_ping(c.node_id(1), "anyone home?".into())
        .await
        .unwrap();

    match next_ping_event(&mut events).await {
        NodeEvent::PingFailed { peer, text } => {
            assert_eq!(peer, c.node_id(1));
            assert_eq!(text, "anyone home?");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    c.shutdown().await;
}
