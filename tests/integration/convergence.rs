//! Integration test: ring formation and repair over real UDP.
//!
//! Nodes join one at a time through a bootstrap node; convergence is
//! driven by the live stabilize timers, not by test-orchestrated
//! rounds.

use std::time::Duration;

use strand_integration_tests::{UdpCluster, wait_for};
use strand_ring::NodeEvent;

/// Two nodes: the joiner splices in directly, no walk needed.
#[tokio::test]
async fn test_two_node_ring_forms() {
    let c = UdpCluster::start(&["1", "2"]).await;
    c.node(0).create_ring().await.unwrap();
    c.node(1).join(c.node_id(0)).await.unwrap();

    wait_for("two-node ring", || c.ring_converged(&[0, 1])).await;

    let snapshot = c.node(1).info().await.unwrap();
    assert_eq!(snapshot.successor.id, c.node_id(0));
    assert_eq!(snapshot.predecessor.id, c.node_id(0));
    c.shutdown().await;
}

/// Three nodes joining through the same bootstrap converge to the
/// digest-ordered cycle 1 -> 2 -> 3 -> 1 within a few stabilize rounds.
#[tokio::test]
async fn test_three_node_ring_converges() {
    let c = UdpCluster::start(&["1", "2", "3"]).await;
    c.node(0).create_ring().await.unwrap();
    c.node(1).join(c.node_id(0)).await.unwrap();
    wait_for("two-node ring", || c.ring_converged(&[0, 1])).await;

    c.node(2).join(c.node_id(0)).await.unwrap();
    wait_for("three-node ring", || c.ring_converged(&[0, 1, 2])).await;

    let snapshot = c.node(0).info().await.unwrap();
    assert_eq!(snapshot.successor.id, c.node_id(1));
    assert_eq!(snapshot.predecessor.id, c.node_id(2));
    c.shutdown().await;
}

/// A ring walk started at one node visits every node exactly once and
/// dies when the token returns to the origin.
#[tokio::test]
async fn test_ring_walk_visits_every_node() {
    let c = UdpCluster::start(&["1", "2", "3"]).await;
    c.node(0).create_ring().await.unwrap();
    c.node(1).join(c.node_id(0)).await.unwrap();
    wait_for("two-node ring", || c.ring_converged(&[0, 1])).await;
    c.node(2).join(c.node_id(0)).await.unwrap();
    wait_for("three-node ring", || c.ring_converged(&[0, 1, 2])).await;

    let mut receivers: Vec<_> = (0..3).map(|i| c.node(i).subscribe()).collect();
    c.node(0).ring_walk().await.unwrap();

    for (i, receiver) in receivers.iter_mut().enumerate() {
        let event = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .unwrap_or_else(|_| panic!("node {i} never saw the walk"))
            .unwrap();
        match event {
            NodeEvent::WalkVisited { state } => {
                assert_eq!(state.myself.id, c.node_id(i));
            }
            other => panic!("unexpected event on node {i}: {other:?}"),
        }
    }
    c.shutdown().await;
}

/// A clean departure hands the leaver's neighbours to each other; the
/// survivors keep a consistent two-node ring.
#[tokio::test]
async fn test_departure_rewires_ring() {
    let c = UdpCluster::start(&["1", "2", "3"]).await;
    c.node(0).create_ring().await.unwrap();
    c.node(1).join(c.node_id(0)).await.unwrap();
    wait_for("two-node ring", || c.ring_converged(&[0, 1])).await;
    c.node(2).join(c.node_id(0)).await.unwrap();
    wait_for("three-node ring", || c.ring_converged(&[0, 1, 2])).await;

    c.node(1).leave().await.unwrap();
    wait_for("survivor ring", || c.ring_converged(&[0, 2])).await;

    // The leaver is back to an inactive singleton.
    let snapshot = c.node(1).info().await.unwrap();
    assert_eq!(snapshot.successor.id, c.node_id(1));
    assert_eq!(snapshot.predecessor.id, c.node_id(1));
    c.shutdown().await;
}
