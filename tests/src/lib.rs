//! Shared test harness for Strand integration tests.
//!
//! Provides [`UdpCluster`] — N node tasks wired together through real
//! UDP sockets on loopback, exercising the full pipeline: console
//! command → engine → codec → socket → receive loop → engine.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use strand_net::{StaticDirectory, UdpTransport};
use strand_ring::{NodeHandle, RingConfig, RingEngine};
use strand_types::{NodeId, SeqKeySpace};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How long [`wait_for`] polls before giving up.
const CONVERGENCE_DEADLINE: Duration = Duration::from_secs(5);

/// A running cluster of node tasks on loopback UDP.
pub struct UdpCluster {
    names: Vec<NodeId>,
    handles: Vec<NodeHandle>,
    recv_loops: Vec<JoinHandle<()>>,
}

impl UdpCluster {
    /// Bind one socket per name, build the shared roster, and spawn
    /// every node task. All nodes start as inactive singletons.
    pub async fn start(names: &[&str]) -> Self {
        // Bind everything first so the roster has real port numbers.
        let mut transports = Vec::new();
        let mut directory = StaticDirectory::default();
        for name in names {
            let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
                .await
                .unwrap();
            directory.insert(NodeId::from(*name), transport.local_addr().unwrap());
            transports.push(transport);
        }
        let directory = Arc::new(directory);

        let mut handles = Vec::new();
        let mut recv_loops = Vec::new();
        for (name, transport) in names.iter().zip(transports) {
            let (inbound_tx, inbound_rx) = mpsc::channel(64);
            recv_loops.push(transport.spawn_recv_loop(inbound_tx));
            let engine = RingEngine::new(
                NodeId::from(*name),
                RingConfig::test_config(),
                Arc::new(SeqKeySpace),
                Arc::new(transport),
                directory.clone(),
            );
            handles.push(strand_ring::start(engine, inbound_rx));
        }

        Self {
            names: names.iter().map(|n| NodeId::from(*n)).collect(),
            handles,
            recv_loops,
        }
    }

    pub fn node(&self, i: usize) -> &NodeHandle {
        &self.handles[i]
    }

    pub fn node_id(&self, i: usize) -> NodeId {
        self.names[i].clone()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Whether the given nodes currently form one consistent ring:
    /// successor pointers cycle through exactly those nodes, and every
    /// predecessor/successor pair is mutual.
    pub async fn ring_converged(&self, members: &[usize]) -> bool {
        let mut pointers = HashMap::new();
        for &i in members {
            let Ok(snapshot) = self.handles[i].info().await else {
                return false;
            };
            pointers.insert(
                snapshot.myself.id.clone(),
                (snapshot.predecessor.id, snapshot.successor.id),
            );
        }
        for (id, (predecessor, successor)) in &pointers {
            let Some((_, pred_successor)) = pointers.get(predecessor) else {
                return false;
            };
            let Some((suc_predecessor, _)) = pointers.get(successor) else {
                return false;
            };
            if pred_successor != id || suc_predecessor != id {
                return false;
            }
        }
        // Mutual pointers still allow disjoint cycles; require a single
        // one covering every member.
        let start = self.names[members[0]].clone();
        let mut current = start.clone();
        let mut steps = 0;
        loop {
            current = pointers[&current].1.clone();
            steps += 1;
            if current == start {
                return steps == members.len();
            }
            if steps > members.len() {
                return false;
            }
        }
    }

    /// Stop every node task and receive loop.
    pub async fn shutdown(self) {
        for handle in self.handles {
            handle.shutdown().await;
        }
        for recv_loop in self.recv_loops {
            recv_loop.abort();
        }
    }
}

/// Poll `check` until it returns true or the deadline passes.
pub async fn wait_for<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + CONVERGENCE_DEADLINE;
    loop {
        if check().await {
            return;
        }
        if Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
