//! The ring membership engine.
//!
//! [`RingEngine`] owns one node's ring state and implements every
//! protocol operation: join insertion, pull-based stabilization,
//! predecessor/successor notification, clean departure, the liveness
//! probe, and the diagnostic ring walk. It is strictly single-threaded:
//! the node actor in [`node`](crate::node) feeds it inbound datagrams,
//! console commands, and timer firings one at a time.
//!
//! All placement decisions use the circular half-open interval
//! [`Digest::in_interval`]; notify acceptance follows the configured
//! [`NotifyPolicy`](crate::NotifyPolicy).

use std::net::SocketAddr;
use std::sync::Arc;

use strand_net::{Directory, Envelope, RingMessage, Transport};
use strand_types::{Digest, KeySpace, NodeId};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{NotifyPolicy, RingConfig};
use crate::error::RingError;
use crate::probe::ProbeTracker;

/// A ring participant: identifier plus its position on the ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Logical identifier.
    pub id: NodeId,
    /// Ring position, `keyspace.digest(&id)`.
    pub digest: Digest,
}

/// Copy of one node's ring pointers, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingSnapshot {
    /// The node itself.
    pub myself: Peer,
    /// Current predecessor pointer.
    pub predecessor: Peer,
    /// Current successor pointer.
    pub successor: Peer,
}

/// Indications surfaced by the engine to subscribers.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// A ping was answered before the timeout.
    PingSucceeded {
        /// The node that answered.
        peer: NodeId,
        /// Text echoed back.
        text: String,
    },
    /// A ping failed: unresolved destination or timeout expiry.
    PingFailed {
        /// The node the ping was addressed to.
        peer: NodeId,
        /// Text of the failed ping.
        text: String,
    },
    /// A ping arrived from a peer (already answered by the engine).
    PingReceived {
        /// The sender of the ping.
        from: NodeId,
        /// Text it carried.
        text: String,
    },
    /// A ring-walk token passed through this node.
    WalkVisited {
        /// The local ring state at the moment of the visit.
        state: RingSnapshot,
    },
}

/// Per-node protocol state machine.
pub struct RingEngine {
    myself: Peer,
    predecessor: Peer,
    successor: Peer,
    config: RingConfig,
    keyspace: Arc<dyn KeySpace>,
    transport: Arc<dyn Transport>,
    directory: Arc<dyn Directory>,
    probes: ProbeTracker,
    /// Node-local counter, randomly seeded at start.
    next_txn_id: u32,
    /// Set by create/join, cleared by leave; gates the stabilize timer.
    stabilize_active: bool,
    events: broadcast::Sender<NodeEvent>,
}

impl RingEngine {
    /// Create an engine in the singleton state (predecessor and
    /// successor both pointing at the node itself).
    pub fn new(
        id: NodeId,
        config: RingConfig,
        keyspace: Arc<dyn KeySpace>,
        transport: Arc<dyn Transport>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        let digest = keyspace.digest(&id);
        let myself = Peer { id, digest };
        let (events, _) = broadcast::channel(256);
        Self {
            predecessor: myself.clone(),
            successor: myself.clone(),
            myself,
            config,
            keyspace,
            transport,
            directory,
            probes: ProbeTracker::default(),
            next_txn_id: rand::random::<u32>(),
            stabilize_active: false,
            events,
        }
    }

    /// Subscribe to engine indications.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<NodeEvent> {
        self.events.clone()
    }

    /// This node's identifier.
    pub fn id(&self) -> &NodeId {
        &self.myself.id
    }

    /// The engine's configuration.
    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    /// Copy of the current ring pointers.
    pub fn snapshot(&self) -> RingSnapshot {
        RingSnapshot {
            myself: self.myself.clone(),
            predecessor: self.predecessor.clone(),
            successor: self.successor.clone(),
        }
    }

    /// Whether this node is its own successor.
    pub fn is_singleton(&self) -> bool {
        self.successor.id == self.myself.id
    }

    /// Whether the stabilize timer should fire for this node.
    pub fn stabilize_active(&self) -> bool {
        self.stabilize_active
    }

    // -------------------------------------------------------------------
    // Console-driven operations
    // -------------------------------------------------------------------

    /// Become the sole member of a fresh ring.
    pub fn create_ring(&mut self) {
        self.predecessor = self.myself.clone();
        self.successor = self.myself.clone();
        self.stabilize_active = true;
        info!(node = %self.myself.id, "created ring as sole member");
    }

    /// Ask `bootstrap` to find this node's place in its ring.
    ///
    /// No local state changes until the JoinRsp arrives. Fails
    /// immediately when the bootstrap node cannot be resolved.
    pub async fn join(&mut self, bootstrap: &NodeId) -> Result<(), RingError> {
        if self.directory.resolve(bootstrap).is_none() {
            return Err(RingError::UnknownNode(bootstrap.clone()));
        }
        let txn_id = self.next_txn_id();
        info!(node = %self.myself.id, %bootstrap, "joining ring");
        self.send(
            bootstrap,
            txn_id,
            RingMessage::JoinReq {
                node_id: self.myself.id.clone(),
            },
        )
        .await;
        Ok(())
    }

    /// Depart cleanly: reset to singleton and hand each old neighbour a
    /// pointer to the other. Fire-and-forget; a lost notify leaves the
    /// ring inconsistent until stabilization repairs it, if ever.
    pub async fn leave(&mut self) {
        self.stabilize_active = false;
        self.probes.clear();
        if self.is_singleton() {
            debug!(node = %self.myself.id, "leave with no peers");
            return;
        }

        let old_predecessor = self.predecessor.clone();
        let old_successor = self.successor.clone();
        self.predecessor = self.myself.clone();
        self.successor = self.myself.clone();
        info!(
            node = %self.myself.id,
            predecessor = %old_predecessor.id,
            successor = %old_successor.id,
            "leaving ring"
        );

        let txn_id = self.next_txn_id();
        self.send(
            &old_predecessor.id,
            txn_id,
            RingMessage::NotifyPred {
                node_id: old_successor.id.clone(),
            },
        )
        .await;
        let txn_id = self.next_txn_id();
        self.send(
            &old_successor.id,
            txn_id,
            RingMessage::NotifySuc {
                node_id: old_predecessor.id,
            },
        )
        .await;
    }

    /// Start a diagnostic ring walk from this node.
    pub async fn ring_walk(&mut self) {
        self.log_ring_state();
        self.emit(NodeEvent::WalkVisited {
            state: self.snapshot(),
        });
        if self.is_singleton() {
            return;
        }
        let txn_id = self.next_txn_id();
        let successor = self.successor.id.clone();
        self.send(
            &successor,
            txn_id,
            RingMessage::RingState {
                origin: self.myself.id.clone(),
            },
        )
        .await;
    }

    // -------------------------------------------------------------------
    // Timer-driven operations
    // -------------------------------------------------------------------

    /// One stabilize round: ask the successor for its predecessor.
    pub async fn stabilize(&mut self) {
        if self.is_singleton() {
            debug!(node = %self.myself.id, "stabilize skipped: singleton");
            return;
        }
        debug!(node = %self.myself.id, successor = %self.successor.id, "stabilize");
        let txn_id = self.next_txn_id();
        let successor = self.successor.id.clone();
        self.send(
            &successor,
            txn_id,
            RingMessage::GetPredSucReq {
                asker: self.myself.id.clone(),
            },
        )
        .await;
    }

    /// Expire pings older than the configured timeout.
    pub async fn audit_pings(&mut self) {
        for (txn_id, probe) in self
            .probes
            .expire(Instant::now(), self.config.ping_timeout)
        {
            debug!(txn_id, peer = %probe.peer, "ping timed out");
            self.emit(NodeEvent::PingFailed {
                peer: probe.peer,
                text: probe.text,
            });
        }
    }

    // -------------------------------------------------------------------
    // Liveness probe
    // -------------------------------------------------------------------

    /// Send a ping to `dest`.
    ///
    /// An unresolvable destination fails immediately with no message
    /// sent; otherwise failure is only ever reported by the audit after
    /// the timeout elapses.
    pub async fn send_ping(&mut self, dest: NodeId, text: String) {
        if self.directory.resolve(&dest).is_none() {
            warn!(node = %self.myself.id, %dest, "ping destination unresolved");
            self.emit(NodeEvent::PingFailed { peer: dest, text });
            return;
        }
        let txn_id = self.next_txn_id();
        debug!(node = %self.myself.id, %dest, txn_id, "sending ping");
        self.probes.record(txn_id, dest.clone(), text.clone());
        self.send(&dest, txn_id, RingMessage::PingReq { text }).await;
    }

    // -------------------------------------------------------------------
    // Inbound dispatch
    // -------------------------------------------------------------------

    /// Decode and process one inbound datagram.
    ///
    /// Malformed payloads and unknown source addresses are logged and
    /// dropped; they must never take the node down.
    pub async fn handle_datagram(&mut self, from: SocketAddr, payload: &[u8]) {
        let envelope = match Envelope::decode(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(node = %self.myself.id, %from, %e, "dropping undecodable datagram");
                return;
            }
        };
        let Some(sender) = self.directory.reverse(&from) else {
            warn!(node = %self.myself.id, %from, "dropping message from unknown address");
            return;
        };
        self.handle_envelope(sender, envelope).await;
    }

    /// Process one already-decoded message from a known sender.
    pub async fn handle_envelope(&mut self, from: NodeId, envelope: Envelope) {
        let txn_id = envelope.txn_id;
        match envelope.message {
            RingMessage::PingReq { text } => self.on_ping_req(from, txn_id, text).await,
            RingMessage::PingRsp { text } => self.on_ping_rsp(from, txn_id, text),
            RingMessage::JoinReq { node_id } => self.on_join_req(from, txn_id, node_id).await,
            RingMessage::JoinRsp {
                successor,
                predecessor,
            } => self.on_join_rsp(from, txn_id, successor, predecessor).await,
            RingMessage::FindSucReq { target, asker } => {
                self.on_find_suc_req(from, txn_id, target, asker).await
            }
            RingMessage::FindSucRsp {
                origin,
                successor,
                predecessor,
            } => {
                self.on_find_suc_rsp(from, txn_id, origin, successor, predecessor)
                    .await
            }
            RingMessage::GetPredSucReq { asker } => {
                self.on_get_pred_suc_req(from, txn_id, asker).await
            }
            RingMessage::GetPredSucRsp { predecessor } => {
                self.on_get_pred_suc_rsp(from, txn_id, predecessor).await
            }
            RingMessage::NotifySuc { node_id } => self.on_notify_suc(from, node_id),
            RingMessage::NotifyPred { node_id } => self.on_notify_pred(from, node_id),
            RingMessage::RingState { origin } => self.on_ring_state(from, txn_id, origin).await,
        }
    }

    // -------------------------------------------------------------------
    // Join protocol
    // -------------------------------------------------------------------

    async fn on_join_req(&mut self, from: NodeId, txn_id: u32, node_id: NodeId) {
        debug!(node = %self.myself.id, %from, joiner = %node_id, "received JoinReq");
        if self.is_singleton() {
            // Sole member: the joiner becomes both neighbours.
            self.send(
                &node_id,
                txn_id,
                RingMessage::JoinRsp {
                    successor: self.myself.id.clone(),
                    predecessor: self.myself.id.clone(),
                },
            )
            .await;
        } else {
            let successor = self.successor.id.clone();
            self.send(
                &successor,
                txn_id,
                RingMessage::FindSucReq {
                    target: node_id,
                    asker: self.myself.id.clone(),
                },
            )
            .await;
        }
    }

    async fn on_find_suc_req(&mut self, from: NodeId, txn_id: u32, target: NodeId, asker: NodeId) {
        let digest = self.keyspace.digest(&target);
        debug!(node = %self.myself.id, %from, %target, %asker, "received FindSucReq");
        if digest == self.myself.digest {
            debug!(node = %self.myself.id, %target, "join target already present, dropping");
            return;
        }

        match self.config.notify_policy {
            NotifyPolicy::Guarded => {
                if digest == self.successor.digest {
                    debug!(node = %self.myself.id, %target, "join target already present, dropping");
                } else if digest.in_interval(&self.myself.digest, &self.successor.digest) {
                    // Fits between this node and its successor.
                    let response = RingMessage::JoinRsp {
                        successor: self.successor.id.clone(),
                        predecessor: self.myself.id.clone(),
                    };
                    self.send(&target, txn_id, response).await;
                    self.successor = self.peer(target);
                    info!(node = %self.myself.id, successor = %self.successor.id, "adopted joiner as successor");
                } else if digest.in_interval(&self.predecessor.digest, &self.myself.digest) {
                    // Fits immediately before this node.
                    let response = RingMessage::JoinRsp {
                        successor: self.myself.id.clone(),
                        predecessor: self.predecessor.id.clone(),
                    };
                    self.send(&target, txn_id, response).await;
                    self.predecessor = self.peer(target);
                    info!(node = %self.myself.id, predecessor = %self.predecessor.id, "adopted joiner as predecessor");
                } else {
                    // Not our segment: continue the walk.
                    let successor = self.successor.id.clone();
                    self.send(&successor, txn_id, RingMessage::FindSucReq { target, asker })
                        .await;
                }
            }
            NotifyPolicy::Unconditional => {
                // Observed baseline: linear digest comparison, no wrap.
                if digest > self.myself.digest {
                    if self.myself.digest > self.predecessor.digest {
                        let response = RingMessage::JoinRsp {
                            successor: self.successor.id.clone(),
                            predecessor: self.myself.id.clone(),
                        };
                        self.send(&target, txn_id, response).await;
                        self.predecessor = self.peer(target);
                    } else {
                        let successor = self.successor.id.clone();
                        self.send(&successor, txn_id, RingMessage::FindSucReq { target, asker })
                            .await;
                    }
                } else {
                    let response = RingMessage::JoinRsp {
                        successor: self.myself.id.clone(),
                        predecessor: self.predecessor.id.clone(),
                    };
                    self.send(&target, txn_id, response).await;
                    self.predecessor = self.peer(target);
                }
            }
        }
    }

    async fn on_find_suc_rsp(
        &mut self,
        from: NodeId,
        txn_id: u32,
        origin: NodeId,
        successor: NodeId,
        predecessor: NodeId,
    ) {
        // Repackage the walk result for the node that actually joined.
        debug!(node = %self.myself.id, %from, %origin, "received FindSucRsp");
        self.send(
            &origin,
            txn_id,
            RingMessage::JoinRsp {
                successor,
                predecessor,
            },
        )
        .await;
    }

    async fn on_join_rsp(
        &mut self,
        from: NodeId,
        txn_id: u32,
        successor: NodeId,
        predecessor: NodeId,
    ) {
        self.successor = self.peer(successor);
        self.predecessor = self.peer(predecessor);
        self.stabilize_active = true;
        info!(
            node = %self.myself.id,
            %from,
            successor = %self.successor.id,
            predecessor = %self.predecessor.id,
            "joined ring"
        );
        // Announce ourselves to the new predecessor; the successor side
        // is repaired by the next stabilize round (pull, not push).
        let predecessor = self.predecessor.id.clone();
        self.send(
            &predecessor,
            txn_id,
            RingMessage::NotifyPred {
                node_id: self.myself.id.clone(),
            },
        )
        .await;
    }

    // -------------------------------------------------------------------
    // Stabilization
    // -------------------------------------------------------------------

    async fn on_get_pred_suc_req(&mut self, from: NodeId, txn_id: u32, asker: NodeId) {
        debug!(node = %self.myself.id, %asker, "received GetPredSucReq");
        self.send(
            &from,
            txn_id,
            RingMessage::GetPredSucRsp {
                predecessor: self.predecessor.id.clone(),
            },
        )
        .await;
    }

    async fn on_get_pred_suc_rsp(&mut self, from: NodeId, txn_id: u32, predecessor: NodeId) {
        let digest = self.keyspace.digest(&predecessor);
        debug!(node = %self.myself.id, %from, reported = %predecessor, "received GetPredSucRsp");

        match self.config.notify_policy {
            NotifyPolicy::Guarded => {
                if digest != self.myself.digest
                    && digest != self.successor.digest
                    && digest.in_interval(&self.myself.digest, &self.successor.digest)
                {
                    info!(
                        node = %self.myself.id,
                        old = %self.successor.id,
                        new = %predecessor,
                        "stabilize adopted closer successor"
                    );
                    self.successor = self.peer(predecessor);
                }
                // Announce ourselves every round so the successor's
                // predecessor pointer converges even without changes here.
                if !self.is_singleton() {
                    let successor = self.successor.id.clone();
                    self.send(
                        &successor,
                        txn_id,
                        RingMessage::NotifySuc {
                            node_id: self.myself.id.clone(),
                        },
                    )
                    .await;
                }
            }
            NotifyPolicy::Unconditional => {
                // Observed baseline: adopt anything strictly above us,
                // announce only on adoption.
                if digest != self.myself.digest && digest > self.myself.digest {
                    self.successor = self.peer(predecessor);
                    let successor = self.successor.id.clone();
                    self.send(
                        &successor,
                        txn_id,
                        RingMessage::NotifySuc {
                            node_id: self.myself.id.clone(),
                        },
                    )
                    .await;
                }
            }
        }
    }

    // -------------------------------------------------------------------
    // Notify handling
    // -------------------------------------------------------------------

    fn on_notify_pred(&mut self, from: NodeId, node_id: NodeId) {
        let candidate = self.peer(node_id);
        let accept = match self.config.notify_policy {
            NotifyPolicy::Unconditional => true,
            NotifyPolicy::Guarded => {
                self.is_singleton()
                    || candidate
                        .digest
                        .in_interval(&self.myself.digest, &self.successor.digest)
                    // Our current successor handing off its replacement.
                    || from == self.successor.id
            }
        };
        if !accept {
            debug!(node = %self.myself.id, %from, candidate = %candidate.id, "ignoring NotifyPred");
            return;
        }
        debug!(node = %self.myself.id, successor = %candidate.id, "NotifyPred accepted");
        self.successor = candidate.clone();
        if self.predecessor.id == self.myself.id {
            self.predecessor = candidate;
        }
    }

    fn on_notify_suc(&mut self, from: NodeId, node_id: NodeId) {
        let candidate = self.peer(node_id);
        let accept = match self.config.notify_policy {
            NotifyPolicy::Unconditional => true,
            NotifyPolicy::Guarded => {
                self.predecessor.id == self.myself.id
                    || candidate.digest == self.predecessor.digest
                    || candidate
                        .digest
                        .in_interval(&self.predecessor.digest, &self.myself.digest)
                    // Our current predecessor handing off its replacement.
                    || from == self.predecessor.id
            }
        };
        if !accept {
            debug!(node = %self.myself.id, %from, candidate = %candidate.id, "ignoring NotifySuc");
            return;
        }
        debug!(node = %self.myself.id, predecessor = %candidate.id, "NotifySuc accepted");
        self.predecessor = candidate.clone();
        if self.successor.id == self.myself.id {
            self.successor = candidate;
        }
    }

    // -------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------

    async fn on_ring_state(&mut self, from: NodeId, txn_id: u32, origin: NodeId) {
        if origin == self.myself.id {
            debug!(node = %self.myself.id, "ring walk returned to origin");
            return;
        }
        self.log_ring_state();
        self.emit(NodeEvent::WalkVisited {
            state: self.snapshot(),
        });
        if self.is_singleton() {
            debug!(node = %self.myself.id, %from, "ring walk stranded at singleton");
            return;
        }
        let successor = self.successor.id.clone();
        self.send(&successor, txn_id, RingMessage::RingState { origin })
            .await;
    }

    fn log_ring_state(&self) {
        info!(
            "Ringstate<{}>: Pred<{}, {}>: Succ<{}, {}>",
            self.myself.digest,
            self.predecessor.id,
            self.predecessor.digest,
            self.successor.id,
            self.successor.digest,
        );
    }

    // -------------------------------------------------------------------
    // Liveness probe handlers
    // -------------------------------------------------------------------

    async fn on_ping_req(&mut self, from: NodeId, txn_id: u32, text: String) {
        debug!(node = %self.myself.id, %from, %text, "received PingReq");
        self.send(&from, txn_id, RingMessage::PingRsp { text: text.clone() })
            .await;
        self.emit(NodeEvent::PingReceived { from, text });
    }

    fn on_ping_rsp(&mut self, from: NodeId, txn_id: u32, text: String) {
        match self.probes.settle(txn_id) {
            Some(_) => {
                debug!(node = %self.myself.id, %from, txn_id, "ping answered");
                self.emit(NodeEvent::PingSucceeded { peer: from, text });
            }
            None => {
                // Duplicate or already timed out; nothing to do.
                debug!(node = %self.myself.id, %from, txn_id, "unmatched ping response");
            }
        }
    }

    // -------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------

    fn peer(&self, id: NodeId) -> Peer {
        let digest = self.keyspace.digest(&id);
        Peer { id, digest }
    }

    fn next_txn_id(&mut self) -> u32 {
        let txn_id = self.next_txn_id;
        self.next_txn_id = self.next_txn_id.wrapping_add(1);
        txn_id
    }

    fn emit(&self, event: NodeEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Resolve, encode, and send; unresolved destinations and transport
    /// failures are logged and otherwise ignored (fire-and-forget).
    async fn send(&self, dest: &NodeId, txn_id: u32, message: RingMessage) {
        let Some(addr) = self.directory.resolve(dest) else {
            warn!(node = %self.myself.id, %dest, "cannot send: destination unresolved");
            return;
        };
        let envelope = Envelope::new(txn_id, message);
        let payload = match envelope.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(node = %self.myself.id, %dest, %e, "cannot encode message");
                return;
            }
        };
        if let Err(e) = self.transport.send_to(addr, payload).await {
            warn!(node = %self.myself.id, %dest, %e, "send failed");
        }
    }

    #[cfg(test)]
    pub(crate) fn force_successor(&mut self, id: NodeId) {
        self.successor = self.peer(id);
    }

    #[cfg(test)]
    pub(crate) fn pending_pings(&self) -> usize {
        self.probes.len()
    }
}
