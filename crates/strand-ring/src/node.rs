//! The node actor: a tokio task wrapping a [`RingEngine`].
//!
//! The task serializes everything that can touch ring state: console
//! commands arrive on an mpsc mailbox, datagrams on the inbound
//! channel, and the stabilize and ping-audit timers fire inside the
//! same select loop. [`NodeHandle`] is the cheap clone-free front for
//! callers.

use std::net::SocketAddr;

use bytes::Bytes;
use strand_types::NodeId;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::engine::{NodeEvent, RingEngine, RingSnapshot};
use crate::error::RingError;

enum Command {
    CreateRing,
    Join {
        bootstrap: NodeId,
        reply: oneshot::Sender<Result<(), RingError>>,
    },
    Leave,
    RingWalk,
    Info(oneshot::Sender<RingSnapshot>),
    Ping {
        dest: NodeId,
        text: String,
    },
}

/// Handle to a running node task.
pub struct NodeHandle {
    id: NodeId,
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<NodeEvent>,
    shutdown_tx: watch::Sender<()>,
    task: JoinHandle<()>,
}

impl NodeHandle {
    /// The node's identifier.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Become the sole member of a fresh ring.
    pub async fn create_ring(&self) -> Result<(), RingError> {
        self.commands
            .send(Command::CreateRing)
            .await
            .map_err(|_| RingError::NodeStopped)
    }

    /// Join the ring that `bootstrap` belongs to.
    pub async fn join(&self, bootstrap: NodeId) -> Result<(), RingError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Join { bootstrap, reply })
            .await
            .map_err(|_| RingError::NodeStopped)?;
        rx.await.map_err(|_| RingError::NodeStopped)?
    }

    /// Depart the ring cleanly.
    pub async fn leave(&self) -> Result<(), RingError> {
        self.commands
            .send(Command::Leave)
            .await
            .map_err(|_| RingError::NodeStopped)
    }

    /// Kick off a diagnostic ring walk.
    pub async fn ring_walk(&self) -> Result<(), RingError> {
        self.commands
            .send(Command::RingWalk)
            .await
            .map_err(|_| RingError::NodeStopped)
    }

    /// Fetch the node's current ring pointers.
    pub async fn info(&self) -> Result<RingSnapshot, RingError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Info(reply))
            .await
            .map_err(|_| RingError::NodeStopped)?;
        rx.await.map_err(|_| RingError::NodeStopped)
    }

    /// Send a liveness probe to `dest`.
    pub async fn send_ping(&self, dest: NodeId, text: String) -> Result<(), RingError> {
        self.commands
            .send(Command::Ping { dest, text })
            .await
            .map_err(|_| RingError::NodeStopped)
    }

    /// Subscribe to the node's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await
            && !e.is_cancelled()
        {
            error!(node = %self.id, %e, "node task panicked");
        }
    }

    /// Stop the task without waiting.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Spawn the node task around `engine`, consuming `inbound` datagrams.
pub fn start(engine: RingEngine, inbound: mpsc::Receiver<(SocketAddr, Bytes)>) -> NodeHandle {
    let id = engine.id().clone();
    let events = engine.event_sender();
    let (commands_tx, commands_rx) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let worker = NodeWorker {
        engine,
        commands: commands_rx,
        inbound,
        shutdown: shutdown_rx,
    };
    let task = tokio::spawn(worker.run());
    NodeHandle {
        id,
        commands: commands_tx,
        events,
        shutdown_tx,
        task,
    }
}

struct NodeWorker {
    engine: RingEngine,
    commands: mpsc::Receiver<Command>,
    inbound: mpsc::Receiver<(SocketAddr, Bytes)>,
    shutdown: watch::Receiver<()>,
}

impl NodeWorker {
    async fn run(mut self) {
        let config = self.engine.config().clone();
        let mut stabilize = tokio::time::interval(config.stabilize_interval);
        stabilize.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut audit = tokio::time::interval(config.ping_timeout);
        audit.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                }
                datagram = self.inbound.recv() => {
                    match datagram {
                        Some((from, payload)) => {
                            self.engine.handle_datagram(from, &payload).await;
                        }
                        None => {
                            debug!(node = %self.engine.id(), "inbound channel closed");
                            break;
                        }
                    }
                }
                _ = stabilize.tick(), if self.engine.stabilize_active() => {
                    self.engine.stabilize().await;
                }
                _ = audit.tick() => {
                    // No-op when nothing is pending.
                    self.engine.audit_pings().await;
                }
                _ = self.shutdown.changed() => {
                    debug!(node = %self.engine.id(), "node task shutting down");
                    break;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::CreateRing => self.engine.create_ring(),
            Command::Join { bootstrap, reply } => {
                let result = self.engine.join(&bootstrap).await;
                let _ = reply.send(result);
            }
            Command::Leave => self.engine.leave().await,
            Command::RingWalk => self.engine.ring_walk().await,
            Command::Info(reply) => {
                let _ = reply.send(self.engine.snapshot());
            }
            Command::Ping { dest, text } => self.engine.send_ping(dest, text).await,
        }
    }
}
