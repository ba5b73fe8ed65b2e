//! Datagram transport for inter-node messages.
//!
//! The [`Transport`] trait is the seam between the protocol engine and
//! the network: best-effort sends with no ordering, delivery, or
//! deduplication guarantee. [`UdpTransport`] is the production
//! implementation; tests substitute channel-backed mocks.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::MAX_DATAGRAM_SIZE;
use crate::error::NetError;

/// Best-effort datagram sender.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one opaque payload to the given address.
    ///
    /// Delivery, ordering, and uniqueness are all unguaranteed; the
    /// protocol above must tolerate loss, reordering, and duplication.
    async fn send_to(&self, addr: SocketAddr, payload: Bytes) -> Result<(), NetError>;
}

/// UDP implementation of [`Transport`] on a tokio socket.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind a socket on the given address.
    pub async fn bind(addr: SocketAddr) -> Result<Self, NetError> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// Return the bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.socket.local_addr()?)
    }

    /// Spawn the receive loop, forwarding each datagram and its source
    /// address into `tx` (the registered-callback contract).
    ///
    /// The loop ends when the receiving side of the channel is dropped.
    /// Transient socket errors are logged and skipped.
    pub fn spawn_recv_loop(
        &self,
        tx: mpsc::Sender<(SocketAddr, Bytes)>,
    ) -> tokio::task::JoinHandle<()> {
        let socket = self.socket.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, from)) => {
                        let payload = Bytes::copy_from_slice(&buf[..len]);
                        if tx.send((from, payload)).await.is_err() {
                            debug!("inbound channel closed, stopping receive loop");
                            break;
                        }
                    }
                    Err(e) => {
                        // Linux may surface ICMP errors from earlier
                        // sends here; the socket itself is still usable.
                        warn!(%e, "udp receive failed");
                    }
                }
            }
        })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_to(&self, addr: SocketAddr, payload: Bytes) -> Result<(), NetError> {
        if payload.len() > MAX_DATAGRAM_SIZE {
            return Err(NetError::OversizedDatagram(payload.len()));
        }
        self.socket.send_to(&payload, addr).await?;
        Ok(())
    }
}
