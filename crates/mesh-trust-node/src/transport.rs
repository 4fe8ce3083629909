//! Neighbor transports.
//!
//! A [`Transport`] delivers opaque payloads to direct neighbors and reports
//! who those neighbors currently are. [`MemoryNetwork`] is an in-process
//! implementation with an explicit, mutable link topology.

use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, ready};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{NodeError, NodeResult};

/// A payload received from a neighbor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Sender address.
    pub from: Ipv4Addr,
    /// Raw payload.
    pub payload: Vec<u8>,
}

/// Link layer used by a node to reach its neighbors.
pub trait Transport: Send + Sync {
    /// Address of the local node.
    fn local_addr(&self) -> Ipv4Addr;

    /// Current direct neighbors.
    fn neighbors(&self) -> Vec<Ipv4Addr>;

    /// Send a payload to a direct neighbor.
    ///
    /// # Errors
    ///
    /// Returns an error if `to` is not a neighbor or the delivery fails.
    /// Implementations must not wait for a slow neighbor to make room.
    fn send_to<'a>(&'a self, to: Ipv4Addr, payload: Vec<u8>) -> BoxFuture<'a, NodeResult<()>>;
}

#[derive(Debug, Default)]
struct NetworkState {
    /// Inbound queue per attached node.
    endpoints: HashMap<Ipv4Addr, mpsc::Sender<Envelope>>,
    /// Symmetric adjacency.
    links: HashMap<Ipv4Addr, BTreeSet<Ipv4Addr>>,
}

/// In-memory network connecting nodes through bounded queues.
///
/// Cloning yields another handle to the same network.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<RwLock<NetworkState>>,
}

impl MemoryNetwork {
    /// Create an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node and return its transport and inbound queue.
    ///
    /// # Errors
    ///
    /// Returns `NodeError::AddressInUse` if `addr` is already attached.
    pub fn attach(
        &self,
        addr: Ipv4Addr,
        buffer: usize,
    ) -> NodeResult<(MemoryTransport, mpsc::Receiver<Envelope>)> {
        let mut state = self.state.write();
        if state.endpoints.contains_key(&addr) {
            return Err(NodeError::AddressInUse(addr));
        }

        let (tx, rx) = mpsc::channel(buffer.max(1));
        state.endpoints.insert(addr, tx);
        state.links.entry(addr).or_default();
        info!(addr = %addr, "Node attached to network");

        let transport = MemoryTransport {
            addr,
            network: self.clone(),
        };
        Ok((transport, rx))
    }

    /// Remove a node and every link touching it.
    pub fn detach(&self, addr: Ipv4Addr) {
        let mut state = self.state.write();
        state.endpoints.remove(&addr);
        if let Some(peers) = state.links.remove(&addr) {
            for peer in peers {
                if let Some(links) = state.links.get_mut(&peer) {
                    links.remove(&addr);
                }
            }
        }
        info!(addr = %addr, "Node detached from network");
    }

    /// Create a bidirectional link between two attached nodes.
    pub fn link(&self, a: Ipv4Addr, b: Ipv4Addr) {
        if a == b {
            return;
        }
        let mut state = self.state.write();
        if !(state.endpoints.contains_key(&a) && state.endpoints.contains_key(&b)) {
            debug!(a = %a, b = %b, "Ignoring link to unattached node");
            return;
        }
        state.links.entry(a).or_default().insert(b);
        state.links.entry(b).or_default().insert(a);
        debug!(a = %a, b = %b, "Link up");
    }

    /// Remove the link between two nodes.
    pub fn unlink(&self, a: Ipv4Addr, b: Ipv4Addr) {
        let mut state = self.state.write();
        if let Some(links) = state.links.get_mut(&a) {
            links.remove(&b);
        }
        if let Some(links) = state.links.get_mut(&b) {
            links.remove(&a);
        }
        debug!(a = %a, b = %b, "Link down");
    }

    /// Direct neighbors of a node, in address order.
    #[must_use]
    pub fn neighbors_of(&self, addr: Ipv4Addr) -> Vec<Ipv4Addr> {
        self.state
            .read()
            .links
            .get(&addr)
            .map(|links| links.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of attached nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.state.read().endpoints.len()
    }

    fn route(&self, from: Ipv4Addr, to: Ipv4Addr) -> NodeResult<mpsc::Sender<Envelope>> {
        let state = self.state.read();
        let linked = state
            .links
            .get(&from)
            .is_some_and(|links| links.contains(&to));
        if !linked {
            return Err(NodeError::NotNeighbor(to));
        }
        state
            .endpoints
            .get(&to)
            .cloned()
            .ok_or(NodeError::NotNeighbor(to))
    }
}

/// A node's view of a [`MemoryNetwork`].
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    addr: Ipv4Addr,
    network: MemoryNetwork,
}

impl MemoryTransport {
    /// The network this transport belongs to.
    #[must_use]
    pub const fn network(&self) -> &MemoryNetwork {
        &self.network
    }
}

impl Transport for MemoryTransport {
    fn local_addr(&self) -> Ipv4Addr {
        self.addr
    }

    fn neighbors(&self) -> Vec<Ipv4Addr> {
        self.network.neighbors_of(self.addr)
    }

    fn send_to<'a>(&'a self, to: Ipv4Addr, payload: Vec<u8>) -> BoxFuture<'a, NodeResult<()>> {
        // A full queue fails the send; the caller never waits on a slow peer.
        let result = self.network.route(self.addr, to).and_then(|sender| {
            sender
                .try_send(Envelope {
                    from: self.addr,
                    payload,
                })
                .map_err(|e| NodeError::Transport(format!("delivery to {to} failed: {e}")))
        });
        ready(result).boxed()
    }
}
