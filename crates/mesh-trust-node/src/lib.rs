//! # mesh-trust-node
//!
//! Async runtime for [`mesh_trust`] nodes.
//!
//! Each node runs as a [`NodeActor`]: a single tokio task that owns the
//! node's [`TrustNode`](mesh_trust::TrustNode) and serializes routing-layer
//! requests, inbound advertisements and the periodic reputation broadcast.
//! Other tasks interact through a cloneable [`NodeHandle`].
//!
//! Links to neighbors go through a [`Transport`]. [`MemoryNetwork`] provides
//! an in-process transport for simulations and tests.
//!
//! # Example
//!
//! ```rust
//! use mesh_trust_node::{MemoryNetwork, NodeActor, NodeConfig};
//! use std::net::Ipv4Addr;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let network = MemoryNetwork::new();
//! let (transport, inbound) = network.attach(Ipv4Addr::new(10, 0, 0, 1), 64).unwrap();
//! let (actor, handle) = NodeActor::new(transport, inbound, &NodeConfig::default()).unwrap();
//! let task = actor.spawn();
//!
//! let report = handle.report().await.unwrap();
//! assert_eq!(report.address, Ipv4Addr::new(10, 0, 0, 1));
//!
//! handle.shutdown();
//! task.await.unwrap();
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod actor;
pub mod config;
pub mod error;
pub mod transport;

pub use actor::{NodeActor, NodeHandle};
pub use config::{DEFAULT_BROADCAST_INTERVAL, DEFAULT_MAILBOX_CAPACITY, NodeConfig};
pub use error::{NodeError, NodeResult};
pub use transport::{Envelope, MemoryNetwork, MemoryTransport, Transport};
