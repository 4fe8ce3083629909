//! Error types for the node runtime.

use std::net::Ipv4Addr;

use mesh_trust::TrustError;
use thiserror::Error;

/// Errors that can occur while running a trust node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Error from the trust controller.
    #[error("trust error: {0}")]
    Trust(#[from] TrustError),

    /// Sending to a neighbor failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The destination is not a direct neighbor.
    #[error("not a neighbor: {0}")]
    NotNeighbor(Ipv4Addr),

    /// The address is already attached to the network.
    #[error("address already in use: {0}")]
    AddressInUse(Ipv4Addr),

    /// The node actor is no longer running.
    #[error("node actor stopped")]
    ActorStopped,

    /// Configuration error.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for node runtime operations.
pub type NodeResult<T> = Result<T, NodeError>;
