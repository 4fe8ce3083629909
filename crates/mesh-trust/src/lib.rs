//! # mesh-trust
//!
//! Reputation-based trust and adaptive forwarding for ad-hoc routing nodes.
//!
//! Every node keeps an integer reputation for each neighbor and uses it to
//! decide how much relayed traffic to forward. Reputations move with observed
//! delivery and are shared with neighbors through periodic advertisements.
//!
//! ## Components
//!
//! - [`ReputationStore`] - Per-neighbor reputation and loss estimate
//! - [`TransmissionLedger`] - Outstanding packets and batch reputation updates
//! - [`AdmissionController`] - Trust-independent local drop filter
//! - [`TrustDecisionEngine`] - GOOD / BAD / EVIL forwarding posture
//! - [`LifecycleMonitor`] - Departure detection from the gate history
//! - [`DropFactorAdapter`] - Drop factor correction on reputation disputes
//! - [`Advertisement`] and [`ReputationMerger`] - Gossip wire format and merge
//!
//! [`TrustNode`] ties them together for one node.
//!
//! # Example
//!
//! ```rust
//! use mesh_trust::{ForwardVerdict, TrustConfig, TrustNode};
//! use std::net::Ipv4Addr;
//!
//! let local = Ipv4Addr::new(10, 0, 0, 1);
//! let config = TrustConfig::builder().delta(1.0).drop_factor(0.0).build();
//! let mut node = TrustNode::new(local, config).unwrap();
//!
//! let verdict = node.forward(
//!     Ipv4Addr::new(10, 0, 0, 2),
//!     Ipv4Addr::new(10, 0, 0, 3),
//!     Ipv4Addr::new(10, 0, 0, 4),
//!     1,
//! );
//! assert!(matches!(verdict, ForwardVerdict::Forward { .. }));
//!
//! // Share what this node knows with its neighbors.
//! let payload = node.advertisement();
//! assert_eq!(payload.len() % 8, 0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admission;
pub mod codec;
pub mod config;
pub mod counters;
pub mod decision;
pub mod drop_factor;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod merge;
pub mod node;
pub mod store;

// Re-export main types
pub use admission::AdmissionController;
pub use codec::{Advertisement, RECORD_LEN, RepRecord};
pub use config::{ReputationConfig, TrustConfig, TrustConfigBuilder};
pub use counters::{NodeCounters, NodeReport};
pub use decision::{RepAction, TrustDecisionEngine};
pub use drop_factor::{DropFactor, DropFactorAdapter};
pub use error::{TrustError, TrustResult};
pub use ledger::{BatchUpdate, BatchVerdict, RecordOutcome, TransmissionLedger, TransmissionRecord};
pub use lifecycle::{DefectionTrend, Gate, GateHistory, LifecycleMonitor};
pub use merge::{MergeReport, ReputationMerger};
pub use node::{DropReason, ForwardVerdict, TrustNode};
pub use store::{ReputationEntry, ReputationStore};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::codec::Advertisement;
    pub use crate::config::TrustConfig;
    pub use crate::decision::RepAction;
    pub use crate::error::{TrustError, TrustResult};
    pub use crate::ledger::RecordOutcome;
    pub use crate::merge::MergeReport;
    pub use crate::node::{DropReason, ForwardVerdict, TrustNode};
}
