//! Reputation gossip wire format.
//!
//! An advertisement is a sequence of fixed 8-byte records:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       Neighbor Address                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  Reputation Value (big-endian)                |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::error::{TrustError, TrustResult};

/// Size of one encoded record in bytes.
pub const RECORD_LEN: usize = 8;

/// One advertised `(neighbor, reputation)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepRecord {
    /// Neighbor the reputation refers to.
    pub node: Ipv4Addr,
    /// Advertised reputation.
    pub reputation: u32,
}

impl RepRecord {
    /// Create a record.
    #[must_use]
    pub const fn new(node: Ipv4Addr, reputation: u32) -> Self {
        Self { node, reputation }
    }

    /// Encode into exactly [`RECORD_LEN`] bytes.
    #[must_use]
    pub fn serialize(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[..4].copy_from_slice(&self.node.octets());
        out[4..].copy_from_slice(&self.reputation.to_be_bytes());
        out
    }

    /// Decode a record from exactly [`RECORD_LEN`] bytes.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::LengthMismatch` for any other length.
    pub fn deserialize(bytes: &[u8]) -> TrustResult<Self> {
        let bytes: &[u8; RECORD_LEN] =
            bytes.try_into().map_err(|_| TrustError::LengthMismatch {
                expected: RECORD_LEN,
                actual: bytes.len(),
            })?;
        let node = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
        let reputation = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok(Self { node, reputation })
    }
}

/// A full reputation advertisement: one record per known neighbor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advertisement {
    records: Vec<RepRecord>,
}

impl Advertisement {
    /// Build an advertisement from a reputation snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &BTreeMap<Ipv4Addr, u32>) -> Self {
        Self {
            records: snapshot
                .iter()
                .map(|(node, reputation)| RepRecord::new(*node, *reputation))
                .collect(),
        }
    }

    /// Records in this advertisement.
    #[must_use]
    pub fn records(&self) -> &[RepRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the advertisement carries no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Encode as consecutive records.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.records.len() * RECORD_LEN);
        for record in &self.records {
            out.extend_from_slice(&record.serialize());
        }
        out
    }

    /// Decode a payload of consecutive records.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::LengthMismatch` if the payload is not a whole
    /// number of records; nothing from such a payload is accepted.
    pub fn decode(payload: &[u8]) -> TrustResult<Self> {
        if payload.len() % RECORD_LEN != 0 {
            return Err(TrustError::LengthMismatch {
                expected: payload.len().next_multiple_of(RECORD_LEN),
                actual: payload.len(),
            });
        }
        let records = payload
            .chunks_exact(RECORD_LEN)
            .map(RepRecord::deserialize)
            .collect::<TrustResult<Vec<_>>>()?;
        Ok(Self { records })
    }

    /// Advertised reputations keyed by neighbor. Later records win.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<Ipv4Addr, u32> {
        self.records
            .iter()
            .map(|record| (record.node, record.reputation))
            .collect()
    }
}

impl FromIterator<RepRecord> for Advertisement {
    fn from_iter<I: IntoIterator<Item = RepRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
