//! Sync channel wire unit

use crate::common::ProspectRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one connected client on the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// A batch of records plus where it comes from.
///
/// `from_discovery` is set only on the batch the server sends to the player
/// who just prospected. Everything else (relays, join snapshots, shared
/// batches) travels untagged, which is what stops batches from bouncing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProspectBatch {
    pub records: Vec<ProspectRecord>,
    pub from_discovery: bool,
}

impl ProspectBatch {
    /// Fresh local find, addressed to the discovering player.
    pub fn discovery(records: Vec<ProspectRecord>) -> Self {
        Self {
            records,
            from_discovery: true,
        }
    }

    /// Anything that is not a fresh discovery.
    pub fn shared(records: Vec<ProspectRecord>) -> Self {
        Self {
            records,
            from_discovery: false,
        }
    }

    /// Same records, discovery tag cleared.
    pub fn into_shared(self) -> Self {
        Self::shared(self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
