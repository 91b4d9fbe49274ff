//! Shared binary encoding
//!
//! bincode over the serde model in [`crate::common::record`]. Used for sync
//! channel frames and for chat payloads; the snapshot file stays JSON.

use crate::common::record::{Snapshot, SNAPSHOT_VERSION};
use crate::common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// Decode a binary snapshot, rejecting any schema other than the current one.
///
/// Binary payloads are never migrated: they are transient, and an older
/// layout cannot be told apart from garbage.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot> {
    let snapshot: Snapshot = decode(bytes)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(Error::UnsupportedVersion {
            found: snapshot.version,
            newest: SNAPSHOT_VERSION,
        });
    }
    Ok(snapshot)
}
