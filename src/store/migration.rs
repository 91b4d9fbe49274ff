//! Snapshot schema migration
//!
//! Each stored layout has its own type, and each step is a pure function from
//! one version to the next. [`StoredSnapshot::into_current`] chains the steps
//! strictly by version number.
//!
//! | version | layout                                                        |
//! |---------|---------------------------------------------------------------|
//! | 0       | bare array of `{X, Z, Message, Values \| null}`               |
//! | 1       | `{version, records: [{chunk: {x, z}, values, message}]}`      |

use crate::common::{
    ChunkCoordinate, Error, OreOccurrence, ProspectRecord, Result, Snapshot, SNAPSHOT_VERSION,
};
use serde::Deserialize;
use serde_json::Value;

/// Version 0 record: flat coordinates plus the rendered message text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacyRecordV0 {
    #[serde(rename = "X", alias = "x")]
    pub x: i32,
    #[serde(rename = "Z", alias = "z")]
    pub z: i32,
    #[serde(rename = "Message", alias = "message", default)]
    pub message: Option<String>,
    /// `null` when the message could not be parsed back then
    #[serde(rename = "Values", alias = "values", default)]
    pub values: Option<Vec<OreOccurrence>>,
}

pub type SnapshotV0 = Vec<LegacyRecordV0>;

/// A parsed snapshot file at whatever version it was written with.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredSnapshot {
    V0(SnapshotV0),
    V1(Snapshot),
}

impl StoredSnapshot {
    /// Detect the layout of a snapshot file and parse it.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let root: Value = serde_json::from_slice(bytes)?;
        match root {
            Value::Array(_) => Ok(StoredSnapshot::V0(serde_json::from_value(root)?)),
            Value::Object(ref fields) => {
                let version = fields
                    .get("version")
                    .or_else(|| fields.get("Version"))
                    .and_then(Value::as_u64)
                    .ok_or_else(|| Error::Corrupted("snapshot object has no version".into()))?;
                match u32::try_from(version) {
                    Ok(1) => Ok(StoredSnapshot::V1(serde_json::from_value(root)?)),
                    Ok(found) if found > SNAPSHOT_VERSION => Err(Error::UnsupportedVersion {
                        found,
                        newest: SNAPSHOT_VERSION,
                    }),
                    _ => Err(Error::Corrupted(format!(
                        "unexpected snapshot version {}",
                        version
                    ))),
                }
            }
            other => Err(Error::Corrupted(format!(
                "snapshot root must be an array or object, found {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn version(&self) -> u32 {
        match self {
            StoredSnapshot::V0(_) => 0,
            StoredSnapshot::V1(_) => 1,
        }
    }

    pub fn is_current(&self) -> bool {
        self.version() == SNAPSHOT_VERSION
    }

    /// Advance one version. The current version is returned unchanged.
    pub fn upgrade(self) -> Self {
        match self {
            StoredSnapshot::V0(v0) => StoredSnapshot::V1(migrate_v0_to_v1(v0)),
            current @ StoredSnapshot::V1(_) => current,
        }
    }

    /// Run the migration chain up to the current version.
    pub fn into_current(self) -> Snapshot {
        let mut stored = self;
        loop {
            match stored {
                StoredSnapshot::V1(snapshot) => return snapshot,
                older => {
                    let from = older.version();
                    stored = older.upgrade();
                    tracing::info!("Migrated snapshot v{} -> v{}", from, stored.version());
                }
            }
        }
    }
}

/// v0 -> v1: drop records whose values never parsed, nest X/Z into `chunk`,
/// forget the rendered message.
pub fn migrate_v0_to_v1(v0: SnapshotV0) -> Snapshot {
    let total = v0.len();
    let records: Vec<ProspectRecord> = v0
        .into_iter()
        .filter_map(|legacy| {
            legacy
                .values
                .map(|values| ProspectRecord::new(ChunkCoordinate::new(legacy.x, legacy.z), values))
        })
        .collect();

    if records.len() < total {
        tracing::info!(
            "Dropped {} unparseable legacy record(s) during migration",
            total - records.len()
        );
    }
    Snapshot::new(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
