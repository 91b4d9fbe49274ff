//! Prospecting data model
//!
//! A [`ProspectRecord`] is the value stored per world chunk. Records are
//! immutable once built; the store replaces whole entries instead of mutating
//! them. The serde layout is shared by the snapshot file (JSON), the sync
//! channel and the chat payload (bincode), so every type here serializes as a
//! plain struct with a fixed field order.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Integer (X, Z) key identifying one world chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoordinate {
    #[serde(alias = "X")]
    pub x: i32,
    #[serde(alias = "Z")]
    pub z: i32,
}

impl ChunkCoordinate {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

impl fmt::Display for ChunkCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Ore abundance, ordered from nothing to the richest reading.
///
/// Persisted by ordinal, so variants must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RelativeDensity {
    #[default]
    Zero,
    Miniscule,
    VeryPoor,
    Poor,
    Decent,
    High,
    VeryHigh,
    UltraHigh,
}

impl RelativeDensity {
    pub const ALL: [RelativeDensity; 8] = [
        RelativeDensity::Zero,
        RelativeDensity::Miniscule,
        RelativeDensity::VeryPoor,
        RelativeDensity::Poor,
        RelativeDensity::Decent,
        RelativeDensity::High,
        RelativeDensity::VeryHigh,
        RelativeDensity::UltraHigh,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

impl From<RelativeDensity> for u8 {
    fn from(density: RelativeDensity) -> Self {
        density.ordinal()
    }
}

impl TryFrom<u8> for RelativeDensity {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        RelativeDensity::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| format!("unknown relative density ordinal {}", value))
    }
}

impl fmt::Display for RelativeDensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelativeDensity::Zero => "zero",
            RelativeDensity::Miniscule => "miniscule",
            RelativeDensity::VeryPoor => "very poor",
            RelativeDensity::Poor => "poor",
            RelativeDensity::Decent => "decent",
            RelativeDensity::High => "high",
            RelativeDensity::VeryHigh => "very high",
            RelativeDensity::UltraHigh => "ultra high",
        };
        f.write_str(name)
    }
}

/// One ore found in a chunk reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OreOccurrence {
    /// Ore identifier, e.g. `game:ore-copper`
    #[serde(alias = "Name")]
    pub name: String,
    /// Handbook page reference, may be empty
    #[serde(alias = "PageCode", default)]
    pub page_code: String,
    #[serde(alias = "RelativeDensity")]
    pub relative_density: RelativeDensity,
    /// Parts per thousand, finite and never negative
    #[serde(
        alias = "AbsoluteDensity",
        default,
        serialize_with = "serialize_density",
        deserialize_with = "deserialize_density"
    )]
    pub absolute_density: f64,
}

fn sanitize_density(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

// JSON has no encoding for NaN or infinities; written as 0 so the file stays loadable.
fn serialize_density<S>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(sanitize_density(*value))
}

fn deserialize_density<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() {
        return Err(de::Error::custom(format!(
            "absolute density must be finite, got {}",
            value
        )));
    }
    Ok(value.max(0.0))
}

impl OreOccurrence {
    pub fn new(
        name: impl Into<String>,
        page_code: impl Into<String>,
        relative_density: RelativeDensity,
        absolute_density: f64,
    ) -> Self {
        Self {
            name: name.into(),
            page_code: page_code.into(),
            relative_density,
            absolute_density: sanitize_density(absolute_density),
        }
    }
}

/// What was learned about a chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// Structured ore list, strongest first by convention
    Ores(Vec<OreOccurrence>),
    /// Raw text of a reading the parser could not understand
    Unparsed(String),
}

/// The value stored per chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RecordRepr", try_from = "RecordRepr")]
pub struct ProspectRecord {
    pub chunk: ChunkCoordinate,
    pub reading: Reading,
}

impl ProspectRecord {
    pub fn new(chunk: ChunkCoordinate, values: Vec<OreOccurrence>) -> Self {
        Self {
            chunk,
            reading: Reading::Ores(values),
        }
    }

    pub fn unparsed(chunk: ChunkCoordinate, raw: impl Into<String>) -> Self {
        Self {
            chunk,
            reading: Reading::Unparsed(raw.into()),
        }
    }

    /// Ore list, `None` for an unparsed fallback record.
    pub fn values(&self) -> Option<&[OreOccurrence]> {
        match &self.reading {
            Reading::Ores(values) => Some(values),
            Reading::Unparsed(_) => None,
        }
    }

    /// Relative density of the named ore in this chunk.
    ///
    /// Matches the full identifier or its bare suffix (`copper` matches
    /// `game:ore-copper`), ignoring case.
    pub fn density_of(&self, ore: &str) -> RelativeDensity {
        let wanted = ore.to_lowercase();
        self.values()
            .unwrap_or_default()
            .iter()
            .find(|occurrence| {
                let name = occurrence.name.to_lowercase();
                name == wanted || name.rsplit(['-', ':']).next() == Some(wanted.as_str())
            })
            .map(|occurrence| occurrence.relative_density)
            .unwrap_or(RelativeDensity::Zero)
    }
}

/// Serialized shape of a record: `{chunk, values, message}`.
///
/// Exactly one of `values` / `message` is set. Both fields are always written
/// so the layout stays positional for bincode.
#[derive(Serialize, Deserialize)]
struct RecordRepr {
    #[serde(alias = "Chunk")]
    chunk: ChunkCoordinate,
    #[serde(alias = "Values", default)]
    values: Option<Vec<OreOccurrence>>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

impl From<ProspectRecord> for RecordRepr {
    fn from(record: ProspectRecord) -> Self {
        let (values, message) = match record.reading {
            Reading::Ores(values) => (Some(values), None),
            Reading::Unparsed(raw) => (None, Some(raw)),
        };
        RecordRepr {
            chunk: record.chunk,
            values,
            message,
        }
    }
}

impl TryFrom<RecordRepr> for ProspectRecord {
    type Error = String;

    fn try_from(repr: RecordRepr) -> std::result::Result<Self, Self::Error> {
        let reading = match (repr.values, repr.message) {
            (Some(values), _) => Reading::Ores(values),
            (None, Some(raw)) => Reading::Unparsed(raw),
            (None, None) => {
                return Err(format!(
                    "record at {} has neither values nor message",
                    repr.chunk
                ))
            }
        };
        Ok(ProspectRecord {
            chunk: repr.chunk,
            reading,
        })
    }
}

/// Versioned, ordered dump of records. Unit of persistence and chat exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(alias = "Version")]
    pub version: u32,
    #[serde(alias = "ProspectInfos")]
    pub records: Vec<ProspectRecord>,
}

impl Snapshot {
    pub fn new(records: Vec<ProspectRecord>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            records,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}
