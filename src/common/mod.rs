//! Common utilities and types shared across prospect-together

pub mod codec;
pub mod config;
pub mod error;
pub mod parser;
pub mod record;
pub mod utils;

pub use config::{Config, ServerConfig, SharingConfig, SharingSettings, StorageConfig};
pub use error::{Error, Result};
pub use parser::{ParseOutcome, ReadingParser};
pub use record::{
    ChunkCoordinate, OreOccurrence, ProspectRecord, Reading, RelativeDensity, Snapshot,
    SNAPSHOT_VERSION,
};
pub use utils::{crc32, format_bytes, write_atomic};
