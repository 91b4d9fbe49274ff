//! # prospect-together
//!
//! A replicated store of prospecting results keyed by chunk coordinate:
//! - In-memory record store with last-write-wins batch upserts
//! - Versioned JSON snapshot on disk with forward migration
//! - Authoritative server and clients synchronized over TCP without echo loops
//! - Compressed payloads shared through plain chat text
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              Sync Server                 │
//! │  RecordStore ── Persistence (JSON file)  │
//! │   - merge, then relay to other clients   │
//! │   - full snapshot to joining clients     │
//! └───────────┬──────────────────────────────┘
//!             │ framed bincode over TCP
//!   ┌─────────┴──────────┬──────────────┐
//!   │                    │              │
//! ┌─▼──────────┐   ┌─────▼──────┐   ┌───▼────────┐
//! │ Client 1   │   │ Client 2   │   │ Client 3   │
//! │ RecordStore│   │ RecordStore│   │ RecordStore│
//! └─────┬──────┘   └────────────┘   └─────▲──────┘
//!       └──────── chat payload ───────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start the server
//! ```bash
//! prospect-server --config ./prospect.toml --bind 0.0.0.0:7420
//! ```
//!
//! ### Use the CLI
//! ```bash
//! # Inspect a data file
//! prospect stats --file ./prospect-data/prospectorInfo.json
//!
//! # Upgrade an old data file in place
//! prospect migrate --file ./old.json
//!
//! # Print a chat payload, or import one
//! prospect export --file ./data.json
//! prospect import --file ./data.json "ProspectingData;..."
//!
//! # Sync a local file with a running server
//! prospect connect --server 127.0.0.1:7420 --file ./data.json
//! ```

#![allow(clippy::result_large_err)]

pub mod common;
pub mod exchange;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use common::{Config, Error, ProspectRecord, Result, Snapshot};
pub use exchange::ChatExchange;
pub use store::{Persistence, RecordStore, SaveScheduler};
pub use sync::{SyncClient, SyncServer};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
