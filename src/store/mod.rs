//! Record storage
//!
//! - In-memory store with atomic batch upserts and a change feed
//! - Versioned JSON snapshot file with a migration chain
//! - Dirty-gated, crash-safe saves on a timer and at shutdown

pub mod migration;
pub mod persistence;
pub mod record_store;
pub mod scheduler;

pub use migration::StoredSnapshot;
pub use persistence::{Persistence, SnapshotFile};
pub use record_store::{ChangeSet, RecordStore};
pub use scheduler::SaveScheduler;
