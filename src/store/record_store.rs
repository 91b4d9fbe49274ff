//! In-memory record store
//!
//! Authoritative map from chunk coordinate to [`ProspectRecord`] for one
//! process. A single store-wide mutex guards the map, the dirty flag and the
//! found-ore index, so a batch is applied atomically with respect to readers
//! and to the saver. Each applied batch is published once on a broadcast
//! channel for incremental consumers (overlay redraw, UI lists).

use crate::common::{ChunkCoordinate, ProspectRecord, Reading, Snapshot};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Capacity of the change feed. Slow subscribers see `Lagged` and resync
/// from [`RecordStore::snapshot`].
const CHANGE_FEED_CAPACITY: usize = 256;

/// Records applied by one upsert, in batch order.
pub type ChangeSet = Arc<[ProspectRecord]>;

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<ChunkCoordinate, ProspectRecord>,
    found_ores: BTreeSet<String>,
    dirty: bool,
}

impl StoreState {
    fn apply(&mut self, record: &ProspectRecord) {
        if let Reading::Ores(values) = &record.reading {
            for ore in values {
                if !self.found_ores.contains(&ore.name) {
                    self.found_ores.insert(ore.name.clone());
                }
            }
        }
        self.records.insert(record.chunk, record.clone());
    }
}

/// Replicated record store
#[derive(Debug)]
pub struct RecordStore {
    state: Mutex<StoreState>,
    changes: broadcast::Sender<ChangeSet>,
}

impl RecordStore {
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            state: Mutex::new(StoreState::default()),
            changes,
        }
    }

    /// Populate a fresh store from a loaded snapshot. The result is clean.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            for record in &snapshot.records {
                state.apply(record);
            }
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace every record of the batch, in order.
    ///
    /// Later records for the same chunk win. Marks the store dirty and emits
    /// one change notification carrying exactly the batch. An empty batch is
    /// a no-op. Returns the number of records applied.
    pub fn upsert(&self, batch: &[ProspectRecord]) -> usize {
        if batch.is_empty() {
            return 0;
        }

        let mut state = self.lock();
        for record in batch {
            state.apply(record);
        }
        state.dirty = true;

        // Published under the lock so notification order matches apply order.
        let _ = self.changes.send(ChangeSet::from(batch));

        tracing::debug!(
            "Applied {} prospect record(s), store now holds {}",
            batch.len(),
            state.records.len()
        );
        batch.len()
    }

    /// Independent copy of every record, ordered by chunk coordinate.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot::new(Self::sorted_records(&state))
    }

    fn sorted_records(state: &StoreState) -> Vec<ProspectRecord> {
        let mut records: Vec<ProspectRecord> = state.records.values().cloned().collect();
        records.sort_by_key(|record| record.chunk);
        records
    }

    /// Copy of the record stored for `chunk`
    pub fn get(&self, chunk: ChunkCoordinate) -> Option<ProspectRecord> {
        self.lock().records.get(&chunk).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Every ore name seen in a structured reading, sorted.
    pub fn found_ores(&self) -> Vec<String> {
        self.lock().found_ores.iter().cloned().collect()
    }

    /// Has anything changed since the last successful save?
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Subscribe to per-batch change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.changes.subscribe()
    }

    /// If dirty, clear the flag and copy the records out, in one critical
    /// section. The copy is written after the lock is released.
    pub(crate) fn take_dirty_snapshot(&self) -> Option<Snapshot> {
        let mut state = self.lock();
        if !state.dirty {
            return None;
        }
        state.dirty = false;
        Some(Snapshot::new(Self::sorted_records(&state)))
    }

    /// Re-arm the dirty flag after a failed write.
    pub(crate) fn mark_dirty(&self) {
        self.lock().dirty = true;
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}
