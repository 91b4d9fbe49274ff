//! Client-side replication policy
//!
//! Every received batch is merged locally. A batch tagged as our own fresh
//! discovery is sent back to the server, untagged, when auto-share is on; the
//! server then relays it to everyone else. Untagged batches are never re-sent,
//! so nothing bounces between server and clients.

use crate::common::SharingSettings;
use crate::store::RecordStore;
use crate::sync::message::ProspectBatch;
use crate::sync::transport::ClientLink;
use std::sync::Arc;

/// What handling one incoming batch led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Empty batch, nothing happened
    Idle,
    /// Merged into the local store
    Merged,
    /// Merged and re-shared with the server
    Resent,
}

pub struct ClientReplicator<L> {
    store: Arc<RecordStore>,
    link: L,
    settings: Arc<SharingSettings>,
}

impl<L: ClientLink> ClientReplicator<L> {
    pub fn new(store: Arc<RecordStore>, link: L, settings: Arc<SharingSettings>) -> Self {
        Self {
            store,
            link,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn settings(&self) -> &Arc<SharingSettings> {
        &self.settings
    }

    /// Handle a batch from the server.
    pub fn on_batch_received(&self, batch: ProspectBatch) -> ReceiveOutcome {
        if batch.is_empty() {
            return ReceiveOutcome::Idle;
        }

        self.store.upsert(&batch.records);

        if batch.from_discovery && self.settings.auto_share() {
            tracing::debug!("Sharing {} discovered record(s)", batch.len());
            self.link.send(&batch.into_shared());
            return ReceiveOutcome::Resent;
        }
        ReceiveOutcome::Merged
    }

    /// Push the whole local store to the server as an ordinary batch.
    /// Returns the number of records sent.
    pub fn share_all(&self) -> usize {
        let snapshot = self.store.snapshot();
        if snapshot.is_empty() {
            return 0;
        }
        let count = snapshot.len();
        tracing::info!("Sharing all {} local record(s) with the server", count);
        self.link.send(&ProspectBatch::shared(snapshot.records));
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ChunkCoordinate, ProspectRecord};
    use crate::sync::transport::{Outgoing, RecordingLink};

    fn client(auto_share: bool) -> ClientReplicator<RecordingLink> {
        ClientReplicator::new(
            Arc::new(RecordStore::new()),
            RecordingLink::new(),
            Arc::new(SharingSettings::new(auto_share, false)),
        )
    }

    fn record(x: i32) -> ProspectRecord {
        ProspectRecord::unparsed(ChunkCoordinate::new(x, 0), "reading")
    }

    #[test]
    fn test_discovery_is_resent_untagged_when_auto_share() {
        let client = client(true);
        let mut changes = client.store().subscribe();

        let outcome = client.on_batch_received(ProspectBatch::discovery(vec![record(1)]));

        assert_eq!(outcome, ReceiveOutcome::Resent);
        assert_eq!(client.store().len(), 1);
        assert_eq!(changes.try_recv().unwrap().len(), 1);
        assert_eq!(
            client.link().drain(),
            vec![Outgoing::ToServer(ProspectBatch::shared(vec![record(1)]))]
        );
    }

    #[test]
    fn test_discovery_kept_local_without_auto_share() {
        let client = client(false);
        let outcome = client.on_batch_received(ProspectBatch::discovery(vec![record(1)]));
        assert_eq!(outcome, ReceiveOutcome::Merged);
        assert_eq!(client.store().len(), 1);
        assert!(client.link().drain().is_empty());
    }

    #[test]
    fn test_relayed_batch_is_never_resent() {
        let client = client(true);
        let outcome = client.on_batch_received(ProspectBatch::shared(vec![record(2)]));
        assert_eq!(outcome, ReceiveOutcome::Merged);
        assert!(client.link().drain().is_empty());
    }

    #[test]
    fn test_auto_share_toggle_applies_immediately() {
        let client = client(false);
        client.settings().set_auto_share(true);
        assert_eq!(
            client.on_batch_received(ProspectBatch::discovery(vec![record(3)])),
            ReceiveOutcome::Resent
        );
    }

    #[test]
    fn test_share_all_sends_full_store() {
        let client = client(false);
        assert_eq!(client.share_all(), 0);
        client.store().upsert(&[record(1), record(2)]);
        assert_eq!(client.share_all(), 2);
        match &client.link().drain()[..] {
            [Outgoing::ToServer(batch)] => {
                assert_eq!(batch.len(), 2);
                assert!(!batch.from_discovery);
            }
            other => panic!("unexpected outgoing: {:?}", other),
        }
    }
}
