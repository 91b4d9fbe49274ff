//! Server-side replication policy
//!
//! The server is authoritative: every incoming batch is merged locally before
//! it is relayed. Relays go to every client except the sender, joiners get
//! the whole store in one batch, and fresh discoveries go back only to the
//! player who made them, tagged so that player's client decides whether to
//! share them further.

use crate::common::ProspectRecord;
use crate::store::RecordStore;
use crate::sync::message::{PeerId, ProspectBatch};
use crate::sync::transport::ServerLink;
use std::sync::Arc;

/// Host callback for "a player just took a prospecting reading".
pub trait ProspectHook: Send + Sync {
    fn on_prospect(&self, player: PeerId, record: ProspectRecord);
}

pub struct ServerReplicator<L> {
    store: Arc<RecordStore>,
    link: L,
}

impl<L: ServerLink> ServerReplicator<L> {
    pub fn new(store: Arc<RecordStore>, link: L) -> Self {
        Self { store, link }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// A client shared a batch: merge first, then relay to everyone else.
    pub fn on_batch_received(&self, from: PeerId, batch: ProspectBatch) {
        if batch.is_empty() {
            return;
        }
        if batch.from_discovery {
            // Only the server tags discoveries; a client echoing one back is
            // treated like any other shared batch.
            tracing::debug!("{} sent a discovery-tagged batch, relaying untagged", from);
        }

        self.store.upsert(&batch.records);
        let relay = batch.into_shared();
        tracing::debug!(
            "Relaying {} record(s) from {} to other players",
            relay.len(),
            from
        );
        self.link.broadcast_except(from, &relay);
    }

    /// A player joined: send the whole store as one batch.
    pub fn on_player_join(&self, peer: PeerId) {
        let snapshot = self.store.snapshot();
        tracing::info!("Sending {} record(s) to joining {}", snapshot.len(), peer);
        self.link
            .send_to(peer, &ProspectBatch::shared(snapshot.records));
    }

    /// A player prospected on this server: merge, then tell only that player.
    pub fn on_local_discovery(&self, player: PeerId, record: ProspectRecord) {
        let records = vec![record];
        self.store.upsert(&records);
        self.link
            .send_to(player, &ProspectBatch::discovery(records));
    }
}

impl<L: ServerLink> ProspectHook for ServerReplicator<L> {
    fn on_prospect(&self, player: PeerId, record: ProspectRecord) {
        self.on_local_discovery(player, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ChunkCoordinate, OreOccurrence, RelativeDensity};
    use crate::sync::transport::{Outgoing, RecordingLink};

    fn iron(x: i32, z: i32) -> ProspectRecord {
        ProspectRecord::new(
            ChunkCoordinate::new(x, z),
            vec![OreOccurrence::new("game:ore-iron", "", RelativeDensity::High, 8.0)],
        )
    }

    fn server() -> ServerReplicator<RecordingLink> {
        ServerReplicator::new(Arc::new(RecordStore::new()), RecordingLink::new())
    }

    #[test]
    fn test_received_batch_is_merged_then_relayed_without_echo() {
        let server = server();
        let from = PeerId(1);
        server.on_batch_received(from, ProspectBatch::shared(vec![iron(1, 1)]));

        assert_eq!(server.store().len(), 1);
        assert_eq!(
            server.link().drain(),
            vec![Outgoing::BroadcastExcept(
                from,
                ProspectBatch::shared(vec![iron(1, 1)])
            )]
        );
    }

    #[test]
    fn test_relay_clears_discovery_tag() {
        let server = server();
        server.on_batch_received(PeerId(3), ProspectBatch::discovery(vec![iron(0, 0)]));
        match &server.link().drain()[..] {
            [Outgoing::BroadcastExcept(PeerId(3), relay)] => assert!(!relay.from_discovery),
            other => panic!("unexpected outgoing: {:?}", other),
        }
    }

    #[test]
    fn test_join_gets_full_snapshot_in_one_batch() {
        let server = server();
        server.store().upsert(&[iron(1, 1), iron(2, 2), iron(3, 3)]);

        server.on_player_join(PeerId(9));
        let sent = server.link().drain();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Outgoing::To(PeerId(9), batch) => {
                assert_eq!(batch.len(), 3);
                assert!(!batch.from_discovery);
            }
            other => panic!("unexpected outgoing: {:?}", other),
        }
    }

    #[test]
    fn test_local_discovery_goes_only_to_discoverer() {
        let server = server();
        server.on_prospect(PeerId(4), iron(5, 5));

        assert_eq!(server.store().len(), 1);
        assert_eq!(
            server.link().drain(),
            vec![Outgoing::To(
                PeerId(4),
                ProspectBatch::discovery(vec![iron(5, 5)])
            )]
        );
    }

    #[test]
    fn test_empty_batch_is_ignored() {
        let server = server();
        server.on_batch_received(PeerId(1), ProspectBatch::shared(Vec::new()));
        assert!(server.link().drain().is_empty());
        assert!(!server.store().is_dirty());
    }
}
