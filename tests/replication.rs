//! Replication test for prospect-together: one server, several clients,
//! in-process links pumped by hand

use prospect_together::common::{
    ChunkCoordinate, OreOccurrence, ProspectRecord, RelativeDensity, SharingSettings,
};
use prospect_together::sync::{
    ClientReplicator, Outgoing, PeerId, ProspectHook, RecordingLink, ServerReplicator,
};
use prospect_together::RecordStore;
use std::sync::Arc;

struct Network {
    server: ServerReplicator<RecordingLink>,
    clients: Vec<(PeerId, ClientReplicator<RecordingLink>)>,
    delivered: usize,
}

impl Network {
    fn new(auto_share: &[bool]) -> Self {
        let server = ServerReplicator::new(Arc::new(RecordStore::new()), RecordingLink::new());
        let clients = auto_share
            .iter()
            .enumerate()
            .map(|(i, auto)| {
                (
                    PeerId(i as u64 + 1),
                    ClientReplicator::new(
                        Arc::new(RecordStore::new()),
                        RecordingLink::new(),
                        Arc::new(SharingSettings::new(*auto, false)),
                    ),
                )
            })
            .collect();
        Self {
            server,
            clients,
            delivered: 0,
        }
    }

    fn client(&self, peer: PeerId) -> &ClientReplicator<RecordingLink> {
        &self.clients.iter().find(|(id, _)| *id == peer).unwrap().1
    }

    /// Deliver queued batches until every link is quiet.
    fn pump(&mut self) {
        for _ in 0..100 {
            let mut moved = false;
            for outgoing in self.server.link().drain() {
                moved = true;
                for (peer, client) in &self.clients {
                    let batch = match &outgoing {
                        Outgoing::To(to, batch) if to == peer => batch.clone(),
                        Outgoing::BroadcastExcept(except, batch) if except != peer => batch.clone(),
                        _ => continue,
                    };
                    self.delivered += 1;
                    client.on_batch_received(batch);
                }
            }
            for (peer, client) in &self.clients {
                for outgoing in client.link().drain() {
                    moved = true;
                    if let Outgoing::ToServer(batch) = outgoing {
                        self.delivered += 1;
                        self.server.on_batch_received(*peer, batch);
                    }
                }
            }
            if !moved {
                return;
            }
        }
        panic!("network never went quiet");
    }
}

fn gold(x: i32, z: i32, density: RelativeDensity) -> ProspectRecord {
    ProspectRecord::new(
        ChunkCoordinate::new(x, z),
        vec![OreOccurrence::new("game:ore-gold", "", density, 1.0)],
    )
}

#[test]
fn test_discovery_reaches_everyone_exactly_once() {
    let mut net = Network::new(&[true, true, true]);

    net.server.on_prospect(PeerId(1), gold(3, 5, RelativeDensity::High));
    net.pump();

    // server -> discoverer, discoverer -> server, server -> two others
    assert_eq!(net.delivered, 4);
    for (_, client) in &net.clients {
        assert_eq!(
            client
                .store()
                .get(ChunkCoordinate::new(3, 5))
                .unwrap()
                .density_of("gold"),
            RelativeDensity::High
        );
    }
}

#[test]
fn test_discovery_stays_private_without_auto_share() {
    let mut net = Network::new(&[false, true]);

    net.server.on_prospect(PeerId(1), gold(0, 0, RelativeDensity::Poor));
    net.pump();

    assert_eq!(net.delivered, 1);
    assert_eq!(net.server.store().len(), 1);
    assert_eq!(net.client(PeerId(1)).store().len(), 1);
    assert!(net.client(PeerId(2)).store().is_empty());
}

#[test]
fn test_later_reading_wins_everywhere() {
    let mut net = Network::new(&[true, true]);

    net.server.on_prospect(PeerId(1), gold(3, 5, RelativeDensity::High));
    net.pump();
    net.server.on_prospect(PeerId(2), gold(3, 5, RelativeDensity::VeryHigh));
    net.pump();

    let expected = net.server.store().snapshot();
    assert_eq!(expected.len(), 1);
    for (_, client) in &net.clients {
        assert_eq!(client.store().snapshot().records, expected.records);
    }
    assert_eq!(
        expected.records[0].density_of("gold"),
        RelativeDensity::VeryHigh
    );
}

#[test]
fn test_joining_player_catches_up() {
    let mut net = Network::new(&[true, true]);
    net.server.store().upsert(&[
        gold(1, 1, RelativeDensity::Decent),
        gold(2, 2, RelativeDensity::Miniscule),
    ]);

    net.server.on_player_join(PeerId(2));
    net.pump();

    assert_eq!(net.delivered, 1);
    assert_eq!(net.client(PeerId(2)).store().len(), 2);
    assert!(net.client(PeerId(1)).store().is_empty());
}

#[test]
fn test_share_all_fans_out_without_echo() {
    let mut net = Network::new(&[false, false, false]);
    net.client(PeerId(3)).store().upsert(&[
        gold(7, 7, RelativeDensity::UltraHigh),
        ProspectRecord::unparsed(ChunkCoordinate::new(8, 8), "raw text"),
    ]);

    assert_eq!(net.client(PeerId(3)).share_all(), 2);
    net.pump();

    // client 3 -> server, server -> clients 1 and 2, nothing back to 3
    assert_eq!(net.delivered, 3);
    assert_eq!(net.server.store().len(), 2);
    assert_eq!(net.client(PeerId(1)).store().len(), 2);
    assert_eq!(net.client(PeerId(2)).store().len(), 2);
}
