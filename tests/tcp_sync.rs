//! End-to-end sync test for prospect-together over real TCP sockets

use prospect_together::common::{
    ChunkCoordinate, OreOccurrence, ProspectRecord, RelativeDensity, SharingSettings,
};
use prospect_together::sync::{PeerId, ProspectHook};
use prospect_together::{RecordStore, SyncClient, SyncServer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {}", what);
}

fn silver(x: i32, z: i32) -> ProspectRecord {
    ProspectRecord::new(
        ChunkCoordinate::new(x, z),
        vec![OreOccurrence::new("game:ore-silver", "", RelativeDensity::VeryHigh, 22.0)],
    )
}

async fn start_server(
    store: Arc<RecordStore>,
) -> (Arc<SyncServer>, SocketAddr, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(SyncServer::new(store));
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let serving = server.clone();
    tokio::spawn(async move {
        serving
            .serve_until(listener, async {
                let _ = stop_rx.await;
            })
            .await
            .unwrap();
    });
    (server, addr, stop_tx)
}

fn settings(auto_share: bool) -> Arc<SharingSettings> {
    Arc::new(SharingSettings::new(auto_share, false))
}

#[tokio::test]
async fn test_join_discovery_and_fan_out() {
    let server_store = Arc::new(RecordStore::new());
    server_store.upsert(&[silver(0, 0), silver(1, 0)]);
    let (server, addr, stop) = start_server(server_store.clone()).await;

    let store_a = Arc::new(RecordStore::new());
    let client_a = SyncClient::connect(addr, store_a.clone(), settings(true))
        .await
        .unwrap();
    wait_until("client A snapshot", || store_a.len() == 2).await;

    let store_b = Arc::new(RecordStore::new());
    let client_b = SyncClient::connect(addr, store_b.clone(), settings(true))
        .await
        .unwrap();
    wait_until("client B snapshot", || store_b.len() == 2).await;
    assert_eq!(server.link().connected(), vec![PeerId(1), PeerId(2)]);

    // A prospects: server tells A, A re-shares, server relays to B
    server.replicator().on_prospect(PeerId(1), silver(9, 9));
    wait_until("relay to client B", || store_b.len() == 3).await;
    assert_eq!(store_a.len(), 3);
    assert_eq!(server_store.len(), 3);

    // Quiet period: nothing bounces back
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store_a.snapshot(), server_store.snapshot());
    assert_eq!(store_b.snapshot(), server_store.snapshot());

    assert!(client_a.is_connected());
    assert!(client_b.is_connected());
    let _ = stop.send(());
}

#[tokio::test]
async fn test_share_all_reaches_other_clients() {
    let (server, addr, stop) = start_server(Arc::new(RecordStore::new())).await;

    let store_a = Arc::new(RecordStore::new());
    store_a.upsert(&[silver(4, 4), silver(5, 5), silver(6, 6)]);
    let store_b = Arc::new(RecordStore::new());

    let client_b = SyncClient::connect(addr, store_b.clone(), settings(false))
        .await
        .unwrap();
    wait_until("client B registered", || server.link().connected().len() == 1).await;

    let client_a = SyncClient::connect(addr, store_a.clone(), settings(false))
        .await
        .unwrap();
    wait_until("client A registered", || server.link().connected().len() == 2).await;

    assert_eq!(client_a.replicator().share_all(), 3);
    wait_until("client B receives shared records", || store_b.len() == 3).await;
    assert_eq!(server.replicator().store().len(), 3);

    client_b.disconnect();
    wait_until("client B unregistered", || server.link().connected().len() == 1).await;
    let _ = stop.send(());
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = SyncClient::connect(addr, Arc::new(RecordStore::new()), settings(true)).await;
    assert!(matches!(
        result,
        Err(prospect_together::Error::ConnectionFailed(_))
    ));
}
