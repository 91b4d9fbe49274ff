//! TCP transport for the sync channel
//!
//! One long-lived connection per client. Each connection has a reader task
//! feeding the replicator and a writer task draining an unbounded queue of
//! pre-encoded frames, so a slow client never blocks the relay to others.

use crate::common::{Error, Result, SharingSettings};
use crate::store::RecordStore;
use crate::sync::client::ClientReplicator;
use crate::sync::frame::{encode_frame, read_frame, write_frame};
use crate::sync::message::{PeerId, ProspectBatch};
use crate::sync::server::ServerReplicator;
use crate::sync::transport::{ClientLink, ServerLink};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type Frame = Arc<[u8]>;

fn encode_or_log(batch: &ProspectBatch) -> Option<Frame> {
    match encode_frame(batch) {
        Ok(frame) => Some(Frame::from(frame)),
        Err(e) => {
            tracing::error!("Dropping batch of {} record(s): {}", batch.len(), e);
            None
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Frame>,
    label: String,
) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            tracing::warn!("Write to {} failed: {}", label, e);
            break;
        }
    }
}

/// Connected clients, addressable by [`PeerId`].
#[derive(Debug, Default)]
pub struct TcpServerLink {
    peers: Mutex<HashMap<PeerId, mpsc::UnboundedSender<Frame>>>,
    next_id: AtomicU64,
}

impl TcpServerLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self) -> (PeerId, mpsc::UnboundedReceiver<Frame>) {
        let peer = PeerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer, tx);
        (peer, rx)
    }

    fn unregister(&self, peer: PeerId) {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&peer);
    }

    /// Currently connected peers, sorted.
    pub fn connected(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self
            .peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        peers.sort();
        peers
    }
}

impl ServerLink for TcpServerLink {
    fn send_to(&self, peer: PeerId, batch: &ProspectBatch) {
        let Some(frame) = encode_or_log(batch) else {
            return;
        };
        let peers = self.peers.lock().unwrap_or_else(PoisonError::into_inner);
        match peers.get(&peer) {
            Some(tx) => {
                if tx.send(frame).is_err() {
                    tracing::debug!("{} disconnected before delivery", peer);
                }
            }
            None => tracing::debug!("No connection for {}, dropping batch", peer),
        }
    }

    fn broadcast_except(&self, except: PeerId, batch: &ProspectBatch) {
        let Some(frame) = encode_or_log(batch) else {
            return;
        };
        let peers = self.peers.lock().unwrap_or_else(PoisonError::into_inner);
        for (peer, tx) in peers.iter().filter(|(peer, _)| **peer != except) {
            if tx.send(frame.clone()).is_err() {
                tracing::debug!("{} disconnected before delivery", peer);
            }
        }
    }
}

/// Authoritative sync server
pub struct SyncServer {
    replicator: Arc<ServerReplicator<Arc<TcpServerLink>>>,
    link: Arc<TcpServerLink>,
}

impl SyncServer {
    pub fn new(store: Arc<RecordStore>) -> Self {
        let link = Arc::new(TcpServerLink::new());
        Self {
            replicator: Arc::new(ServerReplicator::new(store, link.clone())),
            link,
        }
    }

    /// The replication policy, also the host's [`ProspectHook`](crate::sync::ProspectHook).
    pub fn replicator(&self) -> &Arc<ServerReplicator<Arc<TcpServerLink>>> {
        &self.replicator
    }

    pub fn link(&self) -> &Arc<TcpServerLink> {
        &self.link
    }

    /// Accept clients until `shutdown` resolves.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("Sync server listening on {}", listener.local_addr()?);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = accepted?;
                    let replicator = self.replicator.clone();
                    let link = self.link.clone();
                    tokio::spawn(async move {
                        handle_connection(replicator, link, stream, addr).await;
                    });
                }
                _ = &mut shutdown => {
                    tracing::info!("Sync server shutting down");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_connection(
    replicator: Arc<ServerReplicator<Arc<TcpServerLink>>>,
    link: Arc<TcpServerLink>,
    stream: TcpStream,
    addr: SocketAddr,
) {
    let _ = stream.set_nodelay(true);
    let (mut reader, writer) = stream.into_split();
    let (peer, rx) = link.register();
    tracing::info!("{} connected from {}", peer, addr);

    let writer_task = tokio::spawn(write_loop(writer, rx, peer.to_string()));
    replicator.on_player_join(peer);

    loop {
        match read_frame(&mut reader).await {
            Ok(Some(batch)) => replicator.on_batch_received(peer, batch),
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Closing {}: {}", peer, e);
                break;
            }
        }
    }

    link.unregister(peer);
    writer_task.abort();
    tracing::info!("{} disconnected", peer);
}

/// Client side of a TCP connection: queues frames for the writer task.
#[derive(Debug, Clone)]
pub struct TcpClientLink {
    tx: mpsc::UnboundedSender<Frame>,
}

impl ClientLink for TcpClientLink {
    fn send(&self, batch: &ProspectBatch) {
        let Some(frame) = encode_or_log(batch) else {
            return;
        };
        if self.tx.send(frame).is_err() {
            tracing::debug!("Connection to server closed, dropping batch");
        }
    }
}

/// A client connected to a [`SyncServer`]
pub struct SyncClient {
    replicator: Arc<ClientReplicator<TcpClientLink>>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl SyncClient {
    pub async fn connect(
        addr: SocketAddr,
        store: Arc<RecordStore>,
        settings: Arc<SharingSettings>,
    ) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::ConnectionFailed(format!("{}: {}", addr, e)))?;
        let _ = stream.set_nodelay(true);
        let (mut reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();

        let replicator = Arc::new(ClientReplicator::new(
            store,
            TcpClientLink { tx },
            settings,
        ));

        let writer_task = tokio::spawn(write_loop(writer, rx, addr.to_string()));
        let reader_replicator = replicator.clone();
        let reader_task = tokio::spawn(async move {
            loop {
                match read_frame(&mut reader).await {
                    Ok(Some(batch)) => {
                        reader_replicator.on_batch_received(batch);
                    }
                    Ok(None) => {
                        tracing::info!("Server {} closed the connection", addr);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Dropping connection to {}: {}", addr, e);
                        break;
                    }
                }
            }
        });

        tracing::info!("Connected to sync server {}", addr);
        Ok(Self {
            replicator,
            reader_task,
            writer_task,
        })
    }

    pub fn replicator(&self) -> &Arc<ClientReplicator<TcpClientLink>> {
        &self.replicator
    }

    pub fn is_connected(&self) -> bool {
        !self.reader_task.is_finished()
    }

    /// Wait until the server closes the connection.
    pub async fn closed(&mut self) {
        let _ = (&mut self.reader_task).await;
    }

    pub fn disconnect(self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}
