//! Server/client replication of prospect records
//!
//! - Replication policy on each side, independent of the network
//! - Checksummed bincode frames for the sync channel
//! - Tokio TCP transport

pub mod client;
pub mod frame;
pub mod message;
pub mod server;
pub mod tcp;
pub mod transport;

pub use client::{ClientReplicator, ReceiveOutcome};
pub use frame::{decode_frame, encode_frame, read_frame, write_frame, MAX_FRAME_PAYLOAD};
pub use message::{PeerId, ProspectBatch};
pub use server::{ProspectHook, ServerReplicator};
pub use tcp::{SyncClient, SyncServer, TcpClientLink, TcpServerLink};
pub use transport::{ClientLink, Outgoing, RecordingLink, ServerLink};
