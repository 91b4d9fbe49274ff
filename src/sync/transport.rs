//! Transport seams for the replication policy
//!
//! The policy only needs fire-and-forget delivery over an ordered, reliable
//! channel. Delivery failures are the transport's concern: implementations
//! log and drop, they never report back.

use crate::sync::message::{PeerId, ProspectBatch};
use std::sync::{Arc, Mutex, PoisonError};

/// Server side of the sync channel.
pub trait ServerLink: Send + Sync {
    /// Send a batch to one client.
    fn send_to(&self, peer: PeerId, batch: &ProspectBatch);

    /// Send a batch to every connected client except `except`.
    fn broadcast_except(&self, except: PeerId, batch: &ProspectBatch);
}

/// Client side of the sync channel.
pub trait ClientLink: Send + Sync {
    /// Send a batch to the server.
    fn send(&self, batch: &ProspectBatch);
}

impl<L: ServerLink + ?Sized> ServerLink for Arc<L> {
    fn send_to(&self, peer: PeerId, batch: &ProspectBatch) {
        (**self).send_to(peer, batch)
    }

    fn broadcast_except(&self, except: PeerId, batch: &ProspectBatch) {
        (**self).broadcast_except(except, batch)
    }
}

impl<L: ClientLink + ?Sized> ClientLink for Arc<L> {
    fn send(&self, batch: &ProspectBatch) {
        (**self).send(batch)
    }
}

/// Where a recorded outgoing batch went.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    To(PeerId, ProspectBatch),
    BroadcastExcept(PeerId, ProspectBatch),
    ToServer(ProspectBatch),
}

/// In-process link that records every outgoing batch instead of sending it.
///
/// Used to drive the policy without a network, and to wire several
/// replicators together in one process.
#[derive(Debug, Default)]
pub struct RecordingLink {
    sent: Mutex<Vec<Outgoing>>,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything sent so far.
    pub fn drain(&self) -> Vec<Outgoing> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn push(&self, outgoing: Outgoing) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outgoing);
    }
}

impl ServerLink for RecordingLink {
    fn send_to(&self, peer: PeerId, batch: &ProspectBatch) {
        self.push(Outgoing::To(peer, batch.clone()));
    }

    fn broadcast_except(&self, except: PeerId, batch: &ProspectBatch) {
        self.push(Outgoing::BroadcastExcept(except, batch.clone()));
    }
}

impl ClientLink for RecordingLink {
    fn send(&self, batch: &ProspectBatch) {
        self.push(Outgoing::ToServer(batch.clone()));
    }
}
