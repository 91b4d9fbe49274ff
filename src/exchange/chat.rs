//! Prospecting data embedded in chat text
//!
//! Payload format: `ProspectingData;<base64(deflate(bincode(Snapshot)))>`
//! with a space inserted every 64 base64 characters. The marker may appear
//! anywhere in a chat line; whatever follows it is the payload.
//!
//! Chat is a noisy channel. Import failures are logged and treated as "no
//! data"; they never reach the caller and never touch the store.

use crate::common::{codec, Error, Result, SharingSettings, Snapshot};
use crate::store::RecordStore;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::sync::Arc;

/// Locates a payload inside a chat line.
pub const CHAT_MARKER: &str = "ProspectingData;";

/// Base64 characters between inserted spaces.
pub const WHITESPACE_INTERVAL: usize = 64;

/// Largest inflated payload accepted from chat.
pub const MAX_DECODED_BYTES: u64 = 8 * 1024 * 1024;

/// Render a snapshot as a chat line, marker included.
pub fn export(snapshot: &Snapshot) -> Result<String> {
    Ok(format!("{}{}", CHAT_MARKER, encode_payload(snapshot)?))
}

/// Encode a snapshot as spaced base64, without the marker.
pub fn encode_payload(snapshot: &Snapshot) -> Result<String> {
    let encoded = codec::encode(snapshot)?;
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&encoded)?;
    let compressed = encoder.finish()?;
    Ok(insert_whitespace(&BASE64.encode(compressed), WHITESPACE_INTERVAL))
}

/// Split `text` into `interval`-sized runs joined by single spaces.
pub fn insert_whitespace(text: &str, interval: usize) -> String {
    if interval == 0 || text.len() <= interval {
        return text.to_string();
    }
    let mut spaced = String::with_capacity(text.len() + text.len() / interval);
    for (i, c) in text.chars().enumerate() {
        if i > 0 && i % interval == 0 {
            spaced.push(' ');
        }
        spaced.push(c);
    }
    spaced
}

/// The text after the first marker in `line`, if any.
pub fn find_payload(line: &str) -> Option<&str> {
    line.find(CHAT_MARKER)
        .map(|start| &line[start + CHAT_MARKER.len()..])
}

/// Decode spaced base64 back into a snapshot.
pub fn decode_payload(payload: &str) -> Result<Snapshot> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let compressed = BASE64.decode(compact.as_bytes())?;

    let mut inflated = Vec::new();
    DeflateDecoder::new(&compressed[..])
        .take(MAX_DECODED_BYTES + 1)
        .read_to_end(&mut inflated)
        .map_err(|e| Error::Inflate(e.to_string()))?;
    if inflated.len() as u64 > MAX_DECODED_BYTES {
        return Err(Error::Inflate(format!(
            "payload inflates past {} bytes",
            MAX_DECODED_BYTES
        )));
    }

    codec::decode_snapshot(&inflated)
}

/// Who posted a chat line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOrigin {
    /// The local player
    Own,
    /// Anyone else
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// No marker in the line
    NotPayload,
    /// Our own message, ignored
    OwnMessage,
    /// Payload found but chat sharing is switched off
    Disabled,
    /// Payload could not be decoded
    Rejected,
    /// Records merged into the store
    Imported(usize),
}

/// Chat import/export bound to a local store.
pub struct ChatExchange {
    store: Arc<RecordStore>,
    settings: Arc<SharingSettings>,
}

impl ChatExchange {
    pub fn new(store: Arc<RecordStore>, settings: Arc<SharingSettings>) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn settings(&self) -> &Arc<SharingSettings> {
        &self.settings
    }

    /// The whole local store as a chat line.
    pub fn share_text(&self) -> Result<String> {
        let snapshot = self.store.snapshot();
        let line = export(&snapshot)?;
        tracing::info!(
            "Exported {} record(s) as a {}-character chat payload",
            snapshot.len(),
            line.len()
        );
        Ok(line)
    }

    /// Inspect one incoming chat line and import any payload it carries.
    pub fn on_chat_line(&self, line: &str, origin: ChatOrigin) -> ImportOutcome {
        if origin == ChatOrigin::Own {
            return ImportOutcome::OwnMessage;
        }
        let Some(payload) = find_payload(line) else {
            return ImportOutcome::NotPayload;
        };
        if !self.settings.accept_chat_sharing() {
            tracing::debug!("Ignoring chat payload, chat sharing is disabled");
            return ImportOutcome::Disabled;
        }

        match decode_payload(payload) {
            Ok(snapshot) => {
                let applied = self.store.upsert(&snapshot.records);
                tracing::info!("Imported {} record(s) from chat", applied);
                ImportOutcome::Imported(applied)
            }
            Err(e) => {
                tracing::warn!("Failed to decode shared prospecting data from chat: {}", e);
                ImportOutcome::Rejected
            }
        }
    }
}
