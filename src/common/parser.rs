//! Reading parser interface
//!
//! Turning a free-form, locale-specific prospecting message into ore values
//! is the host's business. The core only needs a tagged answer back.

use crate::common::record::{ChunkCoordinate, OreOccurrence, ProspectRecord};

/// Result of parsing one prospecting message.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(Vec<OreOccurrence>),
    /// The text did not match the parser's locale; keep it verbatim.
    UnparsedFallback(String),
}

/// Host-provided message parser. A mismatch is an outcome, not an error.
pub trait ReadingParser: Send + Sync {
    fn parse(&self, text: &str) -> ParseOutcome;
}

impl<F> ReadingParser for F
where
    F: Fn(&str) -> ParseOutcome + Send + Sync,
{
    fn parse(&self, text: &str) -> ParseOutcome {
        self(text)
    }
}

impl ProspectRecord {
    /// Build a record from a raw prospecting message.
    pub fn from_message(chunk: ChunkCoordinate, text: &str, parser: &dyn ReadingParser) -> Self {
        match parser.parse(text) {
            ParseOutcome::Parsed(values) => ProspectRecord::new(chunk, values),
            ParseOutcome::UnparsedFallback(raw) => ProspectRecord::unparsed(chunk, raw),
        }
    }
}
