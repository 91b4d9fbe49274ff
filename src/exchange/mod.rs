//! Out-of-band sharing of prospecting data through chat text

pub mod chat;

pub use chat::{
    decode_payload, encode_payload, export, find_payload, ChatExchange, ChatOrigin,
    ImportOutcome, CHAT_MARKER,
};
