#![forbid(unsafe_code)]
//! Frame parsing and serialization for the bridge WebSocket gateway's wire
//! protocol. Pure data in, data out — no async runtime, no I/O.

mod codec;
mod error;
mod message;

pub use codec::{parse_client_message, serialize_server_message};
pub use error::CodecError;
pub use message::{
    CancelRequest, ClientMessage, ImageAttachment, PromptRequest, Provider, ServerMessage,
    ALLOWED_MEDIA_TYPES,
};
