//! haul-proto - Wire protocol for the haul daemon
//!
//! Defines the framed envelope format spoken between clients and the daemon:
//! a u32 big-endian length prefix followed by a JSON-encoded [`Envelope`].
//! Every envelope carries the protocol version and one [`Message`] - the
//! handshake pair, a request, a response, or an event notification.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::EnvelopeCodec;
pub use error::ProtocolError;
pub use message::{
    Compression, Envelope, Event, Fault, FaultKind, Message, Request, Response, ResponseBody,
};

/// Current wire protocol version. Bumped on incompatible envelope changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Default cap on a single frame's payload size (4 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;
