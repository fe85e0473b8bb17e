//! Envelope and message types
//!
//! One [`Envelope`] is one framed unit of wire traffic. Clients open with
//! `hello`, the daemon answers `hello_ack`, and from then on the client
//! sends requests while the daemon sends responses and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One framed unit of wire traffic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Protocol version the sender speaks
    pub version: u32,
    /// The carried message
    pub message: Message,
}

impl Envelope {
    /// Wrap a message in an envelope carrying the current protocol version.
    pub fn new(message: Message) -> Self {
        Self {
            version: crate::PROTOCOL_VERSION,
            message,
        }
    }
}

/// Payload compression coding, negotiated during the handshake.
///
/// The daemon currently always selects `none`; the negotiation exists so a
/// coding can be added later without a protocol version bump.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    None,
}

/// Messages carried by an envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Connection opener (client to server)
    Hello {
        /// Compression codings the client offers, in preference order
        compression: Vec<Compression>,
    },

    /// Handshake acknowledgement (server to client)
    HelloAck {
        /// The coding the server chose
        compression: Compression,
    },

    /// An operation call (client to server)
    Request(Request),

    /// The reply to exactly one request (server to client)
    Response(Response),

    /// An asynchronous notification (server to client)
    Event(Event),
}

impl Message {
    /// Short tag for logging and protocol-violation reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Hello { .. } => "hello",
            Message::HelloAck { .. } => "hello_ack",
            Message::Request(_) => "request",
            Message::Response(_) => "response",
            Message::Event(_) => "event",
        }
    }
}

/// An operation call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    /// Unique within the issuing session while outstanding
    pub id: u64,
    /// Registered operation name, e.g. `job.add`
    pub operation: String,
    /// Positional arguments
    #[serde(default)]
    pub args: Vec<Value>,
    /// Named arguments
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

/// The reply to a request: the matching id plus a result or a fault.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    /// Matches the id of exactly one prior request
    pub id: u64,
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl Response {
    pub fn result(id: u64, value: Value) -> Self {
        Self {
            id,
            body: ResponseBody::Result(value),
        }
    }

    pub fn fault(id: u64, kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            id,
            body: ResponseBody::Fault(Fault {
                kind,
                message: message.into(),
            }),
        }
    }

    /// The fault record, if this response is a fault.
    pub fn as_fault(&self) -> Option<&Fault> {
        match &self.body {
            ResponseBody::Fault(fault) => Some(fault),
            ResponseBody::Result(_) => None,
        }
    }
}

/// Exactly one of a result value or a fault record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseBody {
    Result(Value),
    Fault(Fault),
}

/// A structured failure returned in a response instead of raised locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

/// Recoverable failure kinds. None of these terminate the connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Bad credentials, or insufficient level for the operation
    AuthError,
    /// No operation registered under the requested name
    MethodNotFound,
    /// The operation's implementation failed or panicked
    HandlerError,
    /// The operation exceeded the configured handler timeout
    Timeout,
}

/// An asynchronous notification fanned out to subscribed sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Event name clients filter on, e.g. `job.status`
    pub name: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with the current time.
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}
