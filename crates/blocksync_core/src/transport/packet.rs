//! Engine.IO v4 / Socket.IO v5 text packets and space event payloads.
//!
//! # Wire Format
//!
//! Every WebSocket text frame is one Engine.IO packet, a type digit
//! followed by its payload:
//! - `0{json}`: open (handshake parameters)
//! - `1`: close
//! - `2` / `3`: ping / pong
//! - `4<socket.io packet>`: message
//!
//! A Socket.IO packet is `<type>[<namespace>,][<ack id>][json]`:
//! - `0[json]`: connect, with optional auth payload
//! - `1`: disconnect
//! - `2[id][event, args...]`: event, acknowledged when an id is present
//! - `3<id>[args...]`: acknowledgment
//! - `4{json}`: connect error
//!
//! Binary attachments are not used; binary data travels as base64 strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BlocksyncError, Result};

/// Engine.IO packet type digits.
mod engine_type {
    pub const OPEN: char = '0';
    pub const CLOSE: char = '1';
    pub const PING: char = '2';
    pub const PONG: char = '3';
    pub const MESSAGE: char = '4';
    pub const UPGRADE: char = '5';
    pub const NOOP: char = '6';
}

/// Socket.IO packet type digits.
mod socket_type {
    pub const CONNECT: char = '0';
    pub const DISCONNECT: char = '1';
    pub const EVENT: char = '2';
    pub const ACK: char = '3';
    pub const CONNECT_ERROR: char = '4';
    pub const BINARY_EVENT: char = '5';
    pub const BINARY_ACK: char = '6';
}

/// Handshake parameters sent by the server in the open packet.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    /// Engine.IO session id.
    #[serde(default)]
    pub sid: String,
    /// Milliseconds between server pings.
    #[serde(default)]
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    #[serde(default)]
    pub ping_timeout: u64,
}

/// One Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    /// `0`: handshake parameters.
    Open(OpenInfo),
    /// `1`: transport close.
    Close,
    /// `2`: heartbeat from the server.
    Ping,
    /// `3`: heartbeat reply.
    Pong,
    /// `4`: Socket.IO payload.
    Message(SocketPacket),
    /// `5`: transport upgrade, unused over WebSocket.
    Upgrade,
    /// `6`: no-op.
    Noop,
}

/// One Socket.IO packet on the default namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// `0`: connect, with an optional auth or handshake payload.
    Connect(Option<Value>),
    /// `1`: disconnect.
    Disconnect,
    /// `2`: event.
    Event {
        /// Ack id; present when the sender expects an acknowledgment.
        id: Option<u64>,
        /// Event name.
        name: String,
        /// Event arguments.
        args: Vec<Value>,
    },
    /// `3`: acknowledgment of an event.
    Ack {
        /// Id of the acknowledged event.
        id: u64,
        /// Acknowledgment arguments.
        args: Vec<Value>,
    },
    /// `4`: connect refused, with the server's reason.
    ConnectError(Value),
}

impl EnginePacket {
    /// Encode as a WebSocket text frame.
    pub fn encode(&self) -> String {
        match self {
            // Only servers send open packets; encoded for test peers.
            EnginePacket::Open(info) => format!(
                "{}{{\"sid\":{},\"upgrades\":[],\"pingInterval\":{},\"pingTimeout\":{}}}",
                engine_type::OPEN,
                Value::String(info.sid.clone()),
                info.ping_interval,
                info.ping_timeout
            ),
            EnginePacket::Close => engine_type::CLOSE.to_string(),
            EnginePacket::Ping => engine_type::PING.to_string(),
            EnginePacket::Pong => engine_type::PONG.to_string(),
            EnginePacket::Message(packet) => format!("{}{}", engine_type::MESSAGE, packet.encode()),
            EnginePacket::Upgrade => engine_type::UPGRADE.to_string(),
            EnginePacket::Noop => engine_type::NOOP.to_string(),
        }
    }

    /// Decode a WebSocket text frame.
    pub fn decode(frame: &str) -> Result<Self> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| BlocksyncError::Protocol("Empty Engine.IO packet".to_string()))?;
        let rest = chars.as_str();
        match kind {
            engine_type::OPEN => {
                let info = serde_json::from_str(rest).map_err(|e| {
                    BlocksyncError::Protocol(format!("Malformed open packet: {e}"))
                })?;
                Ok(EnginePacket::Open(info))
            }
            engine_type::CLOSE => Ok(EnginePacket::Close),
            engine_type::PING => Ok(EnginePacket::Ping),
            engine_type::PONG => Ok(EnginePacket::Pong),
            engine_type::MESSAGE => Ok(EnginePacket::Message(SocketPacket::decode(rest)?)),
            engine_type::UPGRADE => Ok(EnginePacket::Upgrade),
            engine_type::NOOP => Ok(EnginePacket::Noop),
            other => Err(BlocksyncError::Protocol(format!(
                "Unknown Engine.IO packet type '{other}'"
            ))),
        }
    }
}

impl SocketPacket {
    /// Encode without the Engine.IO prefix.
    pub fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(None) => socket_type::CONNECT.to_string(),
            SocketPacket::Connect(Some(auth)) => format!("{}{auth}", socket_type::CONNECT),
            SocketPacket::Disconnect => socket_type::DISCONNECT.to_string(),
            SocketPacket::Event { id, name, args } => {
                let mut data = Vec::with_capacity(args.len() + 1);
                data.push(Value::String(name.clone()));
                data.extend(args.iter().cloned());
                format!(
                    "{}{}{}",
                    socket_type::EVENT,
                    id.map(|id| id.to_string()).unwrap_or_default(),
                    Value::Array(data)
                )
            }
            SocketPacket::Ack { id, args } => {
                format!("{}{id}{}", socket_type::ACK, Value::Array(args.clone()))
            }
            SocketPacket::ConnectError(error) => format!("{}{error}", socket_type::CONNECT_ERROR),
        }
    }

    /// Decode a packet without the Engine.IO prefix.
    pub fn decode(packet: &str) -> Result<Self> {
        let mut chars = packet.chars();
        let kind = chars
            .next()
            .ok_or_else(|| BlocksyncError::Protocol("Empty Socket.IO packet".to_string()))?;
        let mut rest = chars.as_str();

        // Namespace, present only when not the default one.
        if rest.starts_with('/') {
            rest = rest.split_once(',').map_or("", |(_, tail)| tail);
        }

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let id = if digits > 0 {
            Some(rest[..digits].parse::<u64>().map_err(|e| {
                BlocksyncError::Protocol(format!("Malformed ack id: {e}"))
            })?)
        } else {
            None
        };
        let data = parse_data(&rest[digits..])?;

        match kind {
            socket_type::CONNECT => Ok(SocketPacket::Connect(data)),
            socket_type::DISCONNECT => Ok(SocketPacket::Disconnect),
            socket_type::EVENT => {
                let mut args = into_args(data)?;
                if args.is_empty() {
                    return Err(BlocksyncError::Protocol("Event without a name".to_string()));
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    other => {
                        return Err(BlocksyncError::Protocol(format!(
                            "Event name is not a string: {other}"
                        )));
                    }
                };
                Ok(SocketPacket::Event { id, name, args })
            }
            socket_type::ACK => {
                let id = id.ok_or_else(|| {
                    BlocksyncError::Protocol("Acknowledgment without an id".to_string())
                })?;
                Ok(SocketPacket::Ack {
                    id,
                    args: into_args(data)?,
                })
            }
            socket_type::CONNECT_ERROR => Ok(SocketPacket::ConnectError(data.unwrap_or(Value::Null))),
            socket_type::BINARY_EVENT | socket_type::BINARY_ACK => Err(BlocksyncError::Protocol(
                "Binary Socket.IO packets are not supported".to_string(),
            )),
            other => Err(BlocksyncError::Protocol(format!(
                "Unknown Socket.IO packet type '{other}'"
            ))),
        }
    }
}

fn parse_data(data: &str) -> Result<Option<Value>> {
    if data.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(data)
        .map(Some)
        .map_err(|e| BlocksyncError::Protocol(format!("Malformed packet payload: {e}")))
}

fn into_args(data: Option<Value>) -> Result<Vec<Value>> {
    match data {
        None => Ok(Vec::new()),
        Some(Value::Array(args)) => Ok(args),
        Some(other) => Err(BlocksyncError::Protocol(format!(
            "Expected an argument array, got {other}"
        ))),
    }
}

// ===========================================================================
// Space events
// ===========================================================================

/// Join a space.
pub const EVENT_JOIN: &str = "space:join";
/// Load a document snapshot.
pub const EVENT_LOAD_DOC: &str = "space:load-doc";
/// Push an update.
pub const EVENT_PUSH_DOC_UPDATE: &str = "space:push-doc-update";
/// Delete a document; not acknowledged.
pub const EVENT_DELETE_DOC: &str = "space:delete-doc";

/// Server error name for an unknown document.
pub const DOC_NOT_FOUND: &str = "DOC_NOT_FOUND";

/// Payload of the join request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpace {
    /// Always [`SPACE_TYPE`](super::SPACE_TYPE).
    pub space_type: String,
    /// Workspace id.
    pub space_id: String,
    /// Client version announced to the server.
    pub client_version: String,
}

/// Payload of load and delete requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocRef {
    /// Always [`SPACE_TYPE`](super::SPACE_TYPE).
    pub space_type: String,
    /// Workspace id.
    pub space_id: String,
    /// Target document.
    pub doc_id: String,
}

/// Payload of a push request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushDocUpdate {
    /// Always [`SPACE_TYPE`](super::SPACE_TYPE).
    pub space_type: String,
    /// Workspace id.
    pub space_id: String,
    /// Target document.
    pub doc_id: String,
    /// Base64 update.
    pub update: String,
}

/// Data of a `space:load-doc` acknowledgment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoadDocData {
    /// Base64 snapshot.
    pub missing: Option<String>,
    /// Server clock of the snapshot, in milliseconds.
    pub timestamp: Option<f64>,
}

/// Data of a `space:push-doc-update` acknowledgment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushDocData {
    /// Server clock at which the update was accepted, in milliseconds.
    pub timestamp: Option<f64>,
}

/// Decode the `data` of a successful acknowledgment.
///
/// `null` is read as an empty payload. Anything else must match `T`.
pub fn decode_ack_data<T>(data: Value) -> std::result::Result<T, serde_json::Error>
where
    T: serde::de::DeserializeOwned + Default,
{
    if data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data)
}

/// Error reported in an acknowledgment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AckError {
    /// Machine-readable error name, e.g. `DOC_NOT_FOUND`.
    #[serde(default)]
    pub name: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// HTTP-like status, when the server sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl AckError {
    /// Whether this is the server's "unknown document" answer.
    pub fn is_not_found(&self) -> bool {
        self.name == DOC_NOT_FOUND || self.status == Some(404)
    }
}

impl std::fmt::Display for AckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.name.is_empty(), self.message.is_empty()) {
            (false, false) => write!(f, "{}: {}", self.name, self.message),
            (false, true) => f.write_str(&self.name),
            (true, false) => f.write_str(&self.message),
            (true, true) => f.write_str("unknown server error"),
        }
    }
}

/// Body of an acknowledgment: `{data}` or `{error}`.
#[derive(Debug, Clone, PartialEq)]
pub enum AckResponse {
    /// `{data}`: success.
    Data(Value),
    /// `{error}`: failure.
    Error(AckError),
}

impl AckResponse {
    /// Interpret the first acknowledgment argument.
    pub fn from_args(args: &[Value]) -> Self {
        let Some(first) = args.first() else {
            return AckResponse::Data(Value::Null);
        };
        if let Some(error) = first.get("error").filter(|e| !e.is_null()) {
            let error = serde_json::from_value(error.clone()).unwrap_or_else(|_| AckError {
                message: error.to_string(),
                ..Default::default()
            });
            return AckResponse::Error(error);
        }
        AckResponse::Data(first.get("data").cloned().unwrap_or_else(|| first.clone()))
    }

    /// The success payload.
    pub fn data(&self) -> Option<&Value> {
        match self {
            AckResponse::Data(data) => Some(data),
            AckResponse::Error(_) => None,
        }
    }

    /// The failure.
    pub fn error(&self) -> Option<&AckError> {
        match self {
            AckResponse::Data(_) => None,
            AckResponse::Error(error) => Some(error),
        }
    }

    /// Acknowledgment arguments carrying `data`.
    pub fn ok(data: Value) -> Vec<Value> {
        vec![serde_json::json!({ "data": data })]
    }

    /// Acknowledgment arguments carrying `error`.
    pub fn err(error: &AckError) -> Vec<Value> {
        vec![serde_json::json!({ "error": error })]
    }
}
