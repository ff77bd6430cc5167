//! Socket.IO transport over tokio-tungstenite.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::packet::{
    AckResponse, DocRef, EVENT_DELETE_DOC, EVENT_JOIN, EVENT_LOAD_DOC, EVENT_PUSH_DOC_UPDATE,
    EnginePacket, JoinSpace, LoadDocData, PushDocData, PushDocUpdate, SocketPacket, decode_ack_data,
};
use super::{SPACE_TYPE, SyncConnector, SyncSession};
use crate::config::{Config, DEFAULT_CLIENT_VERSION, DEFAULT_TIMEOUT_MS};
use crate::error::{BlocksyncError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(DEFAULT_TIMEOUT_MS);

/// Opens Socket.IO sessions against a sync server.
#[derive(Clone)]
pub struct SocketIoConnector {
    endpoint: String,
    token: Option<String>,
    cookie: Option<String>,
    client_version: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl SocketIoConnector {
    /// Connector for a `ws://` or `wss://` Socket.IO endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            cookie: None,
            client_version: DEFAULT_CLIENT_VERSION.to_string(),
            connect_timeout: DEFAULT_TIMEOUT,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Connector for the endpoint, credentials and timeouts in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.socket_endpoint()?)
            .with_token(config.token.clone())
            .with_cookie(config.cookie.clone())
            .with_client_version(config.client_version.clone())
            .with_timeouts(
                Duration::from_millis(config.connect_timeout_ms),
                Duration::from_millis(config.request_timeout_ms),
            ))
    }

    /// Bearer token for the upgrade request and the connect payload.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Raw `Cookie` header for the upgrade request.
    pub fn with_cookie(mut self, cookie: Option<String>) -> Self {
        self.cookie = cookie.filter(|c| !c.is_empty());
        self
    }

    /// Client version announced on join.
    pub fn with_client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = version.into();
        self
    }

    /// Bounds for connecting and for each acknowledged request.
    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }

    /// The WebSocket URL sessions connect to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn open(&self) -> Result<SocketIoSession> {
        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| BlocksyncError::Connect(e.to_string()))?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| BlocksyncError::Connect("Token is not a valid header value".into()))?;
            request.headers_mut().insert(header::AUTHORIZATION, value);
        }
        if let Some(cookie) = &self.cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|_| BlocksyncError::Connect("Cookie is not a valid header value".into()))?;
            request.headers_mut().insert(header::COOKIE, value);
        }

        let (ws, _) = connect_async(request)
            .await
            .map_err(|e| BlocksyncError::Connect(e.to_string()))?;
        log::debug!("WebSocket connected to {}", self.endpoint);

        let mut session = SocketIoSession {
            ws,
            next_ack_id: 0,
            client_version: self.client_version.clone(),
            request_timeout: self.request_timeout,
            closed: false,
        };
        let auth = self.token.as_ref().map(|token| json!({ "token": token }));
        session.handshake(auth).await?;
        Ok(session)
    }
}

impl std::fmt::Debug for SocketIoConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials stay out of debug output.
        f.debug_struct("SocketIoConnector")
            .field("endpoint", &self.endpoint)
            .field("has_token", &self.token.is_some())
            .field("has_cookie", &self.cookie.is_some())
            .field("client_version", &self.client_version)
            .finish()
    }
}

#[async_trait]
impl SyncConnector for SocketIoConnector {
    type Session = SocketIoSession;

    async fn connect(&self) -> Result<SocketIoSession> {
        match tokio::time::timeout(self.connect_timeout, self.open()).await {
            Ok(session) => session,
            Err(_) => Err(BlocksyncError::ConnectTimeout(
                self.connect_timeout.as_millis() as u64,
            )),
        }
    }
}

/// What came back for a request.
enum Reply {
    Ack(AckResponse),
    TimedOut,
}

/// A connected Socket.IO session.
#[derive(Debug)]
pub struct SocketIoSession {
    ws: WsStream,
    next_ack_id: u64,
    client_version: String,
    request_timeout: Duration,
    closed: bool,
}

impl SocketIoSession {
    /// Engine.IO open, then Socket.IO connect on the default namespace.
    async fn handshake(&mut self, auth: Option<Value>) -> Result<()> {
        let mut opened = false;
        loop {
            match self.next_packet().await? {
                EnginePacket::Open(info) if !opened => {
                    log::debug!(
                        "Engine.IO open, ping interval {} ms",
                        info.ping_interval
                    );
                    opened = true;
                    self.send(EnginePacket::Message(SocketPacket::Connect(auth.clone())))
                        .await?;
                }
                EnginePacket::Ping => self.send(EnginePacket::Pong).await?,
                EnginePacket::Message(SocketPacket::Connect(_)) if opened => return Ok(()),
                EnginePacket::Message(SocketPacket::ConnectError(error)) => {
                    let message = error
                        .get("message")
                        .and_then(Value::as_str)
                        .map_or_else(|| error.to_string(), str::to_string);
                    return Err(BlocksyncError::Connect(message));
                }
                EnginePacket::Close | EnginePacket::Message(SocketPacket::Disconnect) => {
                    return Err(BlocksyncError::ConnectionClosed);
                }
                other => log::debug!("Ignoring packet during handshake: {other:?}"),
            }
        }
    }

    async fn send(&mut self, packet: EnginePacket) -> Result<()> {
        let frame = packet.encode();
        // The connect payload carries the token.
        if matches!(packet, EnginePacket::Message(SocketPacket::Connect(Some(_)))) {
            log::debug!("-> 40{{..}}");
        } else {
            log::debug!("-> {}", truncate(&frame));
        }
        self.ws
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| BlocksyncError::Protocol(format!("Failed to send packet: {e}")))
    }

    /// Next Engine.IO packet, skipping WebSocket control frames.
    async fn next_packet(&mut self) -> Result<EnginePacket> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    log::debug!("<- {}", truncate(text.as_str()));
                    return EnginePacket::decode(text.as_str());
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.closed = true;
                    return Err(BlocksyncError::ConnectionClosed);
                }
                Some(Ok(Message::Binary(_))) => {
                    return Err(BlocksyncError::Protocol(
                        "Unexpected binary frame".to_string(),
                    ));
                }
                Some(Err(e)) => return Err(BlocksyncError::Protocol(e.to_string())),
                Some(Ok(_)) => {}
            }
        }
    }

    /// Emit an event that expects no acknowledgment.
    async fn emit<T: Serialize + Sync>(&mut self, event: &str, payload: &T) -> Result<()> {
        let args = vec![serde_json::to_value(payload)?];
        self.send(EnginePacket::Message(SocketPacket::Event {
            id: None,
            name: event.to_string(),
            args,
        }))
        .await
    }

    /// Emit an event and wait for its acknowledgment, answering pings
    /// meanwhile.
    async fn request<T: Serialize + Sync>(&mut self, event: &str, payload: &T) -> Result<Reply> {
        let id = self.next_ack_id;
        self.next_ack_id += 1;
        let args = vec![serde_json::to_value(payload)?];
        self.send(EnginePacket::Message(SocketPacket::Event {
            id: Some(id),
            name: event.to_string(),
            args,
        }))
        .await?;

        let deadline = tokio::time::Instant::now() + self.request_timeout;
        loop {
            tokio::select! {
                biased;

                packet = self.next_packet() => {
                    match packet? {
                        EnginePacket::Ping => self.send(EnginePacket::Pong).await?,
                        EnginePacket::Message(SocketPacket::Ack { id: ack_id, args }) if ack_id == id => {
                            return Ok(Reply::Ack(AckResponse::from_args(&args)));
                        }
                        EnginePacket::Close | EnginePacket::Message(SocketPacket::Disconnect) => {
                            self.closed = true;
                            return Err(BlocksyncError::ConnectionClosed);
                        }
                        other => log::debug!("Ignoring packet while awaiting ack {id}: {other:?}"),
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    log::debug!("No ack for '{event}' (id {id}) within {:?}", self.request_timeout);
                    return Ok(Reply::TimedOut);
                }
            }
        }
    }

    fn timeout_ms(&self) -> u64 {
        self.request_timeout.as_millis() as u64
    }

    fn doc_ref(space_id: &str, doc_id: &str) -> DocRef {
        DocRef {
            space_type: SPACE_TYPE.to_string(),
            space_id: space_id.to_string(),
            doc_id: doc_id.to_string(),
        }
    }
}

#[async_trait]
impl SyncSession for SocketIoSession {
    async fn join(&mut self, space_id: &str) -> Result<()> {
        let payload = JoinSpace {
            space_type: SPACE_TYPE.to_string(),
            space_id: space_id.to_string(),
            client_version: self.client_version.clone(),
        };
        match self.request(EVENT_JOIN, &payload).await? {
            Reply::Ack(AckResponse::Error(error)) => Err(BlocksyncError::JoinFailed(error.to_string())),
            Reply::Ack(AckResponse::Data(_)) => Ok(()),
            Reply::TimedOut => Err(BlocksyncError::JoinTimeout(space_id.to_string())),
        }
    }

    async fn load_doc(&mut self, space_id: &str, doc_id: &str) -> Result<Option<Vec<u8>>> {
        let payload = Self::doc_ref(space_id, doc_id);
        let data = match self.request(EVENT_LOAD_DOC, &payload).await? {
            Reply::Ack(AckResponse::Error(error)) if error.is_not_found() => return Ok(None),
            Reply::Ack(AckResponse::Error(error)) => {
                return Err(BlocksyncError::LoadFailed(error.to_string()));
            }
            Reply::Ack(AckResponse::Data(data)) => data,
            Reply::TimedOut => {
                return Err(BlocksyncError::LoadFailed(format!(
                    "No acknowledgment within {} ms",
                    self.timeout_ms()
                )));
            }
        };

        let data: LoadDocData = decode_ack_data(data).map_err(|e| {
            BlocksyncError::LoadFailed(format!("Malformed load-doc acknowledgment: {e}"))
        })?;
        match data.missing.filter(|m| !m.is_empty()) {
            Some(encoded) => {
                let snapshot = BASE64.decode(encoded).map_err(|e| {
                    BlocksyncError::Protocol(format!("Snapshot is not valid base64: {e}"))
                })?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    async fn push_doc_update(&mut self, space_id: &str, doc_id: &str, update: &[u8]) -> Result<i64> {
        let payload = PushDocUpdate {
            space_type: SPACE_TYPE.to_string(),
            space_id: space_id.to_string(),
            doc_id: doc_id.to_string(),
            update: BASE64.encode(update),
        };
        match self.request(EVENT_PUSH_DOC_UPDATE, &payload).await? {
            Reply::Ack(AckResponse::Error(error)) => Err(BlocksyncError::PushFailed(error.to_string())),
            Reply::Ack(AckResponse::Data(data)) => {
                let data: PushDocData = decode_ack_data(data).map_err(|e| {
                    BlocksyncError::PushFailed(format!("Malformed push acknowledgment: {e}"))
                })?;
                data.timestamp.map(|t| t as i64).ok_or_else(|| {
                    BlocksyncError::PushFailed("Push acknowledgment carries no timestamp".into())
                })
            }
            Reply::TimedOut => Err(BlocksyncError::PushFailed(format!(
                "No acknowledgment within {} ms",
                self.timeout_ms()
            ))),
        }
    }

    async fn delete_doc(&mut self, space_id: &str, doc_id: &str) -> Result<()> {
        self.emit(EVENT_DELETE_DOC, &Self::doc_ref(space_id, doc_id)).await
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let farewell = self
            .send(EnginePacket::Message(SocketPacket::Disconnect))
            .await;
        let close = self
            .ws
            .close(None)
            .await
            .map_err(|e| BlocksyncError::Protocol(format!("Failed to close WebSocket: {e}")));
        farewell.and(close)
    }
}

fn truncate(frame: &str) -> &str {
    const MAX: usize = 200;
    match frame.char_indices().nth(MAX) {
        Some((end, _)) => &frame[..end],
        None => frame,
    }
}
