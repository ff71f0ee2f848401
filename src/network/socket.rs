//! Live updates over Socket.IO (protocol 5) on the Engine.IO v4 websocket transport.
//!
//! One connection serves one open conversation. Decoded events go straight
//! to the UI event channel; the UI drops events for other conversations.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::common::ChatEvent;
use crate::error::{ChatError, Result};

use super::wire::{WireDeleted, WireMessage};

pub const EVENT_MESSAGE: &str = "message";
pub const EVENT_MESSAGE_UPDATED: &str = "messageUpdated";
pub const EVENT_MESSAGE_DELETED: &str = "messageDeleted";

const PONG_FRAME: &str = "3";
const DISCONNECT_FRAME: &str = "41";
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Value),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Noop,
}

/// Socket.IO packet carried inside an Engine.IO message.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, payload: Value },
    ConnectError(Value),
}

pub fn decode_frame(frame: &str) -> Result<EnginePacket> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ChatError::Protocol("empty frame".to_string()))?;
    let rest = chars.as_str();

    match kind {
        '0' => Ok(EnginePacket::Open(serde_json::from_str(rest)?)),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => Ok(EnginePacket::Message(decode_socket_packet(rest)?)),
        '6' => Ok(EnginePacket::Noop),
        other => Err(ChatError::Protocol(format!("unknown engine packet `{other}`"))),
    }
}

fn decode_socket_packet(packet: &str) -> Result<SocketPacket> {
    let mut chars = packet.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ChatError::Protocol("empty socket packet".to_string()))?;
    let body = strip_namespace(chars.as_str());

    match kind {
        '0' if body.is_empty() => Ok(SocketPacket::Connect(None)),
        '0' => Ok(SocketPacket::Connect(Some(serde_json::from_str(body)?))),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => {
            // Acknowledgement ids precede the array.
            let body = body.trim_start_matches(|c: char| c.is_ascii_digit());
            let mut items = match serde_json::from_str::<Value>(body)? {
                Value::Array(items) => items.into_iter(),
                _ => return Err(ChatError::Protocol("event is not an array".to_string())),
            };
            let name = match items.next() {
                Some(Value::String(name)) => name,
                _ => return Err(ChatError::Protocol("event has no name".to_string())),
            };
            Ok(SocketPacket::Event {
                name,
                payload: items.next().unwrap_or(Value::Null),
            })
        }
        '4' => Ok(SocketPacket::ConnectError(
            serde_json::from_str(body).unwrap_or(Value::Null),
        )),
        other => Err(ChatError::Protocol(format!("unsupported socket packet `{other}`"))),
    }
}

fn strip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        body.split_once(',').map(|(_, rest)| rest).unwrap_or("")
    } else {
        body
    }
}

pub fn encode_connect(token: &str) -> String {
    format!("40{}", json!({ "token": token }))
}

/// Maps a named event to a UI event. Unknown names yield `None`.
pub fn map_event(name: &str, payload: Value) -> Result<Option<ChatEvent>> {
    let event = match name {
        EVENT_MESSAGE => {
            let wire: WireMessage = serde_json::from_value(payload)?;
            ChatEvent::LiveMessage(wire.into_message(None)?)
        }
        EVENT_MESSAGE_UPDATED => {
            let wire: WireMessage = serde_json::from_value(payload)?;
            ChatEvent::LiveMessageUpdated(wire.into_message(None)?)
        }
        EVENT_MESSAGE_DELETED => {
            let wire: WireDeleted = serde_json::from_value(payload)?;
            let id = wire.into_id().ok_or_else(|| {
                ChatError::Protocol("messageDeleted without a message id".to_string())
            })?;
            ChatEvent::LiveMessageDeleted(id)
        }
        _ => return Ok(None),
    };
    Ok(Some(event))
}

/// Builds the websocket endpoint from the configured socket base URL.
pub fn socket_endpoint(base: &str) -> Result<String> {
    let mut url = Url::parse(base)
        .map_err(|err| ChatError::Socket(format!("invalid socket url `{base}`: {err}")))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| ChatError::Socket(format!("cannot use `{scheme}` for `{base}`")))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url.to_string())
}

/// Running live-update connection. Dropping it aborts the task.
pub struct SocketHandle {
    chat_id: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SocketHandle {
    pub fn new(chat_id: &str, shutdown: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Asks the task to send a disconnect packet and waits briefly for it to finish.
    pub async fn disconnect(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let abort = task.abort_handle();
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                abort.abort();
            }
        }
        log::debug!("Live updates for chat {} closed", self.chat_id);
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
pub trait SocketConnector: Send + Sync {
    /// Opens a connection authenticated with `token`, forwarding events for
    /// the lifetime of the returned handle.
    async fn connect(
        &self,
        token: &str,
        chat_id: &str,
        events: mpsc::Sender<ChatEvent>,
    ) -> Result<SocketHandle>;
}

pub struct SocketIoConnector {
    endpoint: String,
}

impl SocketIoConnector {
    pub fn new(socket_url: &str) -> Result<Self> {
        Ok(Self {
            endpoint: socket_endpoint(socket_url)?,
        })
    }
}

#[async_trait]
impl SocketConnector for SocketIoConnector {
    async fn connect(
        &self,
        token: &str,
        chat_id: &str,
        events: mpsc::Sender<ChatEvent>,
    ) -> Result<SocketHandle> {
        let ws = tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake(&self.endpoint, token))
            .await
            .map_err(|_| ChatError::Socket("handshake timed out".to_string()))??;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_connection(ws, shutdown_rx, events, chat_id.to_string()));
        log::info!("Live updates connected for chat {chat_id}");
        Ok(SocketHandle::new(chat_id, shutdown_tx, task))
    }
}

async fn handshake(endpoint: &str, token: &str) -> Result<WsStream> {
    let (mut ws, _) = connect_async(endpoint).await?;

    match next_packet(&mut ws).await? {
        EnginePacket::Open(_) => {}
        other => {
            return Err(ChatError::Protocol(format!(
                "expected open packet, got {other:?}"
            )));
        }
    }

    ws.send(WsMessage::Text(encode_connect(token).into())).await?;

    loop {
        match next_packet(&mut ws).await? {
            EnginePacket::Message(SocketPacket::Connect(_)) => return Ok(ws),
            EnginePacket::Message(SocketPacket::ConnectError(reason)) => {
                log::warn!("Socket connection refused: {reason}");
                return Err(ChatError::Auth);
            }
            EnginePacket::Ping => ws.send(WsMessage::Text(PONG_FRAME.into())).await?,
            _ => {}
        }
    }
}

async fn next_packet(ws: &mut WsStream) -> Result<EnginePacket> {
    loop {
        match ws.next().await {
            Some(Ok(WsMessage::Text(text))) => return decode_frame(&text),
            Some(Ok(WsMessage::Close(_))) | None => {
                return Err(ChatError::Socket("connection closed during handshake".to_string()));
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(err.into()),
        }
    }
}

async fn run_connection(
    mut ws: WsStream,
    mut shutdown: oneshot::Receiver<()>,
    events: mpsc::Sender<ChatEvent>,
    chat_id: String,
) {
    let reason = loop {
        tokio::select! {
            _ = &mut shutdown => {
                let _ = ws.send(WsMessage::Text(DISCONNECT_FRAME.into())).await;
                let _ = ws.close(None).await;
                return;
            }
            frame = ws.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => match decode_frame(&text) {
                        Ok(EnginePacket::Ping) => {
                            if let Err(err) = ws.send(WsMessage::Text(PONG_FRAME.into())).await {
                                break err.to_string();
                            }
                        }
                        Ok(EnginePacket::Message(SocketPacket::Event { name, payload })) => {
                            match map_event(&name, payload) {
                                Ok(Some(event)) => {
                                    if events.send(event).await.is_err() {
                                        // UI is gone.
                                        return;
                                    }
                                }
                                Ok(None) => log::debug!("Ignoring socket event `{name}`"),
                                Err(err) => log::warn!("Dropping malformed `{name}` event: {err}"),
                            }
                        }
                        Ok(EnginePacket::Close)
                        | Ok(EnginePacket::Message(SocketPacket::Disconnect)) => {
                            break "server closed the connection".to_string();
                        }
                        Ok(_) => {}
                        Err(err) => log::warn!("Ignoring socket frame: {err}"),
                    },
                    Some(Ok(WsMessage::Close(_))) | None => break "connection closed".to_string(),
                    Some(Ok(_)) => {}
                    Some(Err(err)) => break err.to_string(),
                }
            }
        }
    };

    log::warn!("Live updates for chat {chat_id} lost: {reason}");
    let _ = events
        .send(ChatEvent::LiveUpdatesUnavailable { chat_id, reason })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use tokio::net::TcpListener;

    type ServerStream = WebSocketStream<TcpStream>;

    fn text(frame: &str) -> WsMessage {
        WsMessage::Text(frame.into())
    }

    /// Accepts one websocket client on a local port and runs `script` against it.
    async fn serve_once<F, Fut, T>(script: F) -> (String, JoinHandle<T>)
    where
        F: FnOnce(ServerStream) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            script(ws).await
        });
        (base, server)
    }

    async fn read_text(ws: &mut ServerStream) -> Option<String> {
        while let Some(frame) = ws.next().await {
            match frame.ok()? {
                WsMessage::Text(frame) => return Some(frame),
                WsMessage::Close(_) => return None,
                _ => {}
            }
        }
        None
    }

    /// Engine.IO open, then expects the namespace connect carrying the token.
    async fn accept_engine(ws: &mut ServerStream) {
        ws.send(text(r#"0{"sid":"e1","pingInterval":25000,"pingTimeout":20000}"#))
            .await
            .unwrap();
        assert_eq!(
            read_text(ws).await.as_deref(),
            Some(r#"40{"token":"tok-live"}"#)
        );
    }

    #[tokio::test]
    async fn live_connection_pongs_forwards_events_and_disconnects() {
        let (base, server) = serve_once(|mut ws| async move {
            accept_engine(&mut ws).await;
            ws.send(text(r#"40{"sid":"s1"}"#)).await.unwrap();
            ws.send(text("2")).await.unwrap();
            let pong = read_text(&mut ws).await;
            ws.send(text(
                r#"42["message",{"_id":"m1","chat":"c1","sender":"u1","content":"hi"}]"#,
            ))
            .await
            .unwrap();
            let goodbye = read_text(&mut ws).await;
            (pong, goodbye)
        })
        .await;

        let connector = SocketIoConnector::new(&base).unwrap();
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let handle = match connector.connect("tok-live", "c1", events_tx).await {
            Ok(handle) => handle,
            Err(err) => panic!("connect failed: {err}"),
        };

        let event = tokio::time::timeout(Duration::from_secs(2), events_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, ChatEvent::LiveMessage(ref m) if m.id == "m1" && m.chat_id == "c1"));

        handle.disconnect().await;
        let (pong, goodbye) = server.await.unwrap();
        assert_eq!(pong.as_deref(), Some(PONG_FRAME));
        assert_eq!(goodbye.as_deref(), Some(DISCONNECT_FRAME));
    }

    #[tokio::test]
    async fn refused_namespace_connect_is_an_auth_error() {
        let (base, server) = serve_once(|mut ws| async move {
            accept_engine(&mut ws).await;
            ws.send(text(r#"44{"message":"invalid token"}"#))
                .await
                .unwrap();
        })
        .await;

        let connector = SocketIoConnector::new(&base).unwrap();
        let (events_tx, _events_rx) = mpsc::channel(8);
        match connector.connect("tok-live", "c1", events_tx).await {
            Err(ChatError::Auth) => {}
            Err(other) => panic!("expected an auth error, got {other}"),
            Ok(_) => panic!("connection should have been refused"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn server_close_reports_live_updates_unavailable() {
        let (base, server) = serve_once(|mut ws| async move {
            accept_engine(&mut ws).await;
            ws.send(text("40")).await.unwrap();
            let _ = ws.close(None).await;
            while ws.next().await.is_some() {}
        })
        .await;

        let connector = SocketIoConnector::new(&base).unwrap();
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let _handle = match connector.connect("tok-live", "c1", events_tx).await {
            Ok(handle) => handle,
            Err(err) => panic!("connect failed: {err}"),
        };

        let event = tokio::time::timeout(Duration::from_secs(2), events_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            event,
            ChatEvent::LiveUpdatesUnavailable { ref chat_id, .. } if chat_id == "c1"
        ));
        server.await.unwrap();
    }

    #[test]
    fn decodes_engine_control_packets() {
        assert_eq!(decode_frame("2").unwrap(), EnginePacket::Ping);
        assert_eq!(decode_frame("1").unwrap(), EnginePacket::Close);
        assert!(matches!(
            decode_frame(r#"0{"sid":"abc","pingInterval":25000}"#).unwrap(),
            EnginePacket::Open(_)
        ));
        assert!(decode_frame("").is_err());
        assert!(decode_frame("9").is_err());
    }

    #[test]
    fn decodes_connect_ack_and_error() {
        assert_eq!(
            decode_frame(r#"40{"sid":"xyz"}"#).unwrap(),
            EnginePacket::Message(SocketPacket::Connect(Some(json!({ "sid": "xyz" }))))
        );
        assert_eq!(
            decode_frame("40").unwrap(),
            EnginePacket::Message(SocketPacket::Connect(None))
        );
        assert_eq!(
            decode_frame(r#"44{"message":"invalid token"}"#).unwrap(),
            EnginePacket::Message(SocketPacket::ConnectError(
                json!({ "message": "invalid token" })
            ))
        );
    }

    #[test]
    fn decodes_events_with_namespace_and_ack_id() {
        let expected = EnginePacket::Message(SocketPacket::Event {
            name: "messageDeleted".to_string(),
            payload: json!("m1"),
        });
        assert_eq!(decode_frame(r#"42["messageDeleted","m1"]"#).unwrap(), expected);
        assert_eq!(decode_frame(r#"42/chat,7["messageDeleted","m1"]"#).unwrap(), expected);
        assert!(decode_frame(r#"42{"not":"array"}"#).is_err());
    }

    #[test]
    fn connect_packet_carries_token() {
        assert_eq!(encode_connect("tok"), r#"40{"token":"tok"}"#);
    }

    #[test]
    fn maps_named_events() {
        let event = map_event(
            EVENT_MESSAGE,
            json!({ "_id": "m1", "chat": "c1", "sender": "u1", "content": "hi" }),
        )
        .unwrap();
        assert!(matches!(event, Some(ChatEvent::LiveMessage(m)) if m.chat_id == "c1"));

        let deleted = map_event(EVENT_MESSAGE_DELETED, json!({ "messageId": "m1" })).unwrap();
        assert_eq!(deleted, Some(ChatEvent::LiveMessageDeleted("m1".to_string())));

        assert_eq!(map_event("typing", json!({})).unwrap(), None);
    }

    #[test]
    fn endpoint_switches_scheme_and_path() {
        assert_eq!(
            socket_endpoint("http://localhost:5000").unwrap(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_endpoint("https://chat.example.org/").unwrap(),
            "wss://chat.example.org/socket.io/?EIO=4&transport=websocket"
        );
        assert!(socket_endpoint("not a url").is_err());
    }
}
