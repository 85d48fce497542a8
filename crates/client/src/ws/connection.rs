//! A single realtime connection with state tracking and auto-reconnect.
//!
//! The connection runs in one tokio task. Each (re)connect performs the
//! WebSocket handshake, the Engine.IO open, the Socket.IO namespace connect
//! and then emits `authenticate`, all under the configured connect timeout.

use std::sync::Arc;
use std::time::Duration;

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use rideshare_shared::{
    ClientEvent, EnginePacket, Handshake, ProtocolError, ServerEvent, SocketPacket,
    DEFAULT_NAMESPACE,
};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::config::ConnectionSettings;
use crate::error::RealtimeError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state for the realtime channel
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ConnectionState::Failed { .. })
    }
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts (0 = infinite)
    pub max_attempts: u32,
    /// Initial delay in milliseconds
    pub initial_delay_ms: u32,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u32,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f32,
    /// Random spread applied to each delay, as a fraction (0.2 = ±20%)
    pub jitter: f32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 1.5,
            jitter: 0.2,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number, before jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> u32 {
        let delay = self.initial_delay_ms as f32 * self.backoff_multiplier.powi(attempt as i32);
        (delay as u32).min(self.max_delay_ms)
    }

    /// Delay for `attempt` with jitter applied.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt) as f32;
        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = if jitter > 0.0 {
            rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter))
        } else {
            1.0
        };
        Duration::from_millis((base * factor) as u64)
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt <= self.max_attempts
    }
}

/// Handle for emitting events through a realtime connection
#[derive(Clone)]
pub struct RealtimeHandle {
    sender: UnboundedSender<ClientEvent>,
    pub user_id: String,
}

impl std::fmt::Debug for RealtimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeHandle")
            .field("user_id", &self.user_id)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl RealtimeHandle {
    /// Queue an event. Events queued while disconnected go out after the
    /// next successful connect.
    pub fn emit(&self, event: ClientEvent) -> Result<(), RealtimeError> {
        tracing::debug!(user_id = %self.user_id, event = event.name(), "emit");
        self.sender
            .unbounded_send(event)
            .map_err(|_| RealtimeError::Closed)
    }

    pub fn emit_custom(&self, name: &str, payload: Value) -> Result<(), RealtimeError> {
        self.emit(ClientEvent::Custom {
            name: name.to_string(),
            payload,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

pub(crate) type EventSink = Arc<dyn Fn(ServerEvent) + Send + Sync>;

/// A running connection task.
pub(crate) struct RealtimeConnection {
    handle: RealtimeHandle,
    state: watch::Receiver<ConnectionState>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RealtimeConnection {
    /// Start the connection loop. Must be called inside a tokio runtime.
    pub(crate) fn spawn(
        settings: ConnectionSettings,
        socket_url: String,
        user_id: String,
        on_event: EventSink,
    ) -> Self {
        let (sender, commands) = unbounded();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let handle = RealtimeHandle {
            sender,
            user_id: user_id.clone(),
        };

        let task = tokio::spawn(connection_loop(ConnectionTask {
            settings,
            socket_url,
            user_id,
            on_event,
            commands,
            state: state_tx,
            shutdown: shutdown_rx,
        }));

        Self {
            handle,
            state,
            shutdown,
            task,
        }
    }

    pub(crate) fn handle(&self) -> RealtimeHandle {
        self.handle.clone()
    }

    pub(crate) fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub(crate) fn current_state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Ask the task to disconnect. It sends a namespace disconnect if
    /// connected; the task is aborted if it does not stop promptly.
    pub(crate) fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let task = self.task;
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let abort = task.abort_handle();
                if tokio::time::timeout(Duration::from_secs(2), task).await.is_err() {
                    abort.abort();
                }
            });
        } else {
            task.abort();
        }
    }
}

struct ConnectionTask {
    settings: ConnectionSettings,
    socket_url: String,
    user_id: String,
    on_event: EventSink,
    commands: UnboundedReceiver<ClientEvent>,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Receiver<bool>,
}

enum SessionEnd {
    Shutdown,
    Lost(String),
}

async fn connection_loop(mut ctx: ConnectionTask) {
    let reconnect = ctx.settings.reconnect.clone();
    let mut attempt = 0u32;

    loop {
        if *ctx.shutdown.borrow() {
            break;
        }

        if attempt == 0 {
            ctx.state.send_replace(ConnectionState::Connecting);
        } else {
            ctx.state.send_replace(ConnectionState::Reconnecting { attempt });
        }

        let opened = tokio::select! {
            _ = ctx.shutdown.changed() => break,
            opened = tokio::time::timeout(
                ctx.settings.connect_timeout,
                open_session(&ctx.socket_url, &ctx.user_id),
            ) => opened,
        };

        let failure = match opened {
            Ok(Ok((socket, handshake))) => {
                attempt = 0;
                ctx.state.send_replace(ConnectionState::Connected);
                tracing::info!(user_id = %ctx.user_id, sid = %handshake.sid, "realtime channel connected");

                match drive(&mut ctx, socket, &handshake).await {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Lost(reason) => reason,
                }
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => RealtimeError::Timeout(ctx.settings.connect_timeout.as_millis() as u64).to_string(),
        };

        attempt += 1;
        if !reconnect.allows(attempt) {
            let reason = format!(
                "Max reconnect attempts ({}) exceeded: {failure}",
                reconnect.max_attempts
            );
            tracing::error!(user_id = %ctx.user_id, %reason, "realtime channel failed");
            ctx.state.send_replace(ConnectionState::Failed { reason });
            return;
        }

        let delay = reconnect.jittered_delay(attempt - 1);
        tracing::warn!(
            user_id = %ctx.user_id,
            error = %failure,
            delay_ms = delay.as_millis() as u64,
            attempt,
            "realtime channel down, reconnecting"
        );
        ctx.state.send_replace(ConnectionState::Reconnecting { attempt });

        tokio::select! {
            _ = ctx.shutdown.changed() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    ctx.state.send_replace(ConnectionState::Disconnected);
    tracing::info!(user_id = %ctx.user_id, "realtime channel closed");
}

/// Next text frame, skipping transport-level control frames.
async fn next_text(socket: &mut Socket) -> Result<String, RealtimeError> {
    while let Some(frame) = socket.next().await {
        match frame {
            Ok(Message::Text(text)) => return Ok(text.as_str().to_string()),
            Ok(Message::Close(_)) => return Err(RealtimeError::Closed),
            Ok(_) => continue,
            Err(e) => return Err(RealtimeError::Transport(e.to_string())),
        }
    }
    Err(RealtimeError::Closed)
}

async fn send_frame(socket: &mut Socket, frame: String) -> Result<(), RealtimeError> {
    socket
        .send(Message::text(frame))
        .await
        .map_err(|e| RealtimeError::Transport(e.to_string()))
}

/// Open the transport and join the default namespace as `user_id`.
async fn open_session(url: &str, user_id: &str) -> Result<(Socket, Handshake), RealtimeError> {
    let (mut socket, _response) = connect_async(url)
        .await
        .map_err(|e| RealtimeError::Transport(e.to_string()))?;

    let handshake = loop {
        match EnginePacket::decode(&next_text(&mut socket).await?)? {
            EnginePacket::Open(handshake) => break handshake,
            EnginePacket::Noop => continue,
            other => {
                return Err(ProtocolError::Malformed(format!(
                    "expected open packet, got {other:?}"
                ))
                .into())
            }
        }
    };
    tracing::debug!(?handshake, "engine open");

    send_frame(&mut socket, SocketPacket::connect(DEFAULT_NAMESPACE).to_frame()).await?;

    loop {
        match EnginePacket::decode(&next_text(&mut socket).await?)? {
            EnginePacket::Ping(data) => send_frame(&mut socket, EnginePacket::Pong(data).encode()).await?,
            EnginePacket::Message(body) => match SocketPacket::decode(&body)? {
                SocketPacket::Connect { .. } => break,
                SocketPacket::ConnectError { data, .. } => {
                    let reason = data
                        .as_ref()
                        .and_then(|d| d.get("message"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| "namespace connect refused".to_string());
                    return Err(RealtimeError::Rejected(reason));
                }
                other => tracing::debug!(packet = ?other, "ignoring packet before connect"),
            },
            EnginePacket::Close => return Err(RealtimeError::Closed),
            _ => {}
        }
    }

    let auth = ClientEvent::Authenticate {
        user_id: user_id.to_string(),
    };
    send_frame(&mut socket, auth.to_packet().to_frame()).await?;
    tracing::debug!(%user_id, "authenticate sent");

    Ok((socket, handshake))
}

/// Pump frames until shutdown or the connection is lost.
async fn drive(ctx: &mut ConnectionTask, socket: Socket, handshake: &Handshake) -> SessionEnd {
    let (mut write, mut read) = socket.split();
    let window = Duration::from_millis(handshake.liveness_window_ms());
    let mut deadline = Instant::now() + window;

    loop {
        tokio::select! {
            _ = ctx.shutdown.changed() => {
                let bye = SocketPacket::Disconnect { namespace: DEFAULT_NAMESPACE.to_string() };
                let _ = write.send(Message::text(bye.to_frame())).await;
                let _ = write.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
            _ = tokio::time::sleep_until(deadline) => {
                return SessionEnd::Lost(format!("no ping within {} ms", window.as_millis()));
            }
            Some(event) = ctx.commands.next() => {
                let frame = event.to_packet().to_frame();
                tracing::debug!(%frame, "sending");
                if let Err(e) = write.send(Message::text(frame)).await {
                    return SessionEnd::Lost(e.to_string());
                }
            }
            frame = read.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Lost("closed by server".to_string()),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                };

                let packet = match EnginePacket::decode(text.as_str()) {
                    Ok(packet) => packet,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping undecodable frame");
                        continue;
                    }
                };

                match packet {
                    EnginePacket::Ping(data) => {
                        deadline = Instant::now() + window;
                        if let Err(e) = write.send(Message::text(EnginePacket::Pong(data).encode())).await {
                            return SessionEnd::Lost(e.to_string());
                        }
                    }
                    EnginePacket::Message(body) => {
                        if let Some(end) = handle_socket_packet(ctx, &body) {
                            return end;
                        }
                    }
                    EnginePacket::Close => return SessionEnd::Lost("engine close".to_string()),
                    EnginePacket::Open(_) | EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
                }
            }
        }
    }
}

fn handle_socket_packet(ctx: &ConnectionTask, body: &str) -> Option<SessionEnd> {
    let packet = match SocketPacket::decode(body) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed socket packet");
            return None;
        }
    };

    if packet.namespace() != DEFAULT_NAMESPACE {
        tracing::debug!(namespace = packet.namespace(), "ignoring packet for another namespace");
        return None;
    }

    match packet {
        SocketPacket::Event { name, args, .. } => match ServerEvent::parse(&name, args) {
            Ok(event) => (ctx.on_event)(event),
            Err(e) => tracing::warn!(event = %name, error = %e, "dropping malformed event"),
        },
        SocketPacket::Disconnect { .. } => {
            return Some(SessionEnd::Lost("server disconnected the namespace".to_string()))
        }
        SocketPacket::ConnectError { data, .. } => {
            return Some(SessionEnd::Lost(format!("connect error: {data:?}")))
        }
        SocketPacket::Connect { .. } | SocketPacket::Ack { .. } => {}
    }
    None
}
