//! Test fixtures: a minimal Socket.IO server over tokio-tungstenite and
//! JSON builders for backend records.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rideshare_client::config::ConnectionSettings;
use rideshare_client::ws::ReconnectConfig;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub const WAIT: Duration = Duration::from_secs(5);

enum ServerCmd {
    Frame(String),
    Close,
}

/// Accepts Engine.IO WebSocket connections and records every frame the
/// client sends, tagged with the connection index.
pub struct MockSocketServer {
    url: String,
    received: mpsc::UnboundedReceiver<(usize, String)>,
    connections: Arc<Mutex<Vec<mpsc::UnboundedSender<ServerCmd>>>>,
    refusing: Arc<AtomicBool>,
}

impl MockSocketServer {
    pub async fn start() -> Self {
        Self::start_with(25_000, 20_000).await
    }

    pub async fn start_with(ping_interval: u64, ping_timeout: u64) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frames_tx, received) = mpsc::unbounded_channel();
        let connections: Arc<Mutex<Vec<mpsc::UnboundedSender<ServerCmd>>>> = Arc::default();

        let refusing = Arc::new(AtomicBool::new(false));

        let registry = connections.clone();
        let refuse = refusing.clone();
        tokio::spawn(async move {
            let mut index = 0;
            while let Ok((stream, _)) = listener.accept().await {
                if refuse.load(Ordering::SeqCst) {
                    drop(stream);
                    continue;
                }
                let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
                registry.lock().unwrap().push(cmd_tx);
                let open = format!(
                    "0{}",
                    json!({
                        "sid": format!("sid-{index}"),
                        "upgrades": [],
                        "pingInterval": ping_interval,
                        "pingTimeout": ping_timeout,
                        "maxPayload": 1_000_000
                    })
                );
                tokio::spawn(serve(stream, index, open, frames_tx.clone(), cmd_rx));
                index += 1;
            }
        });

        Self {
            url: format!("http://{addr}"),
            received,
            connections,
            refusing,
        }
    }

    /// While set, accepted sockets are closed before the WebSocket handshake
    /// and never counted as connections.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refusing.store(refuse, Ordering::SeqCst);
    }

    /// Origin to configure the client with.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    pub async fn next_frame(&mut self) -> (usize, String) {
        tokio::time::timeout(WAIT, self.received.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("server stopped")
    }

    /// Skip frames until one satisfies `pred`.
    pub async fn frame_matching(&mut self, pred: impl Fn(&str) -> bool) -> (usize, String) {
        loop {
            let (conn, frame) = self.next_frame().await;
            if pred(&frame) {
                return (conn, frame);
            }
        }
    }

    /// Wait for an `authenticate` emit and return its connection and user id.
    pub async fn expect_authenticate(&mut self) -> (usize, String) {
        let (conn, frame) = self
            .frame_matching(|f| f.starts_with("42[\"authenticate\""))
            .await;
        let args: Value = serde_json::from_str(&frame[2..]).unwrap();
        (conn, args[1]["userId"].as_str().unwrap().to_string())
    }

    /// Frames received so far without waiting.
    pub fn drain(&mut self) -> Vec<(usize, String)> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.received.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Send a raw Engine.IO frame on every open connection.
    pub fn send_raw(&self, frame: &str) {
        for conn in self.connections.lock().unwrap().iter() {
            let _ = conn.send(ServerCmd::Frame(frame.to_string()));
        }
    }

    pub fn emit(&self, event: &str, payload: Value) {
        self.send_raw(&format!("42{}", json!([event, payload])));
    }

    pub fn push_notification(&self, notification: Value) {
        self.emit("notification", notification);
    }

    /// Close every open connection from the server side.
    pub fn drop_connections(&self) {
        for conn in self.connections.lock().unwrap().iter() {
            let _ = conn.send(ServerCmd::Close);
        }
    }
}

async fn serve(
    stream: TcpStream,
    index: usize,
    open: String,
    frames: mpsc::UnboundedSender<(usize, String)>,
    mut commands: mpsc::UnboundedReceiver<ServerCmd>,
) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };
    if ws.send(Message::text(open)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let text = text.as_str().to_string();
                    if text == "40" {
                        let _ = ws.send(Message::text(format!("40{{\"sid\":\"ns-{index}\"}}"))).await;
                    }
                    let _ = frames.send((index, text));
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            command = commands.recv() => match command {
                Some(ServerCmd::Frame(frame)) => {
                    if ws.send(Message::text(frame)).await.is_err() {
                        break;
                    }
                }
                Some(ServerCmd::Close) | None => {
                    let _ = ws.close(None).await;
                    break;
                }
            },
        }
    }
}

/// Connection settings with a short reconnect delay and no jitter.
pub fn fast_settings(url: &str) -> ConnectionSettings {
    let mut settings = ConnectionSettings::new(url);
    settings.connect_timeout = Duration::from_secs(2);
    settings.reconnect = ReconnectConfig {
        max_attempts: 3,
        initial_delay_ms: 50,
        max_delay_ms: 200,
        backoff_multiplier: 1.5,
        jitter: 0.0,
    };
    settings
}

pub fn notification_json(id: &str, kind: &str, booking_id: Option<&str>) -> Value {
    let mut data = json!({});
    if let Some(booking_id) = booking_id {
        data["bookingId"] = json!(booking_id);
    }
    json!({
        "_id": id,
        "type": kind,
        "title": "New booking request",
        "message": "Ravi wants to join your ride",
        "isRead": false,
        "createdAt": "2024-05-01T09:30:00.000Z",
        "data": data
    })
}

pub fn booking_request(id: &str, booking_id: &str) -> rideshare_shared::Notification {
    serde_json::from_value(notification_json(id, "booking_request", Some(booking_id))).unwrap()
}

pub fn session_json(user_id: &str, token: &str) -> Value {
    json!({
        "message": "Login successful",
        "data": {
            "token": token,
            "user": {
                "_id": user_id,
                "name": "Asha",
                "email": "asha@example.com",
                "phone": "9800000000",
                "verificationStatus": "verified"
            }
        }
    })
}

pub fn booking_json(id: &str, ride_id: &str) -> Value {
    json!({
        "_id": id,
        "rideId": ride_id,
        "riderId": "u-rider",
        "status": "pending",
        "createdAt": "2024-05-01T09:30:00.000Z"
    })
}

/// Poll `check` until it holds or the wait runs out.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
