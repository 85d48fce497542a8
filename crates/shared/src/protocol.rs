//! Realtime protocol: Engine.IO v4 framing and Socket.IO v5 packets.
//!
//! The backend runs a Socket.IO server. Over the WebSocket transport every
//! text frame is one Engine.IO packet; Engine.IO `message` packets carry one
//! Socket.IO packet each.
//!
//! ```text
//! engine:  <type>[data]                       e.g. 2, 3, 40, 42["notification",{..}]
//! socket:  <type>[<namespace>,][<ack id>][json]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ProtocolError;
use crate::models::Notification;

/// Engine.IO protocol revision sent in the `EIO` query parameter.
pub const ENGINE_IO_VERSION: u8 = 4;

/// The default Socket.IO namespace.
pub const DEFAULT_NAMESPACE: &str = "/";

/// Event name the client emits after connecting.
pub const EVENT_AUTHENTICATE: &str = "authenticate";

/// Event name the server uses to push notifications.
pub const EVENT_NOTIFICATION: &str = "notification";

/// Payload of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// How long the client may go without hearing a ping before the
    /// connection is considered dead.
    pub fn liveness_window_ms(&self) -> u64 {
        self.ping_interval.saturating_add(self.ping_timeout)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let data = chars.as_str();

        match kind {
            '0' => serde_json::from_str(data)
                .map(EnginePacket::Open)
                .map_err(|e| ProtocolError::Malformed(format!("open handshake: {e}"))),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(data.to_string())),
            '3' => Ok(EnginePacket::Pong(data.to_string())),
            '4' => Ok(EnginePacket::Message(data.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            // Binary frames are base64 with a `b` prefix on polling transports only.
            'b' => Err(ProtocolError::Unsupported("binary engine packet")),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(handshake) => {
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{data}"),
            EnginePacket::Pong(data) => format!("3{data}"),
            EnginePacket::Message(data) => format!("4{data}"),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

impl SocketPacket {
    pub fn connect(namespace: &str) -> Self {
        SocketPacket::Connect {
            namespace: namespace.to_string(),
            data: None,
        }
    }

    pub fn event(name: &str, args: Vec<Value>) -> Self {
        SocketPacket::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            ack_id: None,
            name: name.to_string(),
            args,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }

    pub fn decode(body: &str) -> Result<Self, ProtocolError> {
        let mut chars = body.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let mut rest = chars.as_str();

        if matches!(kind, '5' | '6') {
            return Err(ProtocolError::Unsupported("binary socket packet"));
        }

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(idx) => {
                    let ns = &rest[..idx];
                    rest = &rest[idx + 1..];
                    ns.to_string()
                }
                None => {
                    let ns = rest.to_string();
                    rest = "";
                    ns
                }
            }
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits]
                .parse::<u64>()
                .map_err(|e| ProtocolError::Malformed(format!("ack id: {e}")))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let payload = if rest.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str::<Value>(rest)
                    .map_err(|e| ProtocolError::Malformed(format!("payload: {e}")))?,
            )
        };

        match kind {
            '0' => Ok(SocketPacket::Connect {
                namespace,
                data: payload,
            }),
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => {
                let Some(Value::Array(mut items)) = payload else {
                    return Err(ProtocolError::Malformed("event payload must be an array".into()));
                };
                if items.is_empty() {
                    return Err(ProtocolError::Malformed("event without a name".into()));
                }
                let Value::String(name) = items.remove(0) else {
                    return Err(ProtocolError::Malformed("event name must be a string".into()));
                };
                Ok(SocketPacket::Event {
                    namespace,
                    ack_id,
                    name,
                    args: items,
                })
            }
            '3' => {
                let ack_id = ack_id.ok_or_else(|| ProtocolError::Malformed("ack without id".into()))?;
                let args = match payload {
                    Some(Value::Array(items)) => items,
                    Some(other) => vec![other],
                    None => Vec::new(),
                };
                Ok(SocketPacket::Ack {
                    namespace,
                    ack_id,
                    args,
                })
            }
            '4' => Ok(SocketPacket::ConnectError {
                namespace,
                data: payload,
            }),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }

    pub fn encode(&self) -> String {
        fn prefix(kind: char, namespace: &str) -> String {
            if namespace == DEFAULT_NAMESPACE {
                kind.to_string()
            } else {
                format!("{kind}{namespace},")
            }
        }

        match self {
            SocketPacket::Connect { namespace, data } => {
                let mut out = prefix('0', namespace);
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
                out
            }
            SocketPacket::Disconnect { namespace } => prefix('1', namespace),
            SocketPacket::Event {
                namespace,
                ack_id,
                name,
                args,
            } => {
                let mut out = prefix('2', namespace);
                if let Some(id) = ack_id {
                    out.push_str(&id.to_string());
                }
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                out.push_str(&Value::Array(items).to_string());
                out
            }
            SocketPacket::Ack {
                namespace,
                ack_id,
                args,
            } => format!(
                "{}{}{}",
                prefix('3', namespace),
                ack_id,
                Value::Array(args.clone())
            ),
            SocketPacket::ConnectError { namespace, data } => {
                let mut out = prefix('4', namespace);
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
                out
            }
        }
    }

    /// Wrap this packet in an Engine.IO message frame.
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

/// Events the client emits.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Authenticate { user_id: String },
    Custom { name: String, payload: Value },
}

impl ClientEvent {
    pub fn name(&self) -> &str {
        match self {
            ClientEvent::Authenticate { .. } => EVENT_AUTHENTICATE,
            ClientEvent::Custom { name, .. } => name,
        }
    }

    pub fn to_packet(&self) -> SocketPacket {
        match self {
            ClientEvent::Authenticate { user_id } => {
                SocketPacket::event(EVENT_AUTHENTICATE, vec![json!({ "userId": user_id })])
            }
            ClientEvent::Custom { name, payload } => SocketPacket::event(name, vec![payload.clone()]),
        }
    }
}

/// Events the server pushes.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Notification(Notification),
    Other { name: String, args: Vec<Value> },
}

impl ServerEvent {
    /// Interpret a Socket.IO event. A `notification` whose payload does not
    /// parse is an error; the caller decides whether to drop it.
    pub fn parse(name: &str, mut args: Vec<Value>) -> Result<Self, ProtocolError> {
        if name != EVENT_NOTIFICATION {
            return Ok(ServerEvent::Other {
                name: name.to_string(),
                args,
            });
        }

        if args.is_empty() {
            return Err(ProtocolError::Payload {
                event: name.to_string(),
                reason: "missing payload".to_string(),
            });
        }

        serde_json::from_value(args.swap_remove(0))
            .map(ServerEvent::Notification)
            .map_err(|e| ProtocolError::Payload {
                event: name.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Check if a host is a local/development address.
pub fn is_local_address(host: &str) -> bool {
    let host_part = host.split(':').next().unwrap_or(host);
    host_part == "localhost"
        || host_part == "127.0.0.1"
        || host_part == "0.0.0.0"
        || host_part.starts_with("192.168.")
        || host_part.starts_with("10.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationKind;

    #[test]
    fn decodes_open_handshake() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        let EnginePacket::Open(handshake) = packet else {
            panic!("expected open packet");
        };
        assert_eq!(handshake.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(handshake.liveness_window_ms(), 45000);
    }

    #[test]
    fn ping_pong_and_close() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(EnginePacket::Pong(String::new()).encode(), "3");
        assert_eq!(EnginePacket::decode("1").unwrap(), EnginePacket::Close);
        assert_eq!(EnginePacket::decode(""), Err(ProtocolError::Empty));
        assert_eq!(EnginePacket::decode("9"), Err(ProtocolError::UnknownType('9')));
    }

    #[test]
    fn decodes_namespace_connect_reply() {
        let EnginePacket::Message(body) = EnginePacket::decode(r#"40{"sid":"abc"}"#).unwrap() else {
            panic!("expected message");
        };
        let packet = SocketPacket::decode(&body).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Connect {
                namespace: "/".into(),
                data: Some(json!({ "sid": "abc" })),
            }
        );
    }

    #[test]
    fn decodes_event_with_namespace_and_ack_id() {
        let packet = SocketPacket::decode(r#"2/admin,13["ride_update",{"id":1}]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                namespace: "/admin".into(),
                ack_id: Some(13),
                name: "ride_update".into(),
                args: vec![json!({ "id": 1 })],
            }
        );
        assert_eq!(packet.encode(), r#"2/admin,13["ride_update",{"id":1}]"#);
    }

    #[test]
    fn authenticate_frame_matches_socket_io_wire_format() {
        let frame = ClientEvent::Authenticate {
            user_id: "u42".into(),
        }
        .to_packet()
        .to_frame();
        assert_eq!(frame, r#"42["authenticate",{"userId":"u42"}]"#);
        assert_eq!(SocketPacket::connect("/").to_frame(), "40");
    }

    #[test]
    fn malformed_event_payloads_are_errors() {
        assert!(matches!(
            SocketPacket::decode(r#"2["notification",{"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(SocketPacket::decode("2{}"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(SocketPacket::decode("2[]"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(
            SocketPacket::decode(r#"51-["x",{"_placeholder":true,"num":0}]"#),
            Err(ProtocolError::Unsupported(_))
        ));
    }

    #[test]
    fn parses_notification_event() {
        let args = vec![json!({
            "_id": "n1",
            "type": "booking_approved",
            "title": "Approved",
            "message": "See you at 7",
            "isRead": false,
            "createdAt": "2025-03-01T10:00:00Z",
            "data": { "bookingId": "b1" }
        })];
        let ServerEvent::Notification(notification) = ServerEvent::parse("notification", args).unwrap() else {
            panic!("expected notification");
        };
        assert_eq!(notification.kind, NotificationKind::BookingApproved);
    }

    #[test]
    fn notification_with_bad_payload_is_a_payload_error() {
        let err = ServerEvent::parse("notification", vec![json!("not an object")]).unwrap_err();
        assert!(matches!(err, ProtocolError::Payload { .. }));
        assert!(ServerEvent::parse("notification", Vec::new()).is_err());
    }

    #[test]
    fn other_events_pass_through() {
        let event = ServerEvent::parse("typing", vec![json!(true)]).unwrap();
        assert_eq!(
            event,
            ServerEvent::Other {
                name: "typing".into(),
                args: vec![json!(true)],
            }
        );
    }

    #[test]
    fn local_addresses() {
        assert!(is_local_address("localhost:3000"));
        assert!(is_local_address("192.168.1.20"));
        assert!(!is_local_address("rides.example.com"));
    }
}
