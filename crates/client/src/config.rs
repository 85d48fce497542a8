//! Client configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use rideshare_shared::is_local_address;
use url::Url;

use crate::center::ResponsePolicy;
use crate::error::RealtimeError;
use crate::ws::ReconnectConfig;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 20_000;

/// Settings for the realtime channel.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Origin of the Socket.IO server, e.g. `http://localhost:3000`.
    pub realtime_url: String,
    /// Bound on the WebSocket handshake plus the Engine.IO/Socket.IO open exchange.
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl ConnectionSettings {
    pub fn new(realtime_url: impl Into<String>) -> Self {
        Self {
            realtime_url: realtime_url.into(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Build the WebSocket endpoint for the Engine.IO transport.
    pub fn socket_url(&self) -> Result<String, RealtimeError> {
        socket_url(&self.realtime_url)
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub connection: ConnectionSettings,
    pub response_policy: ResponsePolicy,
    /// Storage root; `None` uses the platform config directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            connection: ConnectionSettings::default(),
            response_policy: ResponsePolicy::default(),
            data_dir: None,
        }
    }
}

impl ClientConfig {
    /// Read configuration from the environment.
    ///
    /// Environment variables:
    /// - `RIDESHARE_API_URL`: REST base (default: `http://localhost:3000/api`)
    /// - `RIDESHARE_REALTIME_URL`: Socket.IO origin (default: origin of the API URL)
    /// - `RIDESHARE_CONNECT_TIMEOUT_MS`: realtime connect timeout (default: 20000)
    /// - `RIDESHARE_RESPONSE_POLICY`: "mark_read" | "remove" | "leave" (default: "mark_read")
    /// - `RIDESHARE_DATA_DIR`: storage directory (default: platform config dir)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from an arbitrary source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_url = get("RIDESHARE_API_URL")
            .map(|raw| normalize_base_url(&raw))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let realtime_url = get("RIDESHARE_REALTIME_URL")
            .map(|raw| normalize_base_url(&raw))
            .or_else(|| origin_of(&api_url))
            .unwrap_or_else(|| "http://localhost:3000".to_string());

        let mut connection = ConnectionSettings::new(realtime_url);
        if let Some(raw) = get("RIDESHARE_CONNECT_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => connection.connect_timeout = Duration::from_millis(ms),
                _ => tracing::warn!(value = %raw, "ignoring invalid RIDESHARE_CONNECT_TIMEOUT_MS"),
            }
        }

        let response_policy = match get("RIDESHARE_RESPONSE_POLICY") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "unknown RIDESHARE_RESPONSE_POLICY, using mark_read");
                ResponsePolicy::default()
            }),
            None => ResponsePolicy::default(),
        };

        Self {
            api_url,
            connection,
            response_policy,
            data_dir: get("RIDESHARE_DATA_DIR").map(PathBuf::from),
        }
    }
}

/// Add a scheme to a bare host (http for local addresses, https otherwise)
/// and strip trailing slashes.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }
    let host = trimmed.split('/').next().unwrap_or(trimmed);
    let protocol = if is_local_address(host) { "http" } else { "https" };
    format!("{protocol}://{trimmed}")
}

/// `scheme://host[:port]` of a URL.
pub fn origin_of(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    match parsed.origin() {
        url::Origin::Tuple(..) => Some(parsed.origin().ascii_serialization()),
        url::Origin::Opaque(_) => None,
    }
}

/// Map an http(s) origin to the Engine.IO WebSocket endpoint.
pub fn socket_url(realtime_url: &str) -> Result<String, RealtimeError> {
    let invalid = |reason: String| RealtimeError::InvalidUrl {
        url: realtime_url.to_string(),
        reason,
    };

    let mut url = Url::parse(realtime_url).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid("cannot switch to a websocket scheme".to_string()))?;

    let path = format!("{}/socket.io/", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(Some(&format!(
        "EIO={}&transport=websocket",
        rideshare_shared::ENGINE_IO_VERSION
    )));
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_local_backend() {
        let config = ClientConfig::from_lookup(lookup(&[]));
        assert_eq!(config.api_url, "http://localhost:3000/api");
        assert_eq!(config.connection.realtime_url, "http://localhost:3000");
        assert_eq!(config.connection.connect_timeout, Duration::from_secs(20));
        assert_eq!(config.response_policy, ResponsePolicy::MarkRead);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn realtime_defaults_to_api_origin() {
        let config = ClientConfig::from_lookup(lookup(&[(
            "RIDESHARE_API_URL",
            "rides.example.com/api/",
        )]));
        assert_eq!(config.api_url, "https://rides.example.com/api");
        assert_eq!(config.connection.realtime_url, "https://rides.example.com");
    }

    #[test]
    fn explicit_values_win() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("RIDESHARE_REALTIME_URL", "http://127.0.0.1:4000"),
            ("RIDESHARE_CONNECT_TIMEOUT_MS", "500"),
            ("RIDESHARE_RESPONSE_POLICY", "remove"),
            ("RIDESHARE_DATA_DIR", "/tmp/rideshare"),
        ]));
        assert_eq!(config.connection.realtime_url, "http://127.0.0.1:4000");
        assert_eq!(config.connection.connect_timeout, Duration::from_millis(500));
        assert_eq!(config.response_policy, ResponsePolicy::Remove);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/rideshare")));
    }

    #[test]
    fn bad_values_fall_back() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("RIDESHARE_CONNECT_TIMEOUT_MS", "soon"),
            ("RIDESHARE_RESPONSE_POLICY", "archive"),
        ]));
        assert_eq!(config.connection.connect_timeout, Duration::from_secs(20));
        assert_eq!(config.response_policy, ResponsePolicy::MarkRead);
    }

    #[test]
    fn local_hosts_use_plain_http() {
        assert_eq!(normalize_base_url("localhost:3000"), "http://localhost:3000");
        assert_eq!(normalize_base_url("192.168.1.4:3000/api"), "http://192.168.1.4:3000/api");
        assert_eq!(normalize_base_url("api.example.com"), "https://api.example.com");
    }

    #[test]
    fn socket_url_targets_engine_io() {
        assert_eq!(
            socket_url("http://localhost:3000").unwrap(),
            "ws://localhost:3000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_url("https://rides.example.com/").unwrap(),
            "wss://rides.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert!(matches!(
            socket_url("ftp://x"),
            Err(RealtimeError::InvalidUrl { .. })
        ));
    }
}
