// ── Runtime connection configuration ──
//
// These types describe *how* to reach an RFSight management server.
// They carry credential data and connection tuning, but never touch disk.
// The CLI constructs a `SessionConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use rfsight_api::{ReconnectPolicy, TlsMode};

use crate::error::CoreError;

/// Default cap on retained points per (device, metric) series.
pub const DEFAULT_SERIES_MAX_POINTS: usize = 120;

/// Configuration for one management-server session.
///
/// Built by the CLI, passed to [`Session`](crate::Session) -- core never
/// reads config files or the environment.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Management server base URL (e.g., `https://rfsight.local/api`).
    pub server_url: Url,
    /// Bearer/stream token, appended to the stream URL as a query
    /// parameter and sent as an `Authorization` header on REST calls.
    /// The stream connects without one if unset.
    pub token: Option<SecretString>,
    /// TLS verification strategy.
    pub tls: TlsMode,
    /// Request timeout for REST calls.
    pub timeout: Duration,
    /// Stream reconnection policy (fixed delay, optional retry bound).
    pub reconnect: ReconnectPolicy,
    /// Cap on retained points per (device, metric) time series.
    pub series_max_points: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: Url::parse("http://127.0.0.1:8000").expect("static URL"),
            token: None,
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
            series_max_points: DEFAULT_SERIES_MAX_POINTS,
        }
    }
}

impl SessionConfig {
    /// Derive the stream endpoint from the server URL: scheme mapped
    /// `http(s)` → `ws(s)`, path `/ws` at the server root.
    pub fn stream_url(&self) -> Result<Url, CoreError> {
        let scheme = match self.server_url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        let host = self.server_url.host_str().ok_or_else(|| CoreError::Config {
            message: format!("server URL has no host: {}", self.server_url),
        })?;
        let raw = match self.server_url.port() {
            Some(p) => format!("{scheme}://{host}:{p}/ws"),
            None => format!("{scheme}://{host}/ws"),
        };
        raw.parse().map_err(|e| CoreError::Config {
            message: format!("invalid stream URL {raw}: {e}"),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_maps_schemes() {
        let mut config = SessionConfig {
            server_url: "https://rfsight.local/api".parse().unwrap(),
            ..SessionConfig::default()
        };
        assert_eq!(config.stream_url().unwrap().as_str(), "wss://rfsight.local/ws");

        config.server_url = "http://10.0.0.5:8000/api".parse().unwrap();
        assert_eq!(config.stream_url().unwrap().as_str(), "ws://10.0.0.5:8000/ws");
    }
}
