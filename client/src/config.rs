//! Backend endpoints and loop timings.

use crate::error::{ClientError, Result};
use reqwest::Url;
use shared::{PLAYERS_TABLE, TICK_INTERVAL_MS, WRITE_INTERVAL_MS};
use std::time::Duration;

/// Realtime protocol version requested on the websocket URL.
const REALTIME_VSN: &str = "1.0.0";

/// Where the hosted table lives and how to authenticate against it.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`
    pub url: String,
    /// Public (anon) API key; row-level policies decide what it may do
    pub anon_key: String,
    pub table: String,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            table: PLAYERS_TABLE.to_string(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// REST endpoint of the players table.
    pub fn rest_endpoint(&self) -> Result<Url> {
        let raw = format!("{}/rest/v1/{}", self.base(), self.table);
        Url::parse(&raw).map_err(|e| ClientError::InvalidUrl(format!("{raw}: {e}")))
    }

    /// Websocket endpoint of the change feed, with the key and protocol version in the query.
    pub fn realtime_endpoint(&self) -> Result<Url> {
        let raw = format!("{}/realtime/v1/websocket", self.base());
        let mut url =
            Url::parse(&raw).map_err(|e| ClientError::InvalidUrl(format!("{raw}: {e}")))?;

        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(ClientError::InvalidUrl(format!(
                    "unsupported scheme {other} in {raw}"
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::InvalidUrl(raw.clone()))?;

        url.query_pairs_mut()
            .append_pair("apikey", &self.anon_key)
            .append_pair("vsn", REALTIME_VSN);

        Ok(url)
    }
}

/// Timings of the local movement loop and the change-feed connection.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub tick: Duration,
    pub write_interval: Duration,
    pub heartbeat: Duration,
    pub reconnect_delay: Duration,
    pub leave_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(TICK_INTERVAL_MS),
            write_interval: Duration::from_millis(WRITE_INTERVAL_MS),
            heartbeat: Duration::from_secs(25),
            reconnect_delay: Duration::from_secs(2),
            leave_timeout: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_endpoint() {
        let config = BackendConfig::new("https://demo.supabase.co/", "anon");
        let url = config.rest_endpoint().unwrap();
        assert_eq!(url.as_str(), "https://demo.supabase.co/rest/v1/players");
    }

    #[test]
    fn test_custom_table() {
        let config = BackendConfig::new("http://localhost:54321", "anon").with_table("arena");
        let url = config.rest_endpoint().unwrap();
        assert_eq!(url.path(), "/rest/v1/arena");
    }

    #[test]
    fn test_realtime_endpoint_uses_secure_socket_for_https() {
        let config = BackendConfig::new("https://demo.supabase.co", "anon-key");
        let url = config.realtime_endpoint().unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/realtime/v1/websocket");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("apikey".to_string(), "anon-key".to_string())));
        assert!(query.contains(&("vsn".to_string(), "1.0.0".to_string())));
    }

    #[test]
    fn test_realtime_endpoint_plain_http() {
        let config = BackendConfig::new("http://127.0.0.1:54321", "k");
        let url = config.realtime_endpoint().unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.port(), Some(54321));
    }

    #[test]
    fn test_invalid_url() {
        let config = BackendConfig::new("not a url", "k");
        assert!(matches!(
            config.rest_endpoint(),
            Err(ClientError::InvalidUrl(_))
        ));
        let config = BackendConfig::new("ftp://example.com", "k");
        assert!(matches!(
            config.realtime_endpoint(),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_default_timings() {
        let settings = SyncSettings::default();
        assert_eq!(settings.tick, Duration::from_millis(16));
        assert_eq!(settings.write_interval, Duration::from_millis(50));
    }
}
