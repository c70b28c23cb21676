//! Client configuration.

use crate::multipart::DEFAULT_PIPE_CAPACITY;
use crate::protocol::constants;
use serde::Deserialize;

/// Configuration for a [`CouchClient`](super::CouchClient).
///
/// Deserializable so it can be loaded from a config file; missing fields fall
/// back to [`ClientConfig::default`].
///
/// ```
/// use couchdb_stream_http::client::ClientConfig;
///
/// let config: ClientConfig = serde_json::from_str(r#"{"request_timeout_ms": 5000}"#).unwrap();
/// assert_eq!(config.request_timeout_ms, 5000);
/// assert!(config.enable_logging);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Timeout for a whole request, including the upload body
    pub request_timeout_ms: u64,
    /// Idle connections kept per host
    pub max_idle_per_host: usize,
    /// Proxy for all requests; empty for none
    pub proxy_url: String,
    /// Product string of the User-Agent header
    pub user_agent: String,
    /// Product version of the User-Agent header
    pub user_agent_version: String,
    /// Chunks buffered between an upload's encoder and the request body
    pub pipe_capacity: usize,
    /// Emit request and upload diagnostics through `tracing`
    pub enable_logging: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            request_timeout_ms: 60_000,
            max_idle_per_host: 32,
            proxy_url: String::new(),
            user_agent: constants::USER_AGENT.to_string(),
            user_agent_version: constants::VERSION.to_string(),
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
            enable_logging: true,
        }
    }
}
