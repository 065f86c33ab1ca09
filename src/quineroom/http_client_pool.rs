//! HTTP Client Pool for maintaining persistent connections.
//!
//! Every agent in a room usually talks to the same OpenAI-compatible endpoint, so the
//! transport is shared per base URL: one `reqwest::Client` (and one connection pool) per
//! endpoint, created on first use and reused by chat and embedding calls alike.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use reqwest;
use std::time::Duration;

use crate::quineroom::client_wrapper::ClientError;

/// Global cache of HTTP clients indexed by base URL.
static CLIENT_POOL: Lazy<DashMap<String, reqwest::Client>> = Lazy::new(DashMap::new);

/// Creates or retrieves a shared HTTP client for the given base URL.
///
/// Request timeouts are not baked into the pooled client; callers set them per request so
/// that chat and embedding calls can use different bounds.
pub fn get_or_create_client(base_url: &str) -> Result<reqwest::Client, ClientError> {
    if let Some(client) = CLIENT_POOL.get(base_url) {
        return Ok(client.clone());
    }
    let client = create_pooled_client()?;
    Ok(CLIENT_POOL
        .entry(base_url.to_string())
        .or_insert(client)
        .clone())
}

/// Creates a new reqwest client with connection pooling settings.
///
/// - `pool_max_idle_per_host(10)`: the room issues one request at a time
/// - `pool_idle_timeout(90s)`: keeps connections alive between turns
/// - `tcp_keepalive(60s)`
/// - `connect_timeout(30s)`
fn create_pooled_client() -> Result<reqwest::Client, ClientError> {
    reqwest::ClientBuilder::new()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| ClientError::Transport(format!("failed to build HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_pool_reuses_entries() {
        let url = "http://localhost:11434/v1";
        let _client1 = get_or_create_client(url).unwrap();
        let _client2 = get_or_create_client(url).unwrap();
        assert!(CLIENT_POOL.contains_key(url));

        let other = "https://api.openai.com/v1";
        let _client3 = get_or_create_client(other).unwrap();
        assert!(CLIENT_POOL.contains_key(other));
        // Can't check exact length due to parallel test execution
        assert!(CLIENT_POOL.len() >= 2);
    }
}
