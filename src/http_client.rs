use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use crate::config::Config;

/// Build the shared HTTP client used for the login and refresh endpoints.
///
/// The request timeout here is the only deadline a refresh call gets;
/// the lifecycle manager adds none of its own.
pub fn build_client(
    max_connections: usize,
    connect_timeout: u64,
    request_timeout: u64,
) -> Result<Client> {
    Client::builder()
        .pool_max_idle_per_host(max_connections)
        .connect_timeout(Duration::from_secs(connect_timeout))
        .timeout(Duration::from_secs(request_timeout))
        .user_agent(concat!("session-keeper/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}

/// Build the shared HTTP client from configuration
pub fn from_config(config: &Config) -> Result<Client> {
    build_client(
        config.http_max_connections,
        config.http_connect_timeout,
        config.http_request_timeout,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client() {
        assert!(build_client(20, 30, 60).is_ok());
    }
}
