use anyhow::{Context, Result};
use chrono::Duration;
use clap::Parser;

use crate::auth::{DegradedPolicy, LifecyclePolicy};

/// Upper bound for the renewal buffer (one day)
pub const MAX_RENEWAL_BUFFER_SECS: u64 = 86_400;

/// Upper bound for the degraded stand-in lifetime (thirty days)
pub const MAX_DEGRADED_LIFETIME_SECS: u64 = 2_592_000;

/// Session Keeper - login gateway with token lifecycle management
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "8000")]
    pub port: u16,

    /// Base URL of the backend exposing /login and /refresh
    #[arg(short = 'u', long, env = "API_URL")]
    pub api_url: Option<String>,

    /// Seconds before expiry at which tokens are renewed
    #[arg(long, env = "TOKEN_RENEWAL_BUFFER", default_value = "30")]
    pub renewal_buffer: u64,

    /// Lifetime in seconds of a promoted (degraded) access token
    #[arg(long, env = "DEGRADED_TOKEN_LIFETIME", default_value = "180")]
    pub degraded_lifetime: u64,

    /// What to do when the access token expires (promote, fail)
    #[arg(long, env = "DEGRADED_POLICY", default_value = "promote")]
    pub degraded_policy: String,

    /// Seconds between sweeps of expired sessions
    #[arg(long, env = "SESSION_SWEEP_INTERVAL", default_value = "60")]
    pub session_sweep_interval: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "60")]
    pub http_timeout: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Backend
    pub api_url: String,

    // Token lifecycle
    pub renewal_buffer: u64,
    pub degraded_lifetime: u64,
    pub degraded_policy: DegradedPolicy,

    // Session store
    pub session_sweep_interval: u64,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();

        let config = Config {
            server_host: args.host,
            server_port: args.port,

            api_url: parse_api_url(args.api_url)?,

            renewal_buffer: args.renewal_buffer,
            degraded_lifetime: args.degraded_lifetime,
            degraded_policy: parse_degraded_policy(&args.degraded_policy),

            session_sweep_interval: args.session_sweep_interval,

            http_max_connections: std::env::var("HTTP_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),

            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),

            http_request_timeout: args.http_timeout,

            log_level: args.log_level,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            anyhow::bail!("API_URL must be an http(s) URL: {}", self.api_url);
        }

        if self.degraded_lifetime == 0 {
            anyhow::bail!("DEGRADED_TOKEN_LIFETIME must be greater than zero");
        }

        if self.degraded_lifetime > MAX_DEGRADED_LIFETIME_SECS {
            anyhow::bail!(
                "DEGRADED_TOKEN_LIFETIME must be at most {}s, got {}",
                MAX_DEGRADED_LIFETIME_SECS,
                self.degraded_lifetime
            );
        }

        if self.renewal_buffer > MAX_RENEWAL_BUFFER_SECS {
            anyhow::bail!(
                "TOKEN_RENEWAL_BUFFER must be at most {}s, got {}",
                MAX_RENEWAL_BUFFER_SECS,
                self.renewal_buffer
            );
        }

        if self.session_sweep_interval == 0 {
            anyhow::bail!("SESSION_SWEEP_INTERVAL must be greater than zero");
        }

        Ok(())
    }

    /// Token lifecycle policy derived from this configuration
    pub fn lifecycle_policy(&self) -> Result<LifecyclePolicy> {
        Ok(LifecyclePolicy {
            renewal_buffer: seconds(self.renewal_buffer).context("TOKEN_RENEWAL_BUFFER")?,
            degraded_lifetime: seconds(self.degraded_lifetime)
                .context("DEGRADED_TOKEN_LIFETIME")?,
            degraded: self.degraded_policy,
        })
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_sweep_interval)
    }
}

fn seconds(secs: u64) -> Result<Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .with_context(|| format!("{}s is not a representable duration", secs))
}

/// Require a backend URL and drop any trailing slash
fn parse_api_url(url: Option<String>) -> Result<String> {
    url.map(|url| url.trim_end_matches('/').to_string())
        .context("API_URL is required (use -u or set API_URL env var)")
}

/// Parse degraded policy from string
fn parse_degraded_policy(s: &str) -> DegradedPolicy {
    match s.to_lowercase().as_str() {
        "fail" | "fail_immediately" | "strict" => DegradedPolicy::FailImmediately,
        _ => DegradedPolicy::Promote,
    }
}
