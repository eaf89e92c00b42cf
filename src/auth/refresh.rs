// Token refresh endpoint client

use std::future::Future;

use reqwest::Client;
use thiserror::Error;

use super::types::{token_preview, TokenGrant};

/// Why a refresh exchange failed. The lifecycle manager treats every
/// variant the same; the split only exists for logs.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("refresh endpoint rejected the credential: {status} - {body}")]
    Rejected { status: u16, body: String },

    #[error("refresh endpoint unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("malformed refresh response: {0}")]
    Malformed(String),
}

impl RefreshError {
    /// Short label used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            RefreshError::Rejected { .. } => "rejected",
            RefreshError::Transport(e) if e.is_timeout() => "timeout",
            RefreshError::Transport(e) if e.is_connect() => "connection_failed",
            RefreshError::Transport(_) => "transport",
            RefreshError::Malformed(_) => "malformed",
        }
    }
}

/// Exchanges a refresh credential for a new token pair
pub trait TokenRefresher: Send + Sync {
    fn refresh(
        &self,
        credential: &str,
    ) -> impl Future<Output = Result<TokenGrant, RefreshError>> + Send;
}

/// Refresh client for `POST {api_url}/refresh`.
///
/// The credential goes in `Authorization: Bearer`, and the response is the
/// flat `{access_token, refresh_token, access_token_expire, refresh_token_expire}`
/// envelope with lifetimes in seconds.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    client: Client,
    url: String,
}

impl HttpTokenRefresher {
    pub fn new(client: Client, api_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/refresh", api_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, credential: &str) -> Result<TokenGrant, RefreshError> {
        tracing::debug!(
            url = %self.url,
            credential = %token_preview(credential),
            "Calling token refresh endpoint"
        );

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .bearer_auth(credential)
            .send()
            .await
            .map_err(RefreshError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let grant: TokenGrant = response
            .json()
            .await
            .map_err(|e| RefreshError::Malformed(e.to_string()))?;

        if grant.access_token.is_empty() {
            return Err(RefreshError::Malformed(
                "response does not contain access_token".to_string(),
            ));
        }

        Ok(grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_refresh_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/refresh")
            .match_header("authorization", "Bearer degraded-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "access_token": "a2",
                    "refresh_token": "r2",
                    "access_token_expire": 900,
                    "refresh_token_expire": 86400
                })
                .to_string(),
            )
            .create_async()
            .await;

        let refresher = HttpTokenRefresher::new(Client::new(), &server.url());
        let grant = refresher.refresh("degraded-token").await.unwrap();

        assert_eq!(grant.access_token, "a2");
        assert_eq!(grant.refresh_token.as_deref(), Some("r2"));
        assert_eq!(grant.access_token_expire, Some(900));
        assert_eq!(grant.refresh_token_expire, Some(86400));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/refresh")
            .with_status(401)
            .with_body("token revoked")
            .create_async()
            .await;

        let refresher = HttpTokenRefresher::new(Client::new(), &server.url());
        let err = refresher.refresh("stale").await.unwrap_err();

        match err {
            RefreshError::Rejected { status, ref body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "token revoked");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.kind(), "rejected");
    }

    #[tokio::test]
    async fn test_refresh_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/refresh")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let refresher = HttpTokenRefresher::new(Client::new(), &server.url());
        let err = refresher.refresh("t").await.unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }

    #[tokio::test]
    async fn test_refresh_missing_access_token() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/refresh")
            .with_status(200)
            .with_body(json!({"refresh_token": "r2"}).to_string())
            .create_async()
            .await;

        let refresher = HttpTokenRefresher::new(Client::new(), &server.url());
        let err = refresher.refresh("t").await.unwrap_err();
        assert!(matches!(err, RefreshError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_refresh_unreachable() {
        // Port 9 (discard) is not expected to accept HTTP connections
        let refresher = HttpTokenRefresher::new(Client::new(), "http://127.0.0.1:9");
        let err = refresher.refresh("t").await.unwrap_err();
        assert!(matches!(err, RefreshError::Transport(_)));
    }

    #[test]
    fn test_refresh_url_trailing_slash() {
        let refresher = HttpTokenRefresher::new(Client::new(), "https://api.example.com/");
        assert_eq!(refresher.url(), "https://api.example.com/refresh");
    }
}
