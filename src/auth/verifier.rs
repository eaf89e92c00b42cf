// Credential verifier client (email/password login)

use chrono::{DateTime, Utc};
use reqwest::Client;
use thiserror::Error;

use super::types::{LoginRequest, LoginResponse, TokenState, UserInfo};

/// Login failures. All of them mean the user is not signed in.
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Login failed: email and password are required")]
    MissingCredentials,

    #[error("Login failed: {status} - {body}")]
    Rejected { status: u16, body: String },

    #[error("Login failed: credential verifier unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Login failed: malformed response: {0}")]
    Malformed(String),

    #[error("Login failed: response does not contain access_token")]
    MissingAccessToken,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserInfo,
    pub tokens: TokenState,
}

/// Client for `POST {api_url}/login`
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    client: Client,
    url: String,
}

impl CredentialVerifier {
    pub fn new(client: Client, api_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/login", api_url.trim_end_matches('/')),
        }
    }

    /// Exchange an email/password pair for the initial token pair
    pub async fn login(
        &self,
        request: &LoginRequest,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, LoginError> {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return Err(LoginError::MissingCredentials);
        }

        tracing::debug!(url = %self.url, email = %request.email, "Verifying credentials");

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(LoginError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Credential verifier rejected login");
            return Err(LoginError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let data: LoginResponse = response
            .json()
            .await
            .map_err(|e| LoginError::Malformed(e.to_string()))?;

        if data.grant.access_token.is_empty() {
            return Err(LoginError::MissingAccessToken);
        }

        let tokens = data
            .grant
            .into_state(now)
            .map_err(|e| LoginError::Malformed(e.to_string()))?;

        let user = data.user.map(UserInfo::from).unwrap_or_else(|| UserInfo {
            id: String::new(),
            email: request.email.clone(),
        });

        tracing::info!(user_id = %user.id, email = %user.email, "Login succeeded");

        Ok(LoginOutcome { user, tokens })
    }
}
