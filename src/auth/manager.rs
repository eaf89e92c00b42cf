use chrono::{DateTime, Duration, Utc};

use super::refresh::{HttpTokenRefresher, TokenRefresher};
use super::types::{token_preview, RefreshToken, TokenError, TokenState};

/// Default lead time before expiry at which renewal kicks in (seconds)
pub const DEFAULT_RENEWAL_BUFFER_SECS: i64 = 30;

/// Default lifetime of a promoted stand-in access token (seconds)
pub const DEFAULT_DEGRADED_LIFETIME_SECS: i64 = 180;

/// What to do when the access token runs out while a real refresh token is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegradedPolicy {
    /// Promote the refresh token to stand in as the access token
    #[default]
    Promote,

    /// Give up and force re-authentication
    FailImmediately,
}

/// Timing and fallback policy for [`TokenLifecycleManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    pub renewal_buffer: Duration,
    pub degraded_lifetime: Duration,
    pub degraded: DegradedPolicy,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            renewal_buffer: Duration::seconds(DEFAULT_RENEWAL_BUFFER_SECS),
            degraded_lifetime: Duration::seconds(DEFAULT_DEGRADED_LIFETIME_SECS),
            degraded: DegradedPolicy::Promote,
        }
    }
}

/// Token lifecycle manager
/// Decides on every session access whether the token pair is usable,
/// needs the degraded stand-in, needs a real refresh, or is dead.
///
/// The manager holds no per-session state. Callers must serialize
/// `resolve` per session: the degraded credential is single-use, so two
/// concurrent refreshes of the same session race and one of them fails.
pub struct TokenLifecycleManager<R = HttpTokenRefresher> {
    refresher: R,
    policy: LifecyclePolicy,
}

impl<R: TokenRefresher> TokenLifecycleManager<R> {
    pub fn new(refresher: R, policy: LifecyclePolicy) -> Self {
        Self { refresher, policy }
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    /// Produce the next token state for `now`.
    ///
    /// Never fails: a state that cannot be kept alive comes back with
    /// `error` set, and the caller is expected to sign the user out.
    /// Makes at most one call to the refresh endpoint and never retries.
    pub async fn resolve(&self, state: TokenState, now: DateTime<Utc>) -> TokenState {
        if let Some(error) = state.error {
            tracing::debug!(?error, "Token state is terminal, skipping renewal");
            return state;
        }

        if self.is_fresh(&state, now) {
            tracing::debug!("Access token still valid");
            return state;
        }

        self.run_cascade(state, now).await
    }

    /// Access token is present and outside the renewal buffer
    fn is_fresh(&self, state: &TokenState, now: DateTime<Utc>) -> bool {
        match (&state.access_token, state.access_token_expires_at) {
            (Some(_), Some(expires_at)) => expires_at
                .checked_sub_signed(self.policy.renewal_buffer)
                .is_some_and(|renew_at| now < renew_at),
            _ => false,
        }
    }

    async fn run_cascade(&self, state: TokenState, now: DateTime<Utc>) -> TokenState {
        if state.refresh_token.is_issued() {
            return match self.policy.degraded {
                DegradedPolicy::Promote => {
                    promote_degraded(state, now, self.policy.degraded_lifetime)
                }
                DegradedPolicy::FailImmediately => {
                    tracing::warn!("Access token expired and degraded promotion is disabled");
                    state.fail(TokenError::NoValidTokens)
                }
            };
        }

        if state.refresh_token.is_consumed() {
            if let (Some(credential), Some(expires_at)) =
                (state.access_token.clone(), state.access_token_expires_at)
            {
                let remaining = expires_at - now;
                if remaining > self.policy.renewal_buffer {
                    tracing::debug!(
                        remaining_secs = remaining.num_seconds(),
                        "Degraded token still usable, waiting for renewal threshold"
                    );
                    return state;
                }

                tracing::info!(
                    remaining_secs = remaining.num_seconds(),
                    "Degraded token near expiry, calling refresh endpoint"
                );
                return self.exchange(state, &credential, now).await;
            }
        }

        tracing::warn!(stage = ?state.stage(), "No valid tokens available for refresh");
        state.fail(TokenError::NoValidTokens)
    }

    /// Trade the degraded credential for a brand new token pair
    async fn exchange(&self, state: TokenState, credential: &str, now: DateTime<Utc>) -> TokenState {
        let grant = match self.refresher.refresh(credential).await {
            Ok(grant) => grant,
            Err(e) => {
                tracing::error!(kind = e.kind(), error = %e, "Token refresh failed");
                return state.fail(TokenError::RefreshFailed);
            }
        };

        match grant.into_state(now) {
            Ok(refreshed) => {
                tracing::info!(
                    access_token = %refreshed.access_token.as_deref().map(token_preview).unwrap_or_default(),
                    expires_at = ?refreshed.access_token_expires_at,
                    "Tokens refreshed"
                );
                refreshed
            }
            Err(e) => {
                tracing::error!(kind = "malformed", error = %e, "Token refresh failed");
                state.fail(TokenError::RefreshFailed)
            }
        }
    }
}

/// Promote the issued refresh token to stand in as the access token.
///
/// The refresh token is marked consumed and the stand-in lives for
/// `lifetime`, capped at the refresh token's own expiry. No network call.
pub fn promote_degraded(mut state: TokenState, now: DateTime<Utc>, lifetime: Duration) -> TokenState {
    let credential = match std::mem::take(&mut state.refresh_token) {
        RefreshToken::Issued(token) => token,
        other => {
            state.refresh_token = other;
            return state.fail(TokenError::NoValidTokens);
        }
    };

    let stand_in_until = now.checked_add_signed(lifetime);
    let expires_at = match (stand_in_until, state.refresh_token_expires_at) {
        (Some(until), Some(refresh_expires_at)) => until.min(refresh_expires_at),
        (Some(until), None) => until,
        (None, Some(refresh_expires_at)) => refresh_expires_at,
        (None, None) => {
            state.refresh_token = RefreshToken::Issued(credential);
            return state.fail(TokenError::NoValidTokens);
        }
    };

    tracing::info!(
        credential = %token_preview(&credential),
        expires_at = %expires_at.to_rfc3339(),
        "Access token expired, promoting refresh token to degraded stand-in"
    );

    state.access_token = Some(credential);
    state.refresh_token = RefreshToken::Consumed;
    state.access_token_expires_at = Some(expires_at);
    state.error = None;
    state
}
