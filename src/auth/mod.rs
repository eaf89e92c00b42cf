// Authentication module
// Login against the credential verifier and token lifecycle management

mod manager;
mod refresh;
mod types;
mod verifier;

pub use manager::{
    promote_degraded, DegradedPolicy, LifecyclePolicy, TokenLifecycleManager,
    DEFAULT_DEGRADED_LIFETIME_SECS, DEFAULT_RENEWAL_BUFFER_SECS,
};
pub use refresh::{HttpTokenRefresher, RefreshError, TokenRefresher};
pub use types::{
    token_preview, LifecycleStage, LifetimeOutOfRange, LoginRequest, RefreshToken, TokenError,
    TokenGrant, TokenState, UserInfo,
};
pub use verifier::{CredentialVerifier, LoginError, LoginOutcome};
