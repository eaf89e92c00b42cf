// Token and session types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Refresh credential held alongside the access token.
///
/// Serialized as a string when issued, `null` once consumed, and omitted
/// entirely when the session never had one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RefreshToken {
    /// Real, server-issued refresh credential
    Issued(String),

    /// The credential was promoted to stand in as the access token
    Consumed,

    /// No refresh credential was ever issued
    #[default]
    NeverIssued,
}

impl RefreshToken {
    /// Wrap a refresh token returned by the backend; empty strings count as missing
    pub fn from_issued(token: Option<String>) -> Self {
        match token {
            Some(t) if !t.is_empty() => RefreshToken::Issued(t),
            _ => RefreshToken::NeverIssued,
        }
    }

    pub fn is_issued(&self) -> bool {
        matches!(self, RefreshToken::Issued(_))
    }

    pub fn is_consumed(&self) -> bool {
        matches!(self, RefreshToken::Consumed)
    }

    pub fn is_never_issued(&self) -> bool {
        matches!(self, RefreshToken::NeverIssued)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RefreshToken::Issued(t) => Some(t.as_str()),
            _ => None,
        }
    }
}

impl Serialize for RefreshToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RefreshToken::Issued(t) => serializer.serialize_str(t),
            // NeverIssued is normally skipped by the containing struct
            RefreshToken::Consumed | RefreshToken::NeverIssued => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for RefreshToken {
    // Only called when the key is present; a missing key falls back to Default (NeverIssued)
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<String>::deserialize(deserializer)? {
            Some(t) => RefreshToken::Issued(t),
            None => RefreshToken::Consumed,
        })
    }
}

/// Terminal failure tag carried by a [`TokenState`]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenError {
    /// Refresh endpoint rejected the credential or could not be reached
    #[error("token refresh failed")]
    RefreshFailed,

    /// Neither a refresh credential nor a usable access token expiry exists
    #[error("no valid tokens available for refresh")]
    NoValidTokens,
}

impl TokenError {
    /// Tag the session layer reports when it forces sign-out
    pub const SIGN_OUT_SIGNAL: &'static str = "RefreshAccessTokenError";
}

/// Coarse lifecycle stage of a token state, mostly for logging and views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    Unauthenticated,
    Active,
    Degraded,
    Error,
}

/// Token pair tracked for one session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default, skip_serializing_if = "RefreshToken::is_never_issued")]
    pub refresh_token: RefreshToken,

    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_token_expires_at: Option<DateTime<Utc>>,

    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_token_expires_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TokenError>,
}

impl TokenState {
    /// Mark the state as terminally failed, leaving the tokens untouched
    pub fn fail(mut self, error: TokenError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.error.is_some()
    }

    pub fn stage(&self) -> LifecycleStage {
        if self.error.is_some() {
            LifecycleStage::Error
        } else if self.refresh_token.is_consumed() {
            LifecycleStage::Degraded
        } else if self.access_token.is_some() {
            LifecycleStage::Active
        } else {
            LifecycleStage::Unauthenticated
        }
    }
}

/// Token lifetimes as returned by the login and refresh endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenGrant {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub access_token_expire: Option<i64>,
    /// Refresh token lifetime in seconds
    #[serde(default)]
    pub refresh_token_expire: Option<i64>,
}

/// Lifetime from the backend that does not fit a timestamp
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("token lifetime out of range: {0}s")]
pub struct LifetimeOutOfRange(pub i64);

/// `now + secs`, or `None` when the result leaves chrono's range
fn expiry_after(now: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(secs).and_then(|d| now.checked_add_signed(d))
}

impl TokenGrant {
    /// Build a fresh ACTIVE state with expiries anchored at `now`
    pub fn into_state(self, now: DateTime<Utc>) -> Result<TokenState, LifetimeOutOfRange> {
        let anchor = |secs: Option<i64>| match secs {
            Some(s) => expiry_after(now, s).map(Some).ok_or(LifetimeOutOfRange(s)),
            None => Ok(None),
        };

        Ok(TokenState {
            access_token_expires_at: anchor(self.access_token_expire)?,
            refresh_token_expires_at: anchor(self.refresh_token_expire)?,
            access_token: Some(self.access_token),
            refresh_token: RefreshToken::from_issued(self.refresh_token),
            error: None,
        })
    }
}

/// Credential verifier login response
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub grant: TokenGrant,
    #[serde(default)]
    pub user: Option<LoginUser>,
}

/// User block of the login response; `id` may be numeric or a string
#[derive(Debug, Deserialize)]
pub struct LoginUser {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub email: Option<String>,
}

/// Authenticated user attached to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
}

impl From<LoginUser> for UserInfo {
    fn from(user: LoginUser) -> Self {
        let id = match user.id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        Self {
            id,
            email: user.email.unwrap_or_default(),
        }
    }
}

/// Login request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Short, log-safe preview of a token
pub fn token_preview(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{}...", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_refresh_token_null_and_absent_are_distinct() {
        let consumed: TokenState =
            serde_json::from_value(json!({"accessToken": "a", "refreshToken": null})).unwrap();
        assert_eq!(consumed.refresh_token, RefreshToken::Consumed);

        let never: TokenState = serde_json::from_value(json!({"accessToken": "a"})).unwrap();
        assert_eq!(never.refresh_token, RefreshToken::NeverIssued);

        let issued: TokenState =
            serde_json::from_value(json!({"refreshToken": "r1"})).unwrap();
        assert_eq!(issued.refresh_token, RefreshToken::Issued("r1".to_string()));
    }

    #[test]
    fn test_token_state_serialization_shape() {
        let state = TokenState {
            access_token: Some("r1".to_string()),
            refresh_token: RefreshToken::Consumed,
            access_token_expires_at: Some(at(1_700_000_180_000)),
            refresh_token_expires_at: None,
            error: None,
        };

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            json!({
                "accessToken": "r1",
                "refreshToken": null,
                "accessTokenExpiresAt": 1_700_000_180_000_i64
            })
        );

        let back: TokenState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_never_issued_is_omitted() {
        let value = serde_json::to_value(TokenState::default()).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn test_error_tag_serialization() {
        let state = TokenState::default().fail(TokenError::RefreshFailed);
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["error"], "RefreshFailed");
        assert!(state.is_terminal());
        assert_eq!(state.stage(), LifecycleStage::Error);
    }

    #[test]
    fn test_stage_detection() {
        assert_eq!(TokenState::default().stage(), LifecycleStage::Unauthenticated);

        let active = TokenState {
            access_token: Some("a1".to_string()),
            refresh_token: RefreshToken::Issued("r1".to_string()),
            ..Default::default()
        };
        assert_eq!(active.stage(), LifecycleStage::Active);

        let degraded = TokenState {
            refresh_token: RefreshToken::Consumed,
            ..active
        };
        assert_eq!(degraded.stage(), LifecycleStage::Degraded);
    }

    #[test]
    fn test_grant_into_state() {
        let now = at(1_000_000);
        let grant = TokenGrant {
            access_token: "a1".to_string(),
            refresh_token: Some("r1".to_string()),
            access_token_expire: Some(60),
            refresh_token_expire: Some(600),
        };

        let state = grant.into_state(now).unwrap();
        assert_eq!(state.access_token.as_deref(), Some("a1"));
        assert_eq!(state.refresh_token.as_str(), Some("r1"));
        assert_eq!(state.access_token_expires_at, Some(at(1_060_000)));
        assert_eq!(state.refresh_token_expires_at, Some(at(1_600_000)));
        assert_eq!(state.error, None);
    }

    #[test]
    fn test_grant_with_empty_refresh_token() {
        let grant = TokenGrant {
            access_token: "a1".to_string(),
            refresh_token: Some(String::new()),
            ..Default::default()
        };
        let state = grant.into_state(Utc::now()).unwrap();
        assert_eq!(state.refresh_token, RefreshToken::NeverIssued);
        assert_eq!(state.access_token_expires_at, None);
    }

    #[test]
    fn test_grant_with_out_of_range_lifetime() {
        let now = at(1_000_000);
        let huge = TokenGrant {
            access_token: "a1".to_string(),
            access_token_expire: Some(1_000_000_000_000_000),
            ..Default::default()
        };
        assert_eq!(
            huge.into_state(now).unwrap_err(),
            LifetimeOutOfRange(1_000_000_000_000_000)
        );

        let negative = TokenGrant {
            access_token: "a1".to_string(),
            refresh_token_expire: Some(i64::MIN),
            ..Default::default()
        };
        assert!(negative.into_state(now).is_err());

        // Small negative lifetimes are representable and simply already expired
        let expired = TokenGrant {
            access_token: "a1".to_string(),
            access_token_expire: Some(-60),
            ..Default::default()
        };
        assert_eq!(
            expired.into_state(now).unwrap().access_token_expires_at,
            Some(at(940_000))
        );
    }

    #[test]
    fn test_expiry_after_bounds() {
        assert_eq!(expiry_after(at(0), 1), Some(at(1_000)));
        assert_eq!(expiry_after(at(0), i64::MAX), None);
        assert_eq!(expiry_after(Utc::now(), 10_000_000_000_000), None);
    }

    #[test]
    fn test_user_id_normalization() {
        let numeric: LoginUser =
            serde_json::from_value(json!({"id": 42, "email": "omar@gmail.com"})).unwrap();
        assert_eq!(UserInfo::from(numeric).id, "42");

        let text: LoginUser = serde_json::from_value(json!({"id": "u-7"})).unwrap();
        let user = UserInfo::from(text);
        assert_eq!(user.id, "u-7");
        assert_eq!(user.email, "");
    }

    #[test]
    fn test_token_preview() {
        assert_eq!(token_preview("abcdefghijkl"), "abcdefgh...");
        assert_eq!(token_preview("abc"), "abc...");
    }
}
