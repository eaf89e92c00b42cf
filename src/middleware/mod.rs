// Session and CORS middleware

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{TokenState, UserInfo};
use crate::error::ApiError;
use crate::routes::AppState;

/// Header carrying the session id issued by `POST /login`
pub const SESSION_HEADER: &str = "x-session-id";

/// Session resolved for the current request, inserted as a request extension
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub id: String,
    pub user: UserInfo,
    pub tokens: TokenState,
}

/// Read the session id from the request headers
pub fn session_id<B>(request: &Request<B>) -> Option<String> {
    request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Session middleware
///
/// Runs the token lifecycle manager for the session named in `x-session-id`
/// while holding that session's lock, then stores the new token state.
/// A terminal token state signs the user out: the session is dropped and
/// the request is rejected with `RefreshAccessTokenError`.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(id) = session_id(&request) else {
        tracing::debug!(
            "{} {} without session id",
            request.method(),
            request.uri().path()
        );
        return Err(ApiError::AuthError("Missing session id".to_string()));
    };

    let Some(handle) = state.sessions.get(&id) else {
        tracing::warn!(session_id = %id, "Access attempt with unknown session");
        return Err(ApiError::AuthError("Unknown or expired session".to_string()));
    };

    let active = {
        let mut session = handle.lock().await;
        let resolved = state
            .token_manager
            .resolve(session.tokens.clone(), Utc::now())
            .await;
        session.tokens = resolved;

        if let Some(error) = session.tokens.error {
            drop(session);
            state.sessions.remove(&id);
            tracing::warn!(session_id = %id, ?error, "Forcing sign-out");
            return Err(ApiError::SessionExpired(error));
        }

        ActiveSession {
            id,
            user: session.user.clone(),
            tokens: session.tokens.clone(),
        }
    };

    request.extensions_mut().insert(active);
    Ok(next.run(request).await)
}

/// Create CORS middleware layer
///
/// Configures CORS to allow all origins, methods, and headers.
/// Handles OPTIONS preflight requests automatically.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
