use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::{self as axum_middleware},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::{CredentialVerifier, LoginRequest, TokenLifecycleManager};
use crate::error::ApiError;
use crate::middleware::{self, ActiveSession, SESSION_HEADER};
use crate::session::{Session, SessionStore};

/// Application version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub token_manager: Arc<TokenLifecycleManager>,
    pub verifier: Arc<CredentialVerifier>,
}

/// Health check routes (no authentication required)
pub fn health_routes() -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
}

/// Login and logout routes (no session required)
pub fn auth_routes(state: AppState) -> Router {
    Router::new()
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .with_state(state)
}

/// Routes that require a live session
pub fn session_routes(state: AppState) -> Router {
    Router::new()
        .route("/session", get(session_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ))
        .with_state(state)
}

/// GET / - Simple health check
async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Session Keeper is running",
        "version": VERSION
    }))
}

/// GET /health - Detailed health check
///
/// Returns detailed health information including timestamp.
/// This endpoint does not require authentication (for load balancers).
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION
    }))
}

/// POST /login - Verify credentials and open a session
async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    tracing::info!(email = %request.email, "Request to /login");

    let outcome = state.verifier.login(&request, Utc::now()).await.map_err(|e| {
        tracing::warn!(error = %e, "Login failed");
        ApiError::from(e)
    })?;

    let expires_at = outcome
        .tokens
        .access_token_expires_at
        .map(|t| t.timestamp_millis());
    let user = outcome.user.clone();
    let session_id = state
        .sessions
        .create(Session::new(outcome.user, outcome.tokens));

    Ok(Json(json!({
        "session_id": session_id,
        "user": user,
        "accessTokenExpiresAt": expires_at,
    })))
}

/// POST /logout - Drop the session named in `x-session-id`
async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    if let Some(id) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
        if state.sessions.remove(id.trim()) {
            tracing::info!(session_id = %id, "Signed out");
        }
    }
    StatusCode::NO_CONTENT
}

/// GET /session - Current user and token status
///
/// The session middleware has already renewed the tokens when needed.
async fn session_handler(Extension(active): Extension<ActiveSession>) -> Json<Value> {
    let tokens = &active.tokens;
    Json(json!({
        "user": active.user,
        "accessToken": tokens.access_token,
        "refreshToken": tokens.refresh_token.as_str(),
        "accessTokenExpiresAt": tokens.access_token_expires_at.map(|t| t.timestamp_millis()),
        "refreshTokenExpiresAt": tokens.refresh_token_expires_at.map(|t| t.timestamp_millis()),
        "stage": tokens.stage(),
        "degraded": tokens.refresh_token.is_consumed(),
    }))
}
