// In-memory session store
// Each session owns its token state behind its own lock

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::auth::{TokenState, UserInfo};

/// How long a session with no known token expiry is kept
const UNBOUNDED_SESSION_MAX_AGE_SECS: i64 = 86_400;

/// One signed-in user and their current token pair
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserInfo,
    pub tokens: TokenState,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: UserInfo, tokens: TokenState) -> Self {
        Self {
            user,
            tokens,
            created_at: Utc::now(),
        }
    }

    /// Latest instant at which some token in this session can still be used,
    /// or `None` when the backend never told us
    fn usable_until(&self) -> Option<DateTime<Utc>> {
        let tokens = &self.tokens;
        if tokens.refresh_token.is_issued() && tokens.refresh_token_expires_at.is_none() {
            return None;
        }
        [tokens.access_token_expires_at, tokens.refresh_token_expires_at]
            .into_iter()
            .flatten()
            .max()
    }

    /// Whether nothing in this session can be renewed any more
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.tokens.is_terminal() {
            return true;
        }
        let deadline = self.usable_until().or_else(|| {
            self.created_at
                .checked_add_signed(Duration::seconds(UNBOUNDED_SESSION_MAX_AGE_SECS))
        });
        deadline.is_some_and(|deadline| deadline < now)
    }
}

/// Shared handle to a single session; holding the lock serializes token renewal
pub type SessionHandle = Arc<Mutex<Session>>;

/// Session store keyed by opaque session id
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new session and return its id
    pub fn create(&self, session: Session) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions.insert(id.clone(), Arc::new(Mutex::new(session)));
        tracing::debug!(session_id = %id, active = self.sessions.len(), "Session created");
        id
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Drop a session; returns whether it existed
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            tracing::debug!(session_id = %id, "Session removed");
        }
        removed
    }

    /// Drop every expired session and return how many went.
    /// Sessions currently locked by a request are left for the next sweep.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) if session.is_expired(now) => {
                removed += 1;
                false
            }
            _ => true,
        });
        removed
    }

    /// Periodically sweep expired sessions in the background
    pub fn spawn_sweeper(&self, every: std::time::Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let removed = store.sweep_expired(Utc::now());
                if removed > 0 {
                    tracing::info!(removed, active = store.len(), "Swept expired sessions");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
