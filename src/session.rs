use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::convert::Infallible;
use uuid::Uuid;

/// Name of the cookie that carries the session token.
pub const SESSION_COOKIE: &str = "sessionid";

/// Sessions live for two weeks from their last (re)issue.
pub const SESSION_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

// Expired entries are swept once the store grows past this size.
const MAX_SESSIONS: usize = 10_000;

// --- Session State ---

/// SessionData
///
/// Server-side state bound to one session token: the logged-in account (if
/// any), queued one-shot notices and the expiry instant.
#[derive(Debug, Clone)]
pub struct SessionData {
    pub user_id: Option<i64>,
    // Messages queued for the next page view, drained on read.
    pub notices: Vec<String>,
    pub expires_at: SystemTime,
}

impl SessionData {
    pub fn new() -> Self {
        Self {
            user_id: None,
            notices: Vec::new(),
            expires_at: SystemTime::now() + SESSION_TTL,
        }
    }

    /// for_user
    ///
    /// A fresh session already bound to `user_id`, as minted on login and
    /// registration.
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::new()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > SystemTime::now()
    }
}

impl Default for SessionData {
    fn default() -> Self {
        Self::new()
    }
}

/// new_token
///
/// Mints an unguessable session token. Tokens are opaque to clients and only
/// meaningful as keys into the store.
pub fn new_token() -> String {
    Uuid::new_v4().to_string()
}

// --- Store Abstraction ---

/// SessionStore
///
/// Defines the interface for session persistence. Handlers and middleware
/// depend on this trait rather than a concrete store, so tests can inspect
/// and seed sessions directly.
#[async_trait]
pub trait SessionStore {
    /// Returns the live session for `token`, or `None` when the token is
    /// unknown or the session has expired.
    async fn load(&self, token: &str) -> Option<SessionData>;

    /// Stores `data` under `token`, replacing any previous session.
    async fn save(&self, token: &str, data: SessionData);

    /// Drops the session for `token`. Unknown tokens are ignored.
    async fn remove(&self, token: &str);

    /// Queues a one-shot notice on the session for `token`. A missing
    /// session swallows the notice.
    async fn push_notice(&self, token: &str, notice: &str);

    /// Drains and returns all queued notices for `token`.
    async fn take_notices(&self, token: &str) -> Vec<String>;
}

/// Type alias for the dynamic, shareable session store.
pub type SessionStoreState = std::sync::Arc<dyn SessionStore + Send + Sync>;

// --- In-Memory Store ---

/// MemorySessionStore
///
/// Process-local session store backed by a read-write lock around a hash
/// map. Lock poisoning is recovered from rather than propagated, since
/// session state stays usable even if a holder panicked.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionData>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries, expired ones included until the next sweep.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, token: &str) -> Option<SessionData> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(token).filter(|s| s.is_valid()).cloned()
    }

    async fn save(&self, token: &str, data: SessionData) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        // Sweep expired sessions lazily instead of running a reaper task.
        if sessions.len() >= MAX_SESSIONS {
            sessions.retain(|_, s| s.is_valid());
        }
        sessions.insert(token.to_string(), data);
    }

    async fn remove(&self, token: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(token);
    }

    async fn push_notice(&self, token: &str, notice: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = sessions.get_mut(token).filter(|s| s.is_valid()) {
            session.notices.push(notice.to_string());
        }
    }

    async fn take_notices(&self, token: &str) -> Vec<String> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        match sessions.get_mut(token).filter(|s| s.is_valid()) {
            Some(session) => std::mem::take(&mut session.notices),
            None => Vec::new(),
        }
    }
}

// --- Cookie Plumbing ---

/// cookie_token
///
/// Extracts the session token from the request's `Cookie` header, if one is
/// present and parseable.
pub fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?.to_str().ok()?;
    for pair in header.split(';') {
        let parts: Vec<&str> = pair.trim().splitn(2, '=').collect();
        if parts.len() == 2 && parts[0] == SESSION_COOKIE {
            return Some(parts[1].to_string());
        }
    }
    None
}

/// session_cookie
///
/// `Set-Cookie` value that binds `token` to the client. HttpOnly keeps the
/// token away from page scripts; SameSite=Lax still allows top-level
/// navigation back into the site.
pub fn session_cookie(token: &str) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_TTL.as_secs()
    )
}

/// expired_cookie
///
/// `Set-Cookie` value that clears the session cookie on the client, as sent
/// on logout.
pub fn expired_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// SessionToken
///
/// Extractor for the raw session token. Infallible: requests without a
/// usable cookie simply carry `None`, which handlers treat as an anonymous
/// session.
#[derive(Debug, Clone)]
pub struct SessionToken(pub Option<String>);

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionToken(cookie_token(&parts.headers)))
    }
}
