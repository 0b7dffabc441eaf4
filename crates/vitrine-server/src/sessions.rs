use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "vitrine_session";

#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub is_admin: bool,
    expires_at: Instant,
}

/// In-process session store. Tokens are unguessable sha256 digests; expired
/// sessions are evicted lazily on lookup.
pub struct SessionStore {
    ttl: Duration,
    seed: AtomicU64,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seed: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn create(&self, username: &str) -> String {
        let token = self.mint_token(username);
        let session = Session {
            username: username.to_string(),
            is_admin: true,
            expires_at: Instant::now() + self.ttl,
        };
        self.sessions.lock().await.insert(token.clone(), session);
        token
    }

    pub async fn get(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(token) {
            Some(session) if session.expires_at > Instant::now() => Some(session.clone()),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    pub async fn remove(&self, token: &str) -> Option<Session> {
        self.sessions.lock().await.remove(token)
    }

    fn mint_token(&self, username: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        let counter = self.seed.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(nanos.to_le_bytes());
        hasher.update(counter.to_le_bytes());
        hasher.update(std::process::id().to_le_bytes());
        hasher.update(username.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Extracts the session token from the `cookie` request header.
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("cookie")?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// `Set-Cookie` value establishing a session for `max_age`.
#[must_use]
pub fn session_cookie(token: &str, max_age: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        max_age.as_secs()
    )
}

/// `Set-Cookie` value clearing the session cookie.
#[must_use]
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax")
}
