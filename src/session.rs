//! Per-client key/value session state.
//!
//! Handlers never see the backing store directly: the session middleware
//! resolves the cookie into a [`Session`] and puts it in the request
//! extensions.

use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "taskpad_session";

pub trait SessionStore: Send + Sync {
    /// Whether the session is live. A live session counts as active again.
    fn touch(&self, session_id: &str) -> bool;
    fn get(&self, session_id: &str, key: &str) -> Option<Value>;
    fn set(&self, session_id: &str, key: &str, value: Value);
    fn delete(&self, session_id: &str, key: &str);
}

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

struct Entry {
    data: Map<String, Value>,
    last_seen: Instant,
}

impl Entry {
    fn new() -> Self {
        Entry {
            data: Map::new(),
            last_seen: Instant::now(),
        }
    }
}

/// Sessions expire after `idle_timeout` without a request, and at most
/// `max_sessions` are held at once. Keys keep insertion order.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Entry>>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::with_limits(DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_SESSIONS)
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(idle_timeout: Duration, max_sessions: usize) -> Self {
        MemorySessionStore {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Sessions currently held, expired ones included until the next prune.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_live(&self, entry: &Entry) -> bool {
        entry.last_seen.elapsed() < self.idle_timeout
    }

    /// Drops expired sessions, then the least recently seen ones until there
    /// is room for one more.
    fn make_room(&self, sessions: &mut HashMap<String, Entry>) {
        let before = sessions.len();
        sessions.retain(|_, entry| self.is_live(entry));
        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => sessions.remove(&id),
                None => break,
            };
        }
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::debug!(pruned, live = sessions.len(), "pruned sessions");
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn touch(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write();
        let Some(entry) = sessions.get_mut(session_id) else {
            return false;
        };
        if self.is_live(entry) {
            entry.last_seen = Instant::now();
            return true;
        }
        sessions.remove(session_id);
        false
    }

    fn get(&self, session_id: &str, key: &str) -> Option<Value> {
        self.sessions
            .read()
            .get(session_id)
            .filter(|entry| self.is_live(entry))
            .and_then(|entry| entry.data.get(key).cloned())
    }

    fn set(&self, session_id: &str, key: &str, value: Value) {
        let mut sessions = self.sessions.write();
        if !sessions.contains_key(session_id) {
            self.make_room(&mut sessions);
        }
        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(Entry::new);
        entry.last_seen = Instant::now();
        entry.data.insert(key.to_string(), value);
    }

    fn delete(&self, session_id: &str, key: &str) {
        if let Some(entry) = self.sessions.write().get_mut(session_id) {
            entry.data.shift_remove(key);
        }
    }
}

#[derive(Clone)]
pub struct Session {
    id: String,
    store: Arc<dyn SessionStore>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}

impl Session {
    pub fn new(id: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Session {
            id: id.into(),
            store,
        }
    }

    /// Starts a session under a fresh random id.
    pub fn start(store: Arc<dyn SessionStore>) -> Self {
        Session::new(Uuid::new_v4().to_string(), store)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.get(&self.id, key)
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.store.set(&self.id, key, value.into());
    }

    pub fn remove(&self, key: &str) {
        self.store.delete(&self.id, key);
    }
}

/// Resolves the session cookie, or starts a new session and sets the cookie
/// on the way out. Unknown ids are not adopted.
pub async fn session_layer(
    State(store): State<Arc<dyn SessionStore>>,
    mut request: Request,
    next: Next,
) -> Response {
    let known = request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|header| cookie_value(header, SESSION_COOKIE))
        .filter(|id| store.touch(id))
        .map(str::to_string);

    let (session, is_new) = match known {
        Some(id) => (Session::new(id, store), false),
        None => (Session::start(store), true),
    };
    let cookie = format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
        session.id()
    );
    if is_new {
        tracing::debug!(session = %session.id(), "starting session");
    }
    request.extensions_mut().insert(session);

    let mut response = next.run(request).await;
    if is_new {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(err) => tracing::error!(error = %err, "building session cookie"),
        }
    }
    response
}

fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn sessions_are_isolated() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let a = Session::start(store.clone());
        let b = Session::start(store.clone());
        a.set("csrf_token", "abc");
        assert_eq!(a.get_str("csrf_token").as_deref(), Some("abc"));
        assert_eq!(b.get("csrf_token"), None);
        assert!(store.touch(a.id()));
        assert!(!store.touch(b.id()));
    }

    #[test]
    fn remove_preserves_order_of_remaining_keys() {
        let store = MemorySessionStore::new();
        store.set("s", "a", json!(1));
        store.set("s", "b", json!(2));
        store.set("s", "c", json!(3));
        store.delete("s", "a");
        let keys: Vec<String> = store.sessions.read()["s"].data.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn idle_sessions_expire_and_are_pruned() {
        let store = MemorySessionStore::with_limits(Duration::from_millis(20), 100);
        store.set("old", "csrf_token", json!("abc"));
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(store.get("old", "csrf_token"), None);
        store.set("new", "csrf_token", json!("def"));
        assert_eq!(store.len(), 1);
        assert!(!store.touch("old"));
        assert!(store.touch("new"));
    }

    #[test]
    fn touch_keeps_an_active_session_alive() {
        let store = MemorySessionStore::with_limits(Duration::from_millis(500), 100);
        store.set("s", "k", json!(1));
        for _ in 0..3 {
            std::thread::sleep(Duration::from_millis(200));
            assert!(store.touch("s"));
        }
        assert_eq!(store.get("s", "k"), Some(json!(1)));
    }

    #[test]
    fn session_count_is_capped_by_evicting_least_recent() {
        let store = MemorySessionStore::with_limits(DEFAULT_IDLE_TIMEOUT, 3);
        for id in ["a", "b", "c"] {
            store.set(id, "k", json!(id));
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(store.touch("a"));
        store.set("d", "k", json!("d"));

        assert_eq!(store.len(), 3);
        assert!(store.touch("a"));
        assert!(!store.touch("b"));
        assert!(store.touch("d"));
    }

    #[rstest]
    #[case("taskpad_session=abc", Some("abc"))]
    #[case("theme=dark; taskpad_session=abc; x=y", Some("abc"))]
    #[case("taskpad_sessionx=abc", None)]
    #[case("", None)]
    fn reads_cookie(#[case] header: &str, #[case] expected: Option<&str>) {
        assert_eq!(cookie_value(header, SESSION_COOKIE), expected);
    }
}
