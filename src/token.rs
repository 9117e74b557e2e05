use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Storage key the session token lives under by default.
pub const DEFAULT_TOKEN_KEY: &str = "auth_token";

/// Synchronous key-value storage supplied by the environment.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Source of the bearer token, consulted on every request.
pub trait TokenProvider: Send + Sync {
    fn current_token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn current_token(&self) -> Option<String> {
        self()
    }
}

/// In-process [`TokenStore`]. Clones share the same entries.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("MemoryTokenStore")
            .field("keys", &entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
    }
}

/// One named token entry inside a [`TokenStore`].
///
/// The session layer writes through [`StoredToken::set`] and
/// [`StoredToken::clear`]; the client only reads.
#[derive(Clone)]
pub struct StoredToken<S> {
    store: S,
    key: String,
}

impl<S: TokenStore> StoredToken<S> {
    /// Uses [`DEFAULT_TOKEN_KEY`].
    pub fn new(store: S) -> Self {
        Self::with_key(store, DEFAULT_TOKEN_KEY)
    }

    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn set(&self, token: &str) {
        self.store.set(&self.key, token);
    }

    pub fn clear(&self) {
        self.store.remove(&self.key);
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<S: TokenStore> TokenProvider for StoredToken<S> {
    fn current_token(&self) -> Option<String> {
        self.store
            .get(&self.key)
            .map(|token| token.trim().to_owned())
            .filter(|token| !token.is_empty())
    }
}

impl<S> fmt::Debug for StoredToken<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredToken")
            .field("key", &self.key)
            .field("token", &"<redacted>")
            .finish()
    }
}
