//! Application state shared across all request handlers.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::chat::config::ChatConfig;
use crate::chat::errors::{ChatError, ChatResult};
use crate::chat::generator::TextGenerator;
use crate::chat::ids::SessionId;
use crate::chat::store::ChatSessionStore;

/// Environment variable for the listen port.
pub const PORT_ENV: &str = "TOPIC_CHAT_PORT";
/// Environment variable bounding the number of live sessions.
pub const MAX_SESSIONS_ENV: &str = "TOPIC_CHAT_MAX_SESSIONS";
/// Environment variable enabling streamed replies.
pub const STREAMING_ENV: &str = "TOPIC_CHAT_STREAMING";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;
/// Default session capacity.
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// One session's store, locked independently of every other session.
pub type SharedStore = Arc<Mutex<ChatSessionStore>>;

/// Host settings read from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen port.
    pub port: u16,
    /// LRU capacity of the session registry.
    pub max_sessions: NonZeroUsize,
    /// Settings applied to every new session store.
    pub chat: ChatConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_sessions: NonZeroUsize::new(DEFAULT_MAX_SESSIONS).unwrap_or(NonZeroUsize::MIN),
            chat: ChatConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `TOPIC_CHAT_*` environment variables.
    ///
    /// # Errors
    /// Returns an error if a variable holds an unusable value.
    pub fn from_env() -> ChatResult<Self> {
        let mut config = Self::default();

        if let Ok(port) = std::env::var(PORT_ENV) {
            config.port = port
                .trim()
                .parse()
                .map_err(|e| ChatError::InvalidConfig(format!("{PORT_ENV}: {e}")))?;
        }
        if let Ok(max) = std::env::var(MAX_SESSIONS_ENV) {
            config.max_sessions = max
                .trim()
                .parse()
                .map_err(|e| ChatError::InvalidConfig(format!("{MAX_SESSIONS_ENV}: {e}")))?;
        }
        if let Ok(flag) = std::env::var(STREAMING_ENV) {
            config.chat.streaming = parse_flag(&flag)
                .ok_or_else(|| ChatError::InvalidConfig(format!("{STREAMING_ENV}: {flag}")))?;
        }

        config.chat.validate()?;
        Ok(config)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Shared application state.
pub struct AppState {
    generator: Arc<dyn TextGenerator>,
    chat: ChatConfig,
    sessions: Mutex<LruCache<SessionId, SharedStore>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    /// Returns an error if `chat` fails validation.
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        chat: ChatConfig,
        max_sessions: NonZeroUsize,
    ) -> ChatResult<Arc<Self>> {
        chat.validate()?;
        info!(
            "Session registry: capacity={max_sessions} generator={} streaming={}",
            generator.name(),
            chat.streaming
        );
        Ok(Arc::new(Self {
            generator,
            chat,
            sessions: Mutex::new(LruCache::new(max_sessions)),
        }))
    }

    /// The generator every session shares.
    #[must_use]
    pub fn generator(&self) -> &dyn TextGenerator {
        self.generator.as_ref()
    }

    /// Open a session with an empty store. The least recently used session
    /// is dropped when the registry is full.
    ///
    /// # Errors
    /// Returns an error if the store cannot be built.
    pub async fn create_session(&self) -> ChatResult<SessionId> {
        let store = ChatSessionStore::new(self.chat.clone(), Arc::clone(&self.generator))?;
        let id = SessionId::new();

        let mut sessions = self.sessions.lock().await;
        if let Some((evicted, _)) = sessions.push(id, Arc::new(Mutex::new(store))) {
            debug!("Session {evicted} evicted");
        }
        Ok(id)
    }

    /// Look up a session, marking it as recently used.
    pub async fn session(&self, id: &SessionId) -> Option<SharedStore> {
        self.sessions.lock().await.get(id).cloned()
    }

    /// Drop a session. Returns whether it existed.
    pub async fn remove_session(&self, id: &SessionId) -> bool {
        self.sessions.lock().await.pop(id).is_some()
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::ScriptedGenerator;

    fn state(capacity: usize) -> Option<Arc<AppState>> {
        let generator = Arc::new(ScriptedGenerator::new(Vec::new()));
        AppState::new(generator, ChatConfig::default(), NonZeroUsize::new(capacity)?).ok()
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let Some(state) = state(4) else {
            panic!("state");
        };
        let a = state.create_session().await.unwrap_or_default();
        let b = state.create_session().await.unwrap_or_default();
        assert_ne!(a, b);
        assert_eq!(state.session_count().await, 2);

        let Some(store) = state.session(&a).await else {
            panic!("session a");
        };
        assert!(store.lock().await.is_empty());

        assert!(state.remove_session(&a).await);
        assert!(!state.remove_session(&a).await);
        assert!(state.session(&a).await.is_none());
        assert!(state.session(&b).await.is_some());
    }

    #[tokio::test]
    async fn test_least_recently_used_session_is_evicted() {
        let Some(state) = state(2) else {
            panic!("state");
        };
        let a = state.create_session().await.unwrap_or_default();
        let b = state.create_session().await.unwrap_or_default();
        assert!(state.session(&a).await.is_some());

        let c = state.create_session().await.unwrap_or_default();
        assert_eq!(state.session_count().await, 2);
        assert!(state.session(&b).await.is_none());
        assert!(state.session(&a).await.is_some());
        assert!(state.session(&c).await.is_some());
    }

    #[test]
    fn test_rejects_invalid_chat_config() {
        let generator = Arc::new(ScriptedGenerator::new(Vec::new()));
        let chat = ChatConfig {
            max_input_chars: 0,
            ..ChatConfig::default()
        };
        assert!(AppState::new(generator, chat, NonZeroUsize::MIN).is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.max_sessions.get(), DEFAULT_MAX_SESSIONS);
        assert!(!config.chat.streaming);
    }
}
