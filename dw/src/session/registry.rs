//! Session registry: external session id to session state
//!
//! The map is guarded by an RwLock; each session has its own Mutex, taken
//! with `try_lock` so a second in-flight request for the same session is
//! rejected instead of interleaving with the first.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use super::SessionState;

/// Shared handle to one session
pub type SharedSession = Arc<Mutex<SessionState>>;

/// Exclusive access to one session for the duration of a request
pub type SessionGuard = OwnedMutexGuard<SessionState>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("session '{0}' is busy with another request")]
    Busy(String),

    #[error("session '{0}' not found")]
    NotFound(String),
}

/// In-memory session registry
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SharedSession>>,
    max_probes: usize,
}

impl SessionRegistry {
    /// New registry; sessions it creates start with `max_probes`
    pub fn new(max_probes: usize) -> Self {
        debug!(%max_probes, "SessionRegistry::new: called");
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_probes,
        }
    }

    /// Existing session, or a fresh one registered under `id`
    pub async fn get_or_create(&self, id: &str) -> SharedSession {
        debug!(%id, "get_or_create: called");
        if let Some(session) = self.sessions.read().await.get(id) {
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                info!(%id, "get_or_create: creating session");
                Arc::new(Mutex::new(SessionState::new(id).with_max_probes(self.max_probes)))
            })
            .clone()
    }

    pub async fn get(&self, id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove a session; true when it existed
    pub async fn end(&self, id: &str) -> bool {
        debug!(%id, "end: called");
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(%id, "end: session removed");
        }
        removed
    }

    /// Lock a session for one request, creating it on first use
    pub async fn acquire(&self, id: &str) -> Result<SessionGuard, RegistryError> {
        let session = self.get_or_create(id).await;
        Self::try_lock(id, session)
    }

    /// Lock a session that must already exist
    pub async fn acquire_existing(&self, id: &str) -> Result<SessionGuard, RegistryError> {
        let session = self.get(id).await.ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        Self::try_lock(id, session)
    }

    fn try_lock(id: &str, session: SharedSession) -> Result<SessionGuard, RegistryError> {
        session.try_lock_owned().map_err(|_| {
            debug!(%id, "try_lock: session busy");
            RegistryError::Busy(id.to_string())
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(super::DEFAULT_MAX_PROBES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_returns_same_session() {
        let registry = SessionRegistry::default();

        let a = registry.get_or_create("one").await;
        a.lock().await.topic = Some("Solar".to_string());

        let b = registry.get_or_create("one").await;
        assert_eq!(b.lock().await.topic.as_deref(), Some("Solar"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_created_sessions_use_max_probes() {
        let registry = SessionRegistry::new(5);
        let session = registry.get_or_create("x").await;
        assert_eq!(session.lock().await.max_probes, 5);
    }

    #[tokio::test]
    async fn test_end_reports_existence() {
        let registry = SessionRegistry::default();
        registry.get_or_create("gone").await;

        assert!(registry.end("gone").await);
        assert!(!registry.end("gone").await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_is_rejected() {
        let registry = SessionRegistry::default();

        let guard = registry.acquire("busy").await.unwrap();
        let second = registry.acquire("busy").await;
        assert_eq!(second.unwrap_err(), RegistryError::Busy("busy".to_string()));

        // Other sessions are unaffected
        assert!(registry.acquire("other").await.is_ok());

        drop(guard);
        assert!(registry.acquire("busy").await.is_ok());
    }

    #[tokio::test]
    async fn test_acquire_existing_requires_session() {
        let registry = SessionRegistry::default();
        assert_eq!(
            registry.acquire_existing("nope").await.unwrap_err(),
            RegistryError::NotFound("nope".to_string())
        );
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_creates_single_entry() {
        let registry = Arc::new(SessionRegistry::default());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move { registry.get_or_create("shared").await }));
        }
        let sessions: Vec<SharedSession> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(registry.ids().await, vec!["shared".to_string()]);
        assert!(sessions.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
