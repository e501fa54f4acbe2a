use std::sync::Arc;
use std::time::Duration;

use super::{generate_token, SessionUser};
use crate::store::{get_json, set_json_ex, KeyValueStore, StoreError};

const SESSION_PREFIX: &str = "session:";

/// Server-side sessions keyed by opaque token.
///
/// A session's presence in the store is the only proof of validity; expiry
/// is left entirely to the store TTL.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(token: &str) -> String {
        format!("{}{}", SESSION_PREFIX, token)
    }

    pub async fn create_session(&self, user: &SessionUser) -> Result<String, StoreError> {
        let token = generate_token();
        set_json_ex(self.store.as_ref(), &Self::key(&token), user, self.ttl).await?;
        Ok(token)
    }

    /// Missing or expired sessions are `Ok(None)`, not errors
    pub async fn get_session(&self, token: &str) -> Result<Option<SessionUser>, StoreError> {
        if token.is_empty() {
            return Ok(None);
        }
        get_json(self.store.as_ref(), &Self::key(token)).await
    }

    pub async fn destroy_session(&self, token: &str) -> Result<(), StoreError> {
        self.store.delete(&Self::key(token)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::store::MemoryStore;

    fn snapshot() -> SessionUser {
        SessionUser {
            user_id: "user-1".to_string(),
            name: "Hanako".to_string(),
            email: "hanako@example.jp".to_string(),
            role: Role::Editor,
        }
    }

    fn sessions() -> SessionStore {
        SessionStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(86_400))
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_lives_until_ttl() {
        let sessions = sessions();
        let token = sessions.create_session(&snapshot()).await.unwrap();

        tokio::time::advance(Duration::from_secs(86_399)).await;
        assert_eq!(sessions.get_session(&token).await.unwrap(), Some(snapshot()));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(sessions.get_session(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_destroy_session() {
        let sessions = sessions();
        let token = sessions.create_session(&snapshot()).await.unwrap();

        sessions.destroy_session(&token).await.unwrap();
        assert_eq!(sessions.get_session(&token).await.unwrap(), None);

        // Destroying twice is not an error
        sessions.destroy_session(&token).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_and_empty_tokens_are_absent() {
        let sessions = sessions();
        assert_eq!(sessions.get_session("nope").await.unwrap(), None);
        assert_eq!(sessions.get_session("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_each_login_gets_a_distinct_token() {
        let sessions = sessions();
        let a = sessions.create_session(&snapshot()).await.unwrap();
        let b = sessions.create_session(&snapshot()).await.unwrap();
        assert_ne!(a, b);

        sessions.destroy_session(&a).await.unwrap();
        assert!(sessions.get_session(&b).await.unwrap().is_some());
    }
}
