//! First-step form values carried between the two SEES creation screens.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{get_json, set_json_ex, KeyValueStore, StoreError};

const DRAFT_PREFIX: &str = "sees:draft:";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftInput {
    pub title: String,
    pub target_domain: String,
    pub redirect_url: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeesDraft {
    pub title: String,
    pub target_domain: String,
    pub redirect_url: String,
    pub note: Option<String>,
    pub created_at: String,
}

#[derive(Clone)]
pub struct DraftStore {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl DraftStore {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(draft_id: &str) -> String {
        format!("{}{}", DRAFT_PREFIX, draft_id)
    }

    /// Store the draft under a fresh id and return the id
    pub async fn save(&self, input: DraftInput) -> Result<String, StoreError> {
        let draft_id = uuid::Uuid::new_v4().to_string();
        let draft = SeesDraft {
            title: input.title,
            target_domain: input.target_domain,
            redirect_url: input.redirect_url,
            note: input.note.filter(|n| !n.is_empty()),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        set_json_ex(self.store.as_ref(), &Self::key(&draft_id), &draft, self.ttl).await?;
        Ok(draft_id)
    }

    pub async fn get(&self, draft_id: &str) -> Result<Option<SeesDraft>, StoreError> {
        get_json(self.store.as_ref(), &Self::key(draft_id)).await
    }

    pub async fn delete(&self, draft_id: &str) -> Result<(), StoreError> {
        self.store.delete(&Self::key(draft_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn input() -> DraftInput {
        DraftInput {
            title: "Old portal".to_string(),
            target_domain: "old.example.jp".to_string(),
            redirect_url: "https://new.example.jp/".to_string(),
            note: Some(String::new()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_draft_retrievable_until_ttl_elapses() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let drafts = DraftStore::new(store.clone(), Duration::from_secs(3600));

        let draft_id = drafts.save(input()).await.unwrap();
        assert!(uuid::Uuid::parse_str(&draft_id).is_ok());
        assert!(store
            .exists(&format!("sees:draft:{}", draft_id))
            .await
            .unwrap());

        tokio::time::advance(Duration::from_secs(3599)).await;
        let draft = drafts.get(&draft_id).await.unwrap().unwrap();
        assert_eq!(draft.title, "Old portal");
        assert_eq!(draft.target_domain, "old.example.jp");
        assert_eq!(draft.note, None);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(drafts.get(&draft_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_draft() {
        let drafts = DraftStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600));
        let draft_id = drafts.save(input()).await.unwrap();

        drafts.delete(&draft_id).await.unwrap();
        assert!(drafts.get(&draft_id).await.unwrap().is_none());
        // Second delete is harmless
        drafts.delete(&draft_id).await.unwrap();
    }
}
