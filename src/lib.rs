pub mod api;
pub mod auth;
pub mod cli;
pub mod cloud;
pub mod config;
pub mod db;
pub mod startup;
pub mod store;
pub mod template;

pub use db::DbPool;

use auth::{CredentialManager, SessionStore};
use cloud::Provisioner;
use config::Config;
use std::sync::Arc;
use store::{DraftStore, KeyValueStore};
use template::TemplateSchema;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub store: Arc<dyn KeyValueStore>,
    pub sessions: SessionStore,
    pub credentials: CredentialManager,
    pub drafts: DraftStore,
    pub templates: TemplateSchema,
    pub provisioner: Arc<dyn Provisioner>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: DbPool,
        store: Arc<dyn KeyValueStore>,
        templates: TemplateSchema,
        provisioner: Arc<dyn Provisioner>,
    ) -> Self {
        let sessions = SessionStore::new(store.clone(), config.auth.session_ttl());
        let credentials = CredentialManager::new(
            db.clone(),
            store.clone(),
            config.auth.reset_ttl(),
            config.auth.min_password_length,
        );
        let drafts = DraftStore::new(store.clone(), config.drafts.ttl());

        Self {
            config,
            db,
            store,
            sessions,
            credentials,
            drafts,
            templates,
            provisioner,
        }
    }
}
