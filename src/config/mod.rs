use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub drafts: DraftConfig,
    #[serde(default)]
    pub template: TemplateConfig,
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of the console, used to absolutize template asset links in previews
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: default_base_url(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite:./data/sees.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            redis_url: default_redis_url(),
        }
    }
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Redis
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Mark the session cookie `Secure` (enable behind HTTPS)
    #[serde(default)]
    pub secure_cookie: bool,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_reset_ttl")]
    pub reset_ttl_secs: u64,
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

impl AuthConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn reset_ttl(&self) -> Duration {
        Duration::from_secs(self.reset_ttl_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secure_cookie: false,
            session_ttl_secs: default_session_ttl(),
            reset_ttl_secs: default_reset_ttl(),
            min_password_length: default_min_password_length(),
        }
    }
}

fn default_cookie_name() -> String {
    "seesuid".to_string()
}

fn default_session_ttl() -> u64 {
    60 * 60 * 24
}

fn default_reset_ttl() -> u64 {
    60 * 30
}

fn default_min_password_length() -> usize {
    6
}

#[derive(Debug, Clone, Deserialize)]
pub struct DraftConfig {
    #[serde(default = "default_draft_ttl")]
    pub ttl_secs: u64,
}

impl DraftConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_draft_ttl(),
        }
    }
}

fn default_draft_ttl() -> u64 {
    60 * 60
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateConfig {
    /// Placeholder schema JSON overriding the embedded one
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub resource_group: String,
    #[serde(default = "default_location")]
    pub location: String,
    /// "prd" provisions Standard SKU static apps, anything else is treated as "dev"
    #[serde(default = "default_cloud_environment")]
    pub environment: String,
    #[serde(default = "default_custom_domain_delay")]
    pub custom_domain_delay_secs: u64,
}

impl CloudConfig {
    /// All credentials needed to talk to the management API are present
    pub fn is_configured(&self) -> bool {
        !self.subscription_id.is_empty()
            && !self.tenant_id.is_empty()
            && !self.client_id.is_empty()
            && !self.client_secret.is_empty()
            && !self.resource_group.is_empty()
    }

    pub fn custom_domain_delay(&self) -> Duration {
        Duration::from_secs(self.custom_domain_delay_secs)
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            subscription_id: String::new(),
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            resource_group: String::new(),
            location: default_location(),
            environment: default_cloud_environment(),
            custom_domain_delay_secs: default_custom_domain_delay(),
        }
    }
}

fn default_location() -> String {
    "japaneast".to_string()
}

fn default_cloud_environment() -> String {
    "dev".to_string()
}

fn default_custom_domain_delay() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// DATABASE_URL and REDIS_URL take precedence over the file
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                self.database.url = url;
            }
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            if !url.is_empty() {
                self.store.redis_url = url;
            }
        }
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            store: StoreConfig::default(),
            auth: AuthConfig::default(),
            drafts: DraftConfig::default(),
            template: TemplateConfig::default(),
            cloud: CloudConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_lifetimes() {
        let config = Config::default();
        assert_eq!(config.auth.session_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.auth.reset_ttl(), Duration::from_secs(1_800));
        assert_eq!(config.drafts.ttl(), Duration::from_secs(3_600));
        assert_eq!(config.auth.cookie_name, "seesuid");
        assert_eq!(config.auth.min_password_length, 6);
        assert_eq!(config.store.backend, StoreBackend::Redis);
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse(
            r#"
            [server]
            port = 8081

            [store]
            backend = "memory"

            [cloud]
            enabled = true
            environment = "prd"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.cloud.enabled);
        assert!(!config.cloud.is_configured());
        assert_eq!(config.cloud.environment, "prd");
    }

    #[test]
    fn test_parse_rejects_unknown_backend() {
        let result = Config::parse(
            r#"
            [store]
            backend = "memcached"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_example_file_parses() {
        let config = Config::parse(include_str!("../../sees.example.toml")).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.store.redis_url, "redis://localhost:6379");
        assert!(config.template.config_path.is_none());
        assert!(!config.cloud.enabled);
    }
}
