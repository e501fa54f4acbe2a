//! Cloud resources backing a published notice: a public DNS zone and a static site.
//!
//! Provisioning is a secondary step. Callers log its failures and carry on;
//! the database record is never rolled back because of it.

mod azure;

pub use azure::AzureProvisioner;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::CloudConfig;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Cloud provisioning is not configured")]
    NotConfigured,

    #[error("Failed to obtain management token: {0}")]
    Auth(String),

    #[error("Request to management API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Management API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Operation did not finish in time: {0}")]
    Timeout(String),

    #[error("Unexpected management API response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedResources {
    pub static_app_name: String,
    pub static_app_url: String,
    pub dns_zone_name: String,
    pub name_servers: Vec<String>,
}

#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Whether provisioning calls will actually reach a cloud provider
    fn is_enabled(&self) -> bool;

    /// Create the DNS zone and static site for a notice
    async fn provision(
        &self,
        dns_zone: &str,
        project: &str,
    ) -> Result<ProvisionedResources, ProvisionError>;

    /// Bind `domain` to the static site. Only succeeds once DNS delegation is visible.
    async fn register_custom_domain(
        &self,
        static_app: &str,
        domain: &str,
    ) -> Result<(), ProvisionError>;

    async fn teardown(&self, dns_zone: &str, static_app: &str) -> Result<(), ProvisionError>;
}

/// Used when cloud provisioning is disabled
pub struct NoopProvisioner;

#[async_trait]
impl Provisioner for NoopProvisioner {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn provision(
        &self,
        _dns_zone: &str,
        _project: &str,
    ) -> Result<ProvisionedResources, ProvisionError> {
        Err(ProvisionError::NotConfigured)
    }

    async fn register_custom_domain(
        &self,
        _static_app: &str,
        _domain: &str,
    ) -> Result<(), ProvisionError> {
        Err(ProvisionError::NotConfigured)
    }

    async fn teardown(&self, _dns_zone: &str, _static_app: &str) -> Result<(), ProvisionError> {
        Ok(())
    }
}

pub fn create_provisioner(config: &CloudConfig) -> Arc<dyn Provisioner> {
    if !config.enabled {
        info!("Cloud provisioning disabled");
        return Arc::new(NoopProvisioner);
    }

    if !config.is_configured() {
        warn!("Cloud provisioning enabled but credentials are incomplete. Records will be created without cloud resources.");
        return Arc::new(NoopProvisioner);
    }

    info!(
        resource_group = %config.resource_group,
        environment = %config.environment,
        "Cloud provisioning enabled"
    );
    Arc::new(AzureProvisioner::new(config.clone()))
}

/// Longest project segment that keeps static app names within 40 characters
const MAX_PROJECT_LEN: usize = 17;

/// Project segment for resource names, derived from the leftmost domain label
pub fn project_name(domain: &str) -> String {
    let label = domain.trim().split('.').next().unwrap_or_default();
    let mut name: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    name.truncate(MAX_PROJECT_LEN);
    let name = name.trim_matches('-').to_string();

    if name.is_empty() {
        "sees".to_string()
    } else {
        name
    }
}

/// Register the custom domain after `delay`, detached from the caller.
///
/// The outcome is only logged; there is no retry.
pub fn schedule_custom_domain(
    provisioner: Arc<dyn Provisioner>,
    static_app: String,
    domain: String,
    delay: Duration,
) -> JoinHandle<()> {
    info!(
        static_app = %static_app,
        domain = %domain,
        delay_secs = delay.as_secs(),
        "Custom domain registration scheduled"
    );

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match provisioner.register_custom_domain(&static_app, &domain).await {
            Ok(()) => info!(static_app = %static_app, domain = %domain, "Custom domain registered"),
            Err(e) => error!(
                static_app = %static_app,
                domain = %domain,
                error = %e,
                "Custom domain registration failed; register it manually"
            ),
        }
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records calls and answers with canned results
    #[derive(Default)]
    pub struct RecordingProvisioner {
        pub fail: bool,
        pub calls: Mutex<Vec<String>>,
    }

    impl RecordingProvisioner {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) -> Result<(), ProvisionError> {
            self.calls.lock().unwrap().push(call);
            if self.fail {
                Err(ProvisionError::Api {
                    status: 503,
                    body: "unavailable".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Provisioner for RecordingProvisioner {
        fn is_enabled(&self) -> bool {
            true
        }

        async fn provision(
            &self,
            dns_zone: &str,
            project: &str,
        ) -> Result<ProvisionedResources, ProvisionError> {
            self.record(format!("provision {} {}", dns_zone, project))?;
            Ok(ProvisionedResources {
                static_app_name: format!("stapp-{}-dev-je-001-abcde", project),
                static_app_url: format!("https://{}.azurestaticapps.net", project),
                dns_zone_name: dns_zone.to_string(),
                name_servers: vec![
                    "ns1-01.azure-dns.com".to_string(),
                    "ns2-01.azure-dns.net".to_string(),
                ],
            })
        }

        async fn register_custom_domain(
            &self,
            static_app: &str,
            domain: &str,
        ) -> Result<(), ProvisionError> {
            self.record(format!("register {} {}", static_app, domain))
        }

        async fn teardown(&self, dns_zone: &str, static_app: &str) -> Result<(), ProvisionError> {
            self.record(format!("teardown {} {}", dns_zone, static_app))
        }
    }
}
