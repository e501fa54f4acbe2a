//! Azure Resource Manager client for DNS zones and Static Web Apps.
//!
//! Talks to the ARM REST API directly with a client-credentials token.

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{ProvisionError, ProvisionedResources, Provisioner};
use crate::config::CloudConfig;

const MANAGEMENT_URL: &str = "https://management.azure.com";
const LOGIN_URL: &str = "https://login.microsoftonline.com";
const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

const DNS_API_VERSION: &str = "2018-05-01";
const WEB_API_VERSION: &str = "2022-03-01";

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_POLLS: u32 = 120;

/// Tokens are refreshed this long before they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const SUFFIX_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct AzureProvisioner {
    config: CloudConfig,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

/// `prd` or `dev`; anything other than `prd` is treated as `dev`
fn environment_label(environment: &str) -> &'static str {
    if environment == "prd" {
        "prd"
    } else {
        "dev"
    }
}

fn sku_for(environment: &str) -> &'static str {
    if environment_label(environment) == "prd" {
        "Standard"
    } else {
        "Free"
    }
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..5)
        .map(|_| SUFFIX_CHARS[rng.random_range(0..SUFFIX_CHARS.len())] as char)
        .collect()
}

/// `stapp-{project}-{env}-je-001-{suffix}`
fn static_app_name(project: &str, environment: &str) -> String {
    format!(
        "stapp-{}-{}-je-001-{}",
        project,
        environment_label(environment),
        random_suffix()
    )
}

fn name_servers(zone: &Value) -> Vec<String> {
    zone.pointer("/properties/nameServers")
        .and_then(Value::as_array)
        .map(|servers| {
            servers
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl AzureProvisioner {
    pub fn new(config: CloudConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    fn resource_url(&self, provider_path: &str, api_version: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}?api-version={}",
            MANAGEMENT_URL,
            self.config.subscription_id,
            self.config.resource_group,
            provider_path,
            api_version
        )
    }

    async fn access_token(&self) -> Result<String, ProvisionError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting management API token");
        let url = format!("{}/{}/oauth2/v2.0/token", LOGIN_URL, self.config.tenant_id);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("scope", MANAGEMENT_SCOPE),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Auth(format!("{} - {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProvisionError::Auth(e.to_string()))?;
        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }

    /// Authenticated request; non-success statuses become `ProvisionError::Api`
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, ProvisionError> {
        let token = self.access_token().await?;
        let mut request = self.client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Api { status, body });
        }
        Ok(response)
    }

    /// Follow a long-running operation until it finishes
    async fn wait_for(
        &self,
        response: reqwest::Response,
        what: &str,
    ) -> Result<(), ProvisionError> {
        if response.status() != StatusCode::CREATED && response.status() != StatusCode::ACCEPTED {
            return Ok(());
        }

        let headers = response.headers();
        let monitor = headers
            .get("Azure-AsyncOperation")
            .or_else(|| headers.get("Location"))
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let Some(monitor) = monitor else {
            return Ok(());
        };

        for _ in 0..MAX_POLLS {
            tokio::time::sleep(POLL_INTERVAL).await;

            let poll = self.send(Method::GET, &monitor, None).await?;
            if poll.status() == StatusCode::ACCEPTED {
                continue;
            }

            let body: Value = poll.json().await.unwrap_or(Value::Null);
            match body.get("status").and_then(Value::as_str) {
                Some("Succeeded") | None => return Ok(()),
                Some("Failed") | Some("Canceled") => {
                    return Err(ProvisionError::InvalidResponse(format!(
                        "{} ended with {}",
                        what, body
                    )))
                }
                Some(_) => continue,
            }
        }

        Err(ProvisionError::Timeout(what.to_string()))
    }

    async fn create_dns_zone(&self, dns_zone: &str) -> Result<Vec<String>, ProvisionError> {
        info!(dns_zone = %dns_zone, "Creating DNS zone");
        let url = self.resource_url(
            &format!("Microsoft.Network/dnsZones/{}", dns_zone),
            DNS_API_VERSION,
        );
        let body = json!({
            "location": "global",
            "properties": { "zoneType": "Public" }
        });

        let zone: Value = self.send(Method::PUT, &url, Some(&body)).await?.json().await?;
        Ok(name_servers(&zone))
    }

    async fn create_static_site(&self, name: &str) -> Result<String, ProvisionError> {
        let sku = sku_for(&self.config.environment);
        info!(static_app = %name, sku = sku, "Creating static web app");

        let path = format!("Microsoft.Web/staticSites/{}", name);
        let url = self.resource_url(&path, WEB_API_VERSION);
        let body = json!({
            "location": self.config.location,
            "sku": { "name": sku, "tier": sku },
            "properties": {
                "provider": "None",
                "stagingEnvironmentPolicy": "Enabled",
                "allowConfigFileUpdates": true,
                "enterpriseGradeCdnStatus": "Disabled"
            }
        });

        let response = self.send(Method::PUT, &url, Some(&body)).await?;
        self.wait_for(response, "static web app creation").await?;

        let site: Value = self.send(Method::GET, &url, None).await?.json().await?;
        let hostname = site
            .pointer("/properties/defaultHostname")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if hostname.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("https://{}", hostname))
    }

    /// DELETE that treats an already-missing resource as done
    async fn delete_resource(&self, url: &str, what: &str) -> Result<(), ProvisionError> {
        match self.send(Method::DELETE, url, None).await {
            Ok(response) => self.wait_for(response, what).await,
            Err(ProvisionError::Api { status: 404, .. }) => {
                warn!("{} skipped: resource not found", what);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Provisioner for AzureProvisioner {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn provision(
        &self,
        dns_zone: &str,
        project: &str,
    ) -> Result<ProvisionedResources, ProvisionError> {
        let static_app_name = static_app_name(project, &self.config.environment);
        info!(
            dns_zone = %dns_zone,
            static_app = %static_app_name,
            environment = environment_label(&self.config.environment),
            "Provisioning cloud resources"
        );

        let name_servers = self.create_dns_zone(dns_zone).await?;
        let static_app_url = self.create_static_site(&static_app_name).await?;

        info!(dns_zone = %dns_zone, static_app = %static_app_name, "Cloud resources provisioned");
        Ok(ProvisionedResources {
            static_app_name,
            static_app_url,
            dns_zone_name: dns_zone.to_string(),
            name_servers,
        })
    }

    async fn register_custom_domain(
        &self,
        static_app: &str,
        domain: &str,
    ) -> Result<(), ProvisionError> {
        info!(static_app = %static_app, domain = %domain, "Registering custom domain");
        let url = self.resource_url(
            &format!("Microsoft.Web/staticSites/{}/customDomains/{}", static_app, domain),
            WEB_API_VERSION,
        );
        let body = json!({ "properties": {} });

        let response = self.send(Method::PUT, &url, Some(&body)).await?;
        self.wait_for(response, "custom domain registration").await
    }

    async fn teardown(&self, dns_zone: &str, static_app: &str) -> Result<(), ProvisionError> {
        info!(dns_zone = %dns_zone, static_app = %static_app, "Removing cloud resources");

        let site_url = self.resource_url(
            &format!("Microsoft.Web/staticSites/{}", static_app),
            WEB_API_VERSION,
        );
        self.delete_resource(&site_url, "static web app deletion").await?;

        let zone_url = self.resource_url(
            &format!("Microsoft.Network/dnsZones/{}", dns_zone),
            DNS_API_VERSION,
        );
        self.delete_resource(&zone_url, "DNS zone deletion").await?;

        info!(dns_zone = %dns_zone, static_app = %static_app, "Cloud resources removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(environment: &str) -> CloudConfig {
        CloudConfig {
            enabled: true,
            subscription_id: "sub-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            client_id: "client-1".to_string(),
            client_secret: "secret".to_string(),
            resource_group: "rg-sees".to_string(),
            environment: environment.to_string(),
            ..CloudConfig::default()
        }
    }

    #[test]
    fn test_static_app_name_shape() {
        let name = static_app_name("portal", "prd");
        assert!(name.starts_with("stapp-portal-prd-je-001-"));
        let suffix = name.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 5);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

        assert!(static_app_name("portal", "staging").starts_with("stapp-portal-dev-"));
    }

    #[test]
    fn test_sku_by_environment() {
        assert_eq!(sku_for("prd"), "Standard");
        assert_eq!(sku_for("dev"), "Free");
        assert_eq!(sku_for(""), "Free");
    }

    #[test]
    fn test_resource_url() {
        let azure = AzureProvisioner::new(config("dev"));
        assert_eq!(
            azure.resource_url("Microsoft.Network/dnsZones/old.example.jp", DNS_API_VERSION),
            "https://management.azure.com/subscriptions/sub-1/resourceGroups/rg-sees/providers/Microsoft.Network/dnsZones/old.example.jp?api-version=2018-05-01"
        );
    }

    #[test]
    fn test_name_servers_from_zone() {
        let zone = json!({
            "name": "old.example.jp",
            "properties": {
                "nameServers": ["ns1-01.azure-dns.com.", "ns2-01.azure-dns.net."]
            }
        });
        assert_eq!(
            name_servers(&zone),
            vec!["ns1-01.azure-dns.com.", "ns2-01.azure-dns.net."]
        );
        assert!(name_servers(&json!({})).is_empty());
    }
}
