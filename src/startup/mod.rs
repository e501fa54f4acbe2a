//! Startup self-checks
//!
//! Run before the server starts accepting requests:
//! - Database connectivity and schema
//! - Session store reachability
//! - Template schema and default template agree on their placeholders
//! - Cloud provisioning settings are complete when enabled

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::store::KeyValueStore;
use crate::template::{self, TemplateSchema};
use crate::DbPool;

/// Result of a single startup check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// Whether failure should abort startup
    pub critical: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            critical: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>, critical: bool) -> Self {
        Self {
            name: name.into(),
            passed: false,
            critical,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Aggregated startup check results
#[derive(Debug, Clone, Serialize)]
pub struct StartupCheckReport {
    pub checks: Vec<CheckResult>,
    pub all_critical_passed: bool,
    pub all_passed: bool,
    pub summary: String,
}

impl StartupCheckReport {
    pub fn new(checks: Vec<CheckResult>) -> Self {
        let all_critical_passed = checks.iter().filter(|c| c.critical).all(|c| c.passed);
        let all_passed = checks.iter().all(|c| c.passed);

        let failed_critical = checks.iter().filter(|c| c.critical && !c.passed).count();
        let failed_non_critical = checks.iter().filter(|c| !c.critical && !c.passed).count();
        let total = checks.len();
        let passed = checks.iter().filter(|c| c.passed).count();

        let summary = if all_passed {
            format!("All {} startup checks passed", total)
        } else if all_critical_passed {
            format!(
                "{}/{} checks passed ({} non-critical warnings)",
                passed, total, failed_non_critical
            )
        } else {
            format!(
                "{}/{} checks passed ({} critical failures)",
                passed, total, failed_critical
            )
        };

        Self {
            checks,
            all_critical_passed,
            all_passed,
            summary,
        }
    }
}

/// Run all startup self-checks
pub async fn run_startup_checks(
    config: &Config,
    db: &DbPool,
    store: &dyn KeyValueStore,
    templates: &TemplateSchema,
) -> StartupCheckReport {
    info!("Running startup self-checks...");

    let checks = vec![
        check_database_connectivity(db).await,
        check_database_schema(db).await,
        check_session_store(store).await,
        check_template(templates),
        check_cloud_settings(config),
    ];

    let report = StartupCheckReport::new(checks);

    for check in &report.checks {
        if check.passed {
            info!(check = %check.name, message = %check.message, "Startup check PASSED");
        } else if check.critical {
            error!(
                check = %check.name,
                message = %check.message,
                details = ?check.details,
                "Startup check FAILED (CRITICAL)"
            );
        } else {
            warn!(
                check = %check.name,
                message = %check.message,
                details = ?check.details,
                "Startup check FAILED (non-critical)"
            );
        }
    }

    info!(
        summary = %report.summary,
        all_passed = report.all_passed,
        all_critical_passed = report.all_critical_passed,
        "Startup checks completed"
    );

    report
}

async fn check_database_connectivity(db: &DbPool) -> CheckResult {
    match sqlx::query("SELECT 1").fetch_one(db).await {
        Ok(_) => CheckResult::pass("database_connectivity", "Database connection successful"),
        Err(e) => CheckResult::fail("database_connectivity", "Failed to connect to database", true)
            .with_details(e.to_string()),
    }
}

async fn check_database_schema(db: &DbPool) -> CheckResult {
    let result: Result<Vec<(String,)>, _> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_all(db)
    .await;

    match result {
        Ok(tables) => {
            let table_names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
            let missing: Vec<&str> = ["users", "sees", "ns_records"]
                .iter()
                .filter(|t| !table_names.contains(*t))
                .copied()
                .collect();

            if missing.is_empty() {
                CheckResult::pass(
                    "database_schema",
                    format!("Database schema valid ({} tables)", tables.len()),
                )
            } else {
                CheckResult::fail("database_schema", "Missing essential database tables", true)
                    .with_details(format!("Missing: {}", missing.join(", ")))
            }
        }
        Err(e) => CheckResult::fail("database_schema", "Failed to query database schema", true)
            .with_details(e.to_string()),
    }
}

/// Sessions, reset tokens and drafts all live in the store, so it must answer
async fn check_session_store(store: &dyn KeyValueStore) -> CheckResult {
    match store.ping().await {
        Ok(()) => CheckResult::pass("session_store", "Session store reachable")
            .with_details(format!("Backend: {}", store.backend())),
        Err(e) => CheckResult::fail("session_store", "Session store unreachable", true)
            .with_details(e.to_string()),
    }
}

/// The default template must exist; schema keys without a marker only warn
fn check_template(templates: &TemplateSchema) -> CheckResult {
    let html = match template::default_template() {
        Ok(html) => html,
        Err(e) => {
            return CheckResult::fail("template", "Default template missing", true)
                .with_details(e.to_string())
        }
    };

    let unused: Vec<&str> = templates
        .placeholders
        .iter()
        .filter(|rule| !html.contains(&template::marker(&rule.key)))
        .map(|rule| rule.key.as_str())
        .collect();

    if unused.is_empty() {
        CheckResult::pass(
            "template",
            format!(
                "Template schema v{} loaded ({} placeholders)",
                templates.version,
                templates.placeholders.len()
            ),
        )
    } else {
        CheckResult::fail(
            "template",
            "Schema placeholders missing from the default template",
            false,
        )
        .with_details(format!("Unused: {}", unused.join(", ")))
    }
}

fn check_cloud_settings(config: &Config) -> CheckResult {
    let cloud = &config.cloud;
    if !cloud.enabled {
        return CheckResult::pass("cloud_provisioning", "Cloud provisioning disabled");
    }

    if cloud.is_configured() {
        CheckResult::pass("cloud_provisioning", "Cloud provisioning configured")
            .with_details(format!(
                "Resource group: {}, environment: {}",
                cloud.resource_group, cloud.environment
            ))
    } else {
        // Records are still created, just without cloud resources
        CheckResult::fail(
            "cloud_provisioning",
            "Cloud provisioning enabled but credentials are incomplete",
            false,
        )
        .with_details("Set subscription_id, tenant_id, client_id, client_secret and resource_group")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::store::MemoryStore;

    #[test]
    fn test_check_result_pass() {
        let result = CheckResult::pass("test", "Test passed");
        assert!(result.passed);
        assert!(!result.critical);
        assert_eq!(result.name, "test");
    }

    #[test]
    fn test_startup_check_report_critical_failure() {
        let checks = vec![
            CheckResult::pass("check1", "ok"),
            CheckResult::fail("check2", "fail", true),
        ];
        let report = StartupCheckReport::new(checks);
        assert!(!report.all_passed);
        assert!(!report.all_critical_passed);
        assert_eq!(report.summary, "1/2 checks passed (1 critical failures)");
    }

    #[test]
    fn test_startup_check_report_non_critical_failure() {
        let checks = vec![
            CheckResult::pass("check1", "ok"),
            CheckResult::fail("check2", "warn", false),
        ];
        let report = StartupCheckReport::new(checks);
        assert!(!report.all_passed);
        assert!(report.all_critical_passed); // Non-critical failures don't affect this
    }

    #[tokio::test]
    async fn test_startup_checks_pass_with_fresh_database() {
        let pool = db::test_pool().await;
        let store = MemoryStore::new();
        let templates = TemplateSchema::embedded().unwrap();

        let report = run_startup_checks(&Config::default(), &pool, &store, &templates).await;
        assert!(report.all_passed, "{:?}", report.checks);
        assert_eq!(report.checks.len(), 5);
    }

    #[test]
    fn test_incomplete_cloud_settings_only_warn() {
        let mut config = Config::default();
        config.cloud.enabled = true;

        let result = check_cloud_settings(&config);
        assert!(!result.passed);
        assert!(!result.critical);
    }

    #[test]
    fn test_schema_keys_without_markers_warn() {
        let mut templates = TemplateSchema::embedded().unwrap();
        let mut extra = templates.placeholders[0].clone();
        extra.key = "NOT_IN_TEMPLATE".to_string();
        templates.placeholders.push(extra);

        let result = check_template(&templates);
        assert!(!result.passed);
        assert!(!result.critical);
        assert!(result.details.unwrap().contains("NOT_IN_TEMPLATE"));
    }
}
