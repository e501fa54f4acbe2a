//! Placeholder substitution and validation for notice pages.
//!
//! Templates carry literal `{{KEY}}` markers. A value counts as empty when it
//! is missing, an empty string, or the untouched marker itself; form fields the
//! user never edited submit the marker text back.

mod preview;
mod schema;

pub use preview::{extract_placeholders, prepare_preview};
pub use schema::{PlaceholderRule, PlaceholderType, SchemaError, TemplateExample, TemplateSchema};

use chrono::{Datelike, Local};
use rust_embed::RustEmbed;
use serde::Serialize;
use std::collections::BTreeMap;

/// Embedded notice template, its stylesheet and the placeholder rules
#[derive(RustEmbed)]
#[folder = "templates/"]
pub struct TemplateAssets;

pub const DEFAULT_TEMPLATE: &str = "default-template.html";
pub const SCHEMA_FILE: &str = "template-config.json";

/// Placeholder values keyed by placeholder name
pub type TemplateValues = BTreeMap<String, String>;

/// Embedded default notice template
pub fn default_template() -> Result<String, SchemaError> {
    let file = TemplateAssets::get(DEFAULT_TEMPLATE)
        .ok_or_else(|| SchemaError::MissingAsset(DEFAULT_TEMPLATE.to_string()))?;
    String::from_utf8(file.data.into_owned())
        .map_err(|_| SchemaError::MissingAsset(DEFAULT_TEMPLATE.to_string()))
}

/// The literal marker for `key`, e.g. `{{SERVICE_NAME}}`
pub fn marker(key: &str) -> String {
    format!("{{{{{}}}}}", key)
}

pub fn is_empty_value(key: &str, value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.is_empty() || v == marker(key),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderInfo {
    pub key: &'static str,
    pub label: &'static str,
    pub default_value: String,
    pub required: bool,
}

fn info(key: &'static str, label: &'static str, default_value: String) -> PlaceholderInfo {
    PlaceholderInfo {
        key,
        label,
        default_value,
        required: true,
    }
}

/// Today in the notice's date style, e.g. `2025/3/7`
pub fn today_label() -> String {
    let today = Local::now().date_naive();
    format!("{}/{}/{}", today.year(), today.month(), today.day())
}

pub fn current_year() -> i32 {
    Local::now().year()
}

/// The basic placeholder set, in form order
pub fn list_placeholders() -> Vec<PlaceholderInfo> {
    vec![
        info("REDIRECT_URL", "Redirect URL", String::new()),
        info("SERVICE_NAME", "Service name", String::new()),
        info("SERVICE_CATEGORY", "Service category", String::new()),
        info("SERVICE_TITLE", "Service title", String::new()),
        info("END_DATE", "End date", String::new()),
        info("LAST_UPDATED_DATE", "Last updated date", today_label()),
        info("REDIRECT_LINK_TEXT", "Redirect link text", "こちら".to_string()),
        info("CURRENT_YEAR", "Current year", current_year().to_string()),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Check the basic placeholder set. Every missing required value is reported.
pub fn validate(values: &TemplateValues) -> ValidationReport {
    let errors = list_placeholders()
        .into_iter()
        .filter(|p| p.required && is_empty_value(p.key, values.get(p.key).map(String::as_str)))
        .map(|p| format!("{} is required", p.label))
        .collect();

    ValidationReport::from_errors(errors)
}

/// Substitute `{{KEY}}` markers in a single pass.
///
/// Keys are matched as literal text. Markers with no usable value are left
/// in place, and inserted values are never scanned for further markers.
pub fn render(template: &str, values: &TemplateValues) -> String {
    let mut replacements: Vec<(String, &str)> = values
        .iter()
        .filter(|(key, value)| !is_empty_value(key, Some(value.as_str())))
        .map(|(key, value)| (marker(key), value.as_str()))
        .collect();
    if replacements.is_empty() {
        return template.to_string();
    }
    // Longest marker first so overlapping keys resolve deterministically
    replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find("{{") {
        output.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match replacements.iter().find(|(m, _)| rest.starts_with(m.as_str())) {
            Some((m, value)) => {
                output.push_str(value);
                rest = &rest[m.len()..];
            }
            None => {
                output.push('{');
                rest = &rest[1..];
            }
        }
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> TemplateValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn complete() -> TemplateValues {
        values(&[
            ("REDIRECT_URL", "https://x"),
            ("SERVICE_NAME", "Portal"),
            ("SERVICE_CATEGORY", "City"),
            ("SERVICE_TITLE", "Portal closing"),
            ("END_DATE", "2025/3/31"),
            ("LAST_UPDATED_DATE", "2025/4/1"),
            ("REDIRECT_LINK_TEXT", "here"),
            ("CURRENT_YEAR", "2025"),
        ])
    }

    #[test]
    fn test_placeholder_order() {
        let keys: Vec<&str> = list_placeholders().iter().map(|p| p.key).collect();
        assert_eq!(
            keys,
            vec![
                "REDIRECT_URL",
                "SERVICE_NAME",
                "SERVICE_CATEGORY",
                "SERVICE_TITLE",
                "END_DATE",
                "LAST_UPDATED_DATE",
                "REDIRECT_LINK_TEXT",
                "CURRENT_YEAR",
            ]
        );
        let year = list_placeholders()
            .into_iter()
            .find(|p| p.key == "CURRENT_YEAR")
            .unwrap();
        assert_eq!(year.default_value, current_year().to_string());
    }

    #[test]
    fn test_marker_counts_as_empty() {
        let report = validate(&values(&[("REDIRECT_URL", "{{REDIRECT_URL}}")]));
        assert!(!report.valid);
        assert!(report.errors.contains(&"Redirect URL is required".to_string()));

        let report = validate(&values(&[("REDIRECT_URL", "https://x")]));
        assert!(!report.errors.contains(&"Redirect URL is required".to_string()));
    }

    #[test]
    fn test_validate_collects_every_error() {
        let report = validate(&TemplateValues::new());
        assert!(!report.valid);
        assert_eq!(report.errors.len(), list_placeholders().len());

        let report = validate(&complete());
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_other_keys_marker_is_not_empty() {
        // Only the key's own marker is the empty sentinel
        assert!(!is_empty_value("SERVICE_NAME", Some("{{SERVICE_TITLE}}")));
        assert!(is_empty_value("SERVICE_NAME", Some("{{SERVICE_NAME}}")));
        assert!(is_empty_value("SERVICE_NAME", Some("")));
        assert!(is_empty_value("SERVICE_NAME", None));
    }

    #[test]
    fn test_render_substitutes_values() {
        let out = render(
            "<a>{{REDIRECT_URL}}</a>",
            &values(&[("REDIRECT_URL", "https://x")]),
        );
        assert_eq!(out, "<a>https://x</a>");
    }

    #[test]
    fn test_render_leaves_unresolved_markers() {
        assert_eq!(
            render("<a>{{REDIRECT_URL}}</a>", &TemplateValues::new()),
            "<a>{{REDIRECT_URL}}</a>"
        );
        assert_eq!(
            render(
                "<a>{{REDIRECT_URL}}</a>",
                &values(&[("REDIRECT_URL", ""), ("OTHER", "x")])
            ),
            "<a>{{REDIRECT_URL}}</a>"
        );
        assert_eq!(
            render(
                "{{REDIRECT_URL}}",
                &values(&[("REDIRECT_URL", "{{REDIRECT_URL}}")])
            ),
            "{{REDIRECT_URL}}"
        );
    }

    #[test]
    fn test_render_replaces_every_occurrence() {
        let out = render(
            "<title>{{SERVICE_NAME}}</title><p>{{SERVICE_NAME}} has closed</p>",
            &values(&[("SERVICE_NAME", "Portal")]),
        );
        assert_eq!(out, "<title>Portal</title><p>Portal has closed</p>");
    }

    #[test]
    fn test_render_treats_keys_literally() {
        let vals = values(&[("A.B", "dot"), ("X+", "plus")]);
        assert_eq!(render("{{A.B}} {{AxB}} {{X+}}", &vals), "dot {{AxB}} plus");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let vals = values(&[("A", "{{B}}"), ("B", "b")]);
        assert_eq!(render("{{A}}|{{B}}", &vals), "{{B}}|b");
    }

    #[test]
    fn test_render_handles_extra_braces_and_multibyte_text() {
        let vals = values(&[("NAME", "値")]);
        assert_eq!(render("{{{NAME}}}", &vals), "{値}");
        assert_eq!(render("終了：{{NAME}}です{{", &vals), "終了：値です{{");
    }

    #[test]
    fn test_embedded_template_has_markers() {
        let html = default_template().unwrap();
        for placeholder in list_placeholders() {
            assert!(
                html.contains(&marker(placeholder.key)),
                "template is missing {}",
                placeholder.key
            );
        }
    }
}
