//! SEES records and their delegated name servers.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Width of the zero-padded display id
const SEES_ID_WIDTH: usize = 4;

/// Display form of a record id: `1` becomes `"0001"`
pub fn format_sees_id(id: i64) -> String {
    format!("{:0width$}", id, width = SEES_ID_WIDTH)
}

/// Parse a display id (`"0001"`) or a bare number back into a record id
pub fn parse_sees_id(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<i64>().ok().filter(|id| *id > 0)
}

#[derive(Debug, Clone, FromRow)]
pub struct SeesRow {
    pub id: i64,
    pub title: String,
    pub target_domain: String,
    pub redirect_url: String,
    pub note: Option<String>,
    pub preview_url: Option<String>,
    /// JSON object text
    pub template_variables: String,
    pub static_app_name: Option<String>,
    pub dns_zone_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NsRecord {
    pub id: i64,
    pub sees_id: i64,
    pub name_server: String,
    pub created_at: String,
}

/// A record with its name servers, as returned by the API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sees {
    pub id: i64,
    pub display_id: String,
    pub title: String,
    pub target_domain: String,
    pub redirect_url: String,
    pub note: Option<String>,
    pub preview_url: Option<String>,
    pub template_variables: serde_json::Value,
    pub static_app_name: Option<String>,
    pub dns_zone_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub ns_records: Vec<NsRecord>,
}

impl Sees {
    pub fn from_row(row: SeesRow, ns_records: Vec<NsRecord>) -> Self {
        // Non-JSON content reads as an empty object
        let template_variables = serde_json::from_str(&row.template_variables)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()));

        Self {
            display_id: format_sees_id(row.id),
            id: row.id,
            title: row.title,
            target_domain: row.target_domain,
            redirect_url: row.redirect_url,
            note: row.note,
            preview_url: row.preview_url,
            template_variables,
            static_app_name: row.static_app_name,
            dns_zone_name: row.dns_zone_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
            ns_records,
        }
    }
}

/// Values for a new record row
#[derive(Debug, Clone)]
pub struct NewSees {
    pub title: String,
    pub target_domain: String,
    pub redirect_url: String,
    pub note: Option<String>,
    pub preview_url: Option<String>,
    pub template_variables: serde_json::Map<String, serde_json::Value>,
    pub ns_records: Vec<String>,
}

/// Editable fields of an existing record
#[derive(Debug, Clone)]
pub struct SeesChanges {
    pub redirect_url: String,
    pub note: Option<String>,
    pub preview_url: Option<String>,
    pub template_variables: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSeesRequest {
    pub draft_id: Option<String>,
    pub title: Option<String>,
    pub target_domain: Option<String>,
    pub redirect_url: Option<String>,
    pub note: Option<String>,
    pub template_variables: Option<serde_json::Map<String, serde_json::Value>>,
    pub preview_url: Option<String>,
    pub ns_records: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSeesRequest {
    pub redirect_url: Option<String>,
    pub note: Option<String>,
    pub template_variables: Option<serde_json::Map<String, serde_json::Value>>,
    pub preview_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sees_id() {
        assert_eq!(format_sees_id(1), "0001");
        assert_eq!(format_sees_id(42), "0042");
        assert_eq!(format_sees_id(12345), "12345");
    }

    #[test]
    fn test_parse_sees_id() {
        assert_eq!(parse_sees_id("0001"), Some(1));
        assert_eq!(parse_sees_id("42"), Some(42));
        assert_eq!(parse_sees_id("0000"), None);
        assert_eq!(parse_sees_id("-1"), None);
        assert_eq!(parse_sees_id("abc"), None);
        assert_eq!(parse_sees_id(""), None);
    }

    #[test]
    fn test_malformed_variables_degrade_to_empty_object() {
        let row = SeesRow {
            id: 7,
            title: "t".to_string(),
            target_domain: "old.example.jp".to_string(),
            redirect_url: "https://new.example.jp".to_string(),
            note: None,
            preview_url: None,
            template_variables: "not json".to_string(),
            static_app_name: None,
            dns_zone_name: None,
            created_at: "2025-01-01T00:00:00+00:00".to_string(),
            updated_at: "2025-01-01T00:00:00+00:00".to_string(),
        };
        let sees = Sees::from_row(row, vec![]);
        assert_eq!(sees.display_id, "0007");
        assert_eq!(sees.template_variables, serde_json::json!({}));
    }
}
