//! Input validation for API requests.
//!
//! Each function returns the message to show for a field. Collect several
//! with `ValidationErrorBuilder::check` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating domain names (at least two labels)
    static ref DOMAIN_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?)+$"
    ).unwrap();

    /// Regex for validating email addresses (pragmatic, not RFC 5322)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();

    /// Regex for validating HTTP/HTTPS URLs
    static ref HTTP_URL_REGEX: Regex = Regex::new(
        r"^https?://[^\s/?#]+[^\s]*$"
    ).unwrap();
}

/// Present and not blank
pub fn require<'a>(value: &'a Option<String>, message: &str) -> Result<&'a str, String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(message.to_string()),
    }
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate the domain a notice replaces
pub fn validate_target_domain(domain: &str) -> Result<(), String> {
    if domain.is_empty() {
        return Err("Target domain is required".to_string());
    }

    if domain.len() > 253 {
        return Err("Domain name is too long (max 253 characters)".to_string());
    }

    if !DOMAIN_REGEX.is_match(domain) {
        return Err("Invalid domain name format".to_string());
    }

    Ok(())
}

pub fn validate_http_url(url: &str, field_label: &str) -> Result<(), String> {
    if url.is_empty() {
        return Err(format!("{} is required", field_label));
    }

    if url.len() > 2048 {
        return Err(format!("{} is too long (max 2048 characters)", field_label));
    }

    if !HTTP_URL_REGEX.is_match(url) {
        return Err(format!("{} must be an http or https URL", field_label));
    }

    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), String> {
    if title.is_empty() {
        return Err("Title is required".to_string());
    }

    if title.chars().count() > 200 {
        return Err("Title is too long (max 200 characters)".to_string());
    }

    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name is required".to_string());
    }

    if name.chars().count() > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }

    Ok(())
}

/// Draft ids are UUIDs
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require() {
        assert_eq!(require(&Some(" x ".to_string()), "needed"), Ok("x"));
        assert!(require(&Some("   ".to_string()), "needed").is_err());
        assert_eq!(require(&None, "needed"), Err("needed".to_string()));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("staff@example.jp").is_ok());
        assert!(validate_email("first.last+tag@city.example.jp").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("two words@example.jp").is_err());
        assert!(validate_email("user@nodot").is_err());
    }

    #[test]
    fn test_validate_target_domain() {
        assert!(validate_target_domain("old.example.jp").is_ok());
        assert!(validate_target_domain("sub-domain.example.co.jp").is_ok());
        assert!(validate_target_domain("localhost").is_err());
        assert!(validate_target_domain("-bad.example.jp").is_err());
        assert!(validate_target_domain("https://old.example.jp").is_err());
        assert!(validate_target_domain(&"a".repeat(254)).is_err());
    }

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("https://new.example.jp/path?q=1", "Redirect URL").is_ok());
        assert!(validate_http_url("http://new.example.jp", "Redirect URL").is_ok());
        assert_eq!(
            validate_http_url("ftp://files.example.jp", "Redirect URL"),
            Err("Redirect URL must be an http or https URL".to_string())
        );
        assert!(validate_http_url("https://", "Redirect URL").is_err());
        assert!(validate_http_url("", "Redirect URL").is_err());
    }

    #[test]
    fn test_validate_title_and_name() {
        assert!(validate_title("Old portal closing").is_ok());
        assert!(validate_title("").is_err());
        assert!(validate_title(&"題".repeat(200)).is_ok());
        assert!(validate_title(&"題".repeat(201)).is_err());
        assert!(validate_name("Hanako").is_ok());
        assert!(validate_name("").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "draft id").is_ok());
        assert_eq!(
            validate_uuid("not-a-uuid", "draft id"),
            Err("Invalid draft id format".to_string())
        );
    }
}
