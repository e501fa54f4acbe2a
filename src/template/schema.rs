//! Typed placeholder rules loaded from `template-config.json`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use super::{
    current_year, is_empty_value, today_label, TemplateAssets, ValidationReport, SCHEMA_FILE,
};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read template schema: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid template schema: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid validation pattern for {key}: {source}")]
    InvalidPattern { key: String, source: regex::Error },

    #[error("Placeholder {0} is defined more than once")]
    DuplicateKey(String),

    #[error("Embedded template asset {0} is missing")]
    MissingAsset(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderType {
    String,
    Number,
    Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderRule {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: PlaceholderType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
    /// Filled in by the server (current year, today's date)
    #[serde(default)]
    pub auto: bool,
    #[serde(skip)]
    pattern: Option<Regex>,
}

impl PlaceholderRule {
    fn compile(&mut self) -> Result<(), SchemaError> {
        if let Some(validation) = &self.validation {
            let regex = Regex::new(validation).map_err(|source| SchemaError::InvalidPattern {
                key: self.key.clone(),
                source,
            })?;
            self.pattern = Some(regex);
        }
        Ok(())
    }

    /// Default value, with auto fields resolved against the clock
    pub fn default_value(&self) -> Value {
        if self.auto {
            match self.key.as_str() {
                "CURRENT_YEAR" => return Value::from(current_year()),
                "LAST_UPDATED_DATE" => return Value::from(today_label()),
                _ => {}
            }
        }
        self.default.clone()
    }

    fn check(&self, value: &Value, errors: &mut Vec<String>) {
        let key = &self.key;
        match self.kind {
            PlaceholderType::Number => {
                let Some(number) = as_number(value) else {
                    errors.push(format!("{} must be a number", key));
                    return;
                };
                if let Some(min) = self.min {
                    if number < min {
                        errors.push(format!("{} must be at least {}", key, min));
                    }
                }
                if let Some(max) = self.max {
                    if number > max {
                        errors.push(format!("{} must be at most {}", key, max));
                    }
                }
            }
            PlaceholderType::String => {
                let Value::String(text) = value else {
                    errors.push(format!("{} must be a string", key));
                    return;
                };
                if let Some(max_length) = self.max_length {
                    if text.chars().count() > max_length {
                        errors.push(format!(
                            "{} must be at most {} characters",
                            key, max_length
                        ));
                    }
                }
            }
            PlaceholderType::Url => {
                let Value::String(text) = value else {
                    errors.push(format!("{} must be a string", key));
                    return;
                };
                if let Some(pattern) = &self.pattern {
                    if !pattern.is_match(text) {
                        errors.push(format!("{} must be a valid URL", key));
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateExample {
    pub name: String,
    pub values: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSchema {
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub placeholders: Vec<PlaceholderRule>,
    #[serde(default)]
    pub examples: Vec<TemplateExample>,
}

impl TemplateSchema {
    pub fn from_json(content: &str) -> Result<Self, SchemaError> {
        let mut schema: TemplateSchema = serde_json::from_str(content)?;

        let mut seen = HashSet::new();
        for rule in &mut schema.placeholders {
            if !seen.insert(rule.key.clone()) {
                return Err(SchemaError::DuplicateKey(rule.key.clone()));
            }
            rule.compile()?;
        }
        Ok(schema)
    }

    /// Schema compiled into the binary
    pub fn embedded() -> Result<Self, SchemaError> {
        let file = TemplateAssets::get(SCHEMA_FILE)
            .ok_or_else(|| SchemaError::MissingAsset(SCHEMA_FILE.to_string()))?;
        let content = std::str::from_utf8(&file.data)
            .map_err(|_| SchemaError::MissingAsset(SCHEMA_FILE.to_string()))?;
        Self::from_json(content)
    }

    /// Load from `path` when given, else the embedded schema
    pub fn load(path: Option<&Path>) -> Result<Self, SchemaError> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Self::from_json(&content)
            }
            None => Self::embedded(),
        }
    }

    pub fn rule(&self, key: &str) -> Option<&PlaceholderRule> {
        self.placeholders.iter().find(|r| r.key == key)
    }

    /// Check every rule; a required-but-empty value skips the other checks for that key
    pub fn validate(&self, values: &Map<String, Value>) -> ValidationReport {
        let mut errors = Vec::new();

        for rule in &self.placeholders {
            let value = values.get(&rule.key);
            if is_empty_json(&rule.key, value) {
                if rule.required {
                    errors.push(format!("{} is required", rule.key));
                }
                continue;
            }
            if let Some(value) = value {
                rule.check(value, &mut errors);
            }
        }

        ValidationReport::from_errors(errors)
    }

    pub fn defaults(&self) -> Map<String, Value> {
        self.placeholders
            .iter()
            .map(|rule| (rule.key.clone(), rule.default_value()))
            .collect()
    }

    /// Illustrative values: the first example with auto fields refreshed,
    /// or the defaults when the schema carries no example
    pub fn sample_values(&self) -> Map<String, Value> {
        let Some(example) = self.examples.first() else {
            return self.defaults();
        };

        let mut values = example.values.clone();
        for rule in self.placeholders.iter().filter(|r| r.auto) {
            if rule.key == "CURRENT_YEAR" {
                values.insert(rule.key.clone(), rule.default_value());
            }
        }
        values
    }
}

fn is_empty_json(key: &str, value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => is_empty_value(key, Some(text.as_str())),
        Some(_) => false,
    }
}

/// JSON numbers, or strings holding a number (form inputs submit text)
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}
