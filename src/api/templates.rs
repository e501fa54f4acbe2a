use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::auth::require_role;
use super::error::ApiError;
use crate::auth::{Role, SessionUser};
use crate::template::{self, PlaceholderInfo, TemplateSchema, ValidationReport};
use crate::AppState;

/// The basic placeholder set shown on the creation form
pub async fn list_placeholders(user: SessionUser) -> Result<Json<Vec<PlaceholderInfo>>, ApiError> {
    require_role(&user, Role::Viewer)?;
    Ok(Json(template::list_placeholders()))
}

pub async fn get_schema(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
) -> Result<Json<TemplateSchema>, ApiError> {
    require_role(&user, Role::Viewer)?;
    Ok(Json(state.templates.clone()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTemplateRequest {
    #[serde(default)]
    pub template_variables: Map<String, Value>,
}

pub async fn validate_values(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Json(request): Json<ValidateTemplateRequest>,
) -> Result<Json<ValidationReport>, ApiError> {
    require_role(&user, Role::Viewer)?;
    Ok(Json(state.templates.validate(&request.template_variables)))
}

pub async fn sample_values(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
) -> Result<Json<Value>, ApiError> {
    require_role(&user, Role::Viewer)?;
    Ok(Json(json!({
        "templateVariables": state.templates.sample_values()
    })))
}
