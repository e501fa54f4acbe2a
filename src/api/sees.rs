use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::auth::require_role;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    require, validate_http_url, validate_target_domain, validate_title, validate_uuid,
};
use crate::auth::{Role, SessionUser};
use crate::cloud::{project_name, schedule_custom_domain};
use crate::db::{
    self, is_unique_violation, parse_sees_id, CreateSeesRequest, NewSees, Sees, SeesChanges,
    UpdateSeesRequest,
};
use crate::store::{DraftInput, SeesDraft};
use crate::template::{self, TemplateValues};
use crate::AppState;

fn parse_id(id: &str) -> Result<i64, ApiError> {
    parse_sees_id(id).ok_or_else(|| ApiError::bad_request("Invalid SEES id"))
}

fn check_draft_id(draft_id: &str) -> Result<(), ApiError> {
    validate_uuid(draft_id, "draft id").map_err(ApiError::bad_request)
}

/// Check template values against the placeholder schema
fn check_template_variables(
    state: &AppState,
    values: &serde_json::Map<String, serde_json::Value>,
) -> Result<(), ApiError> {
    let report = state.templates.validate(values);
    if report.valid {
        return Ok(());
    }

    let mut details = HashMap::new();
    details.insert("templateVariables".to_string(), report.errors);
    Err(ApiError::validation(details))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// List records with their name servers, newest first
pub async fn list_sees(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
) -> Result<Json<Vec<Sees>>, ApiError> {
    require_role(&user, Role::Viewer)?;
    Ok(Json(db::sees::list(&state.db).await?))
}

pub async fn get_sees(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<Sees>, ApiError> {
    require_role(&user, Role::Viewer)?;
    let id = parse_id(&id)?;

    let sees = db::sees::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("SEES not found"))?;
    Ok(Json(sees))
}

pub async fn create_sees(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Json(request): Json<CreateSeesRequest>,
) -> Result<(StatusCode, Json<Sees>), ApiError> {
    require_role(&user, Role::Editor)?;

    let mut errors = ValidationErrorBuilder::new();
    let title = require(&request.title, "Title is required");
    let target_domain = require(&request.target_domain, "Target domain is required");
    let redirect_url = require(&request.redirect_url, "Redirect URL is required");
    errors
        .check("title", title.clone().and_then(validate_title))
        .check("targetDomain", target_domain.clone().and_then(validate_target_domain))
        .check(
            "redirectUrl",
            redirect_url.clone().and_then(|url| validate_http_url(url, "Redirect URL")),
        );
    if request.template_variables.is_none() {
        errors.add("templateVariables", "Template variables are required");
    }
    errors.finish()?;

    let template_variables = request.template_variables.unwrap_or_default();
    check_template_variables(&state, &template_variables)?;

    let new_sees = NewSees {
        title: title.unwrap_or_default().to_string(),
        target_domain: target_domain.unwrap_or_default().to_lowercase(),
        redirect_url: redirect_url.unwrap_or_default().to_string(),
        note: non_empty(request.note),
        preview_url: non_empty(request.preview_url),
        template_variables,
        ns_records: request
            .ns_records
            .unwrap_or_default()
            .into_iter()
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
            .collect(),
    };

    let sees = db::sees::create(&state.db, new_sees).await.map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict("This target domain is already registered")
        } else {
            e.into()
        }
    })?;
    info!(sees_id = sees.id, target_domain = %sees.target_domain, created_by = %user.user_id, "SEES created");

    if let Some(draft_id) = request.draft_id.as_deref().filter(|d| !d.is_empty()) {
        if let Err(e) = state.drafts.delete(draft_id).await {
            warn!(draft_id = %draft_id, "Failed to delete draft: {}", e);
        }
    }

    if state.provisioner.is_enabled() {
        spawn_provisioning(state.clone(), sees.id, sees.target_domain.clone());
    }

    Ok((StatusCode::CREATED, Json(sees)))
}

/// Create cloud resources for a new record without holding up the response.
///
/// Failures are logged; the record stays as created.
fn spawn_provisioning(state: Arc<AppState>, sees_id: i64, domain: String) {
    tokio::spawn(async move {
        let project = project_name(&domain);
        let resources = match state.provisioner.provision(&domain, &project).await {
            Ok(resources) => resources,
            Err(e) => {
                error!(sees_id, domain = %domain, error = %e, "Cloud provisioning failed; record kept without resources");
                return;
            }
        };

        if let Err(e) = db::sees::attach_resources(
            &state.db,
            sees_id,
            &resources.static_app_name,
            &resources.dns_zone_name,
            &resources.static_app_url,
            &resources.name_servers,
        )
        .await
        {
            error!(sees_id, static_app = %resources.static_app_name, error = %e, "Failed to record provisioned resources");
        }

        schedule_custom_domain(
            state.provisioner.clone(),
            resources.static_app_name,
            domain,
            state.config.cloud.custom_domain_delay(),
        );
    });
}

pub async fn update_sees(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateSeesRequest>,
) -> Result<Json<Sees>, ApiError> {
    require_role(&user, Role::Editor)?;
    let id = parse_id(&id)?;

    let mut errors = ValidationErrorBuilder::new();
    let redirect_url = require(&request.redirect_url, "Redirect URL is required");
    errors.check(
        "redirectUrl",
        redirect_url.clone().and_then(|url| validate_http_url(url, "Redirect URL")),
    );
    if request.template_variables.is_none() {
        errors.add("templateVariables", "Template variables are required");
    }
    errors.finish()?;

    let template_variables = request.template_variables.unwrap_or_default();
    check_template_variables(&state, &template_variables)?;

    let changes = SeesChanges {
        redirect_url: redirect_url.unwrap_or_default().to_string(),
        note: non_empty(request.note),
        preview_url: non_empty(request.preview_url),
        template_variables,
    };

    let sees = db::sees::update(&state.db, id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("SEES not found"))?;

    info!(sees_id = sees.id, updated_by = %user.user_id, "SEES updated");
    Ok(Json(sees))
}

/// Delete a record. Cloud teardown is attempted first and never blocks the delete.
pub async fn delete_sees(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_role(&user, Role::Editor)?;
    let id = parse_id(&id)?;

    let sees = db::sees::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("SEES not found"))?;

    if let (Some(zone), Some(app)) = (&sees.dns_zone_name, &sees.static_app_name) {
        if state.provisioner.is_enabled() {
            if let Err(e) = state.provisioner.teardown(zone, app).await {
                warn!(sees_id = id, dns_zone = %zone, static_app = %app, error = %e, "Cloud teardown failed; remove the resources manually");
            }
        }
    }

    db::sees::delete(&state.db, id).await?;
    info!(sees_id = id, deleted_by = %user.user_id, "SEES deleted");

    Ok(Json(json!({ "message": "SEES deleted" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDraftRequest {
    pub title: Option<String>,
    pub target_domain: Option<String>,
    pub redirect_url: Option<String>,
    pub note: Option<String>,
}

/// Save the first creation step
pub async fn create_draft(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Json(request): Json<CreateDraftRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_role(&user, Role::Editor)?;

    let (Some(title), Some(target_domain), Some(redirect_url)) = (
        non_empty(request.title),
        non_empty(request.target_domain),
        non_empty(request.redirect_url),
    ) else {
        return Err(ApiError::bad_request(
            "Title, target domain and redirect URL are required",
        ));
    };

    let draft_id = state
        .drafts
        .save(DraftInput {
            title,
            target_domain,
            redirect_url,
            note: request.note,
        })
        .await?;

    Ok(Json(json!({
        "draftId": draft_id,
        "message": "Draft saved"
    })))
}

pub async fn get_draft(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Path(draft_id): Path<String>,
) -> Result<Json<SeesDraft>, ApiError> {
    require_role(&user, Role::Viewer)?;
    check_draft_id(&draft_id)?;

    let draft = state
        .drafts
        .get(&draft_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Draft not found or expired"))?;
    Ok(Json(draft))
}

/// Render the default template with the query parameters as placeholder values
pub async fn preview(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Path(draft_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    require_role(&user, Role::Viewer)?;
    check_draft_id(&draft_id)?;

    let mut values: TemplateValues = params.into_iter().collect();

    // The draft's redirect target fills in when the form has not supplied one
    if template::is_empty_value("REDIRECT_URL", values.get("REDIRECT_URL").map(String::as_str)) {
        match state.drafts.get(&draft_id).await {
            Ok(Some(draft)) => {
                values.insert("REDIRECT_URL".to_string(), draft.redirect_url);
            }
            Ok(None) => {}
            Err(e) => warn!(draft_id = %draft_id, "Draft lookup for preview failed: {}", e),
        }
    }

    let html = match template::default_template() {
        Ok(html) => html,
        Err(e) => {
            error!("Preview failed: {}", e);
            return Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Html("<html><body><h1>Failed to generate preview</h1></body></html>"),
            )
                .into_response());
        }
    };

    let prepared = template::prepare_preview(&html, &state.config.server.base_url);
    Ok(Html(template::render(&prepared, &values)).into_response())
}
