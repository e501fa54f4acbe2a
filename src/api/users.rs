use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use super::auth::require_role;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_name};
use crate::auth::{Role, SessionUser};
use crate::db::{
    self, is_unique_violation, CreateUserRequest, NewUser, UpdateUserRequest, UserResponse,
};
use crate::AppState;

fn parse_role(value: Option<i64>) -> Result<Role, ApiError> {
    let value = value.ok_or_else(|| ApiError::validation_field("role", "Role is required"))?;
    Role::try_from(value).map_err(|_| ApiError::validation_field("role", "Role must be 0, 1 or 2"))
}

/// List users, newest first
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_role(&user, Role::Viewer)?;

    let users = db::users::list(&state.db).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    require_role(&user, Role::Admin)?;

    let name = request.name.as_deref().map(str::trim).unwrap_or_default();
    let email = request.email.as_deref().map(str::trim).unwrap_or_default();
    let password = request.password.as_deref().unwrap_or_default();

    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("name", validate_name(name))
        .check("email", validate_email(email));
    if password.is_empty() {
        errors.add("password", "Password is required");
    } else if let Err(e) = state.credentials.check_policy(password) {
        errors.add("password", e.to_string());
    }
    errors.finish()?;

    let role = match request.role {
        None => Role::Viewer,
        value => parse_role(value)?,
    };

    let password_hash = state.credentials.hash_password(password)?;
    let created = db::users::create(
        &state.db,
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            role,
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict("A user with this email already exists")
        } else {
            e.into()
        }
    })?;

    info!(user_id = %created.id, role = %created.role, created_by = %user.user_id, "User created");
    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

/// Change a user's role
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_role(&user, Role::Admin)?;
    let role = parse_role(request.role)?;

    let updated = db::users::update_role(&state.db, &id, role)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!(user_id = %updated.id, role = %updated.role, changed_by = %user.user_id, "User role changed");
    Ok(Json(UserResponse::from(updated)))
}
