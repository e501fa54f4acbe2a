use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::request::Parts,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::ApiError;
use super::validation::require;
use crate::auth::{Role, SessionUser};
use crate::config::AuthConfig;
use crate::db::{
    ChangePasswordRequest, ConfirmResetRequest, LoginRequest, LoginResponse,
    ResetPasswordRequest, ResetPasswordResponse,
};
use crate::AppState;

fn session_cookie(config: &AuthConfig, token: String) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookie)
        .max_age(time::Duration::seconds(config.session_ttl_secs as i64))
        .build()
}

fn removal_cookie(config: &AuthConfig) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), "")).path("/").build()
}

/// Reject with 403 unless the user holds at least `required`
pub fn require_role(user: &SessionUser, required: Role) -> Result<(), ApiError> {
    if user.role.has_at_least(required) {
        Ok(())
    } else {
        warn!(
            user_id = %user.user_id,
            role = %user.role,
            required = %required,
            "Insufficient role"
        );
        Err(ApiError::forbidden(
            "You do not have permission to perform this action",
        ))
    }
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(email), Some(password)) = (
        request.email.as_deref().filter(|e| !e.is_empty()),
        request.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };

    let user = match state.credentials.authenticate(email, password).await {
        Ok(user) => user,
        Err(e) => {
            warn!(email = %email, "Login failed");
            return Err(e.into());
        }
    };

    let snapshot = user.snapshot();
    let token = state.sessions.create_session(&snapshot).await?;
    info!(user_id = %snapshot.user_id, role = %snapshot.role, "User logged in");

    let jar = jar.add(session_cookie(&state.config.auth, token));
    Ok((
        jar,
        Json(LoginResponse {
            success: true,
            user: snapshot,
        }),
    ))
}

/// Logout endpoint. Always clears the cookie.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> impl IntoResponse {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = jar.get(cookie_name).map(|c| c.value().to_string()) {
        if let Err(e) = state.sessions.destroy_session(&token).await {
            warn!("Failed to destroy session on logout: {}", e);
        }
    }

    let jar = jar.remove(removal_cookie(&state.config.auth));
    (jar, Json(json!({ "success": true })))
}

/// Current session's user
pub async fn me(user: SessionUser) -> Json<serde_json::Value> {
    Json(json!({ "user": user }))
}

/// Issue a password reset token.
///
/// The response has the same shape whether or not the email is registered.
pub async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>, ApiError> {
    let email = require(&request.email, "Email is required").map_err(ApiError::bad_request)?;

    let token = state.credentials.request_reset(email).await?;
    info!("Password reset requested");

    Ok(Json(ResetPasswordResponse {
        success: true,
        token,
        message: "If the email is registered, a reset token has been issued".to_string(),
    }))
}

pub async fn confirm_password_reset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConfirmResetRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (Some(token), Some(new_password)) = (
        request.token.as_deref().filter(|t| !t.is_empty()),
        request.new_password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Token and new password are required"));
    };

    state.credentials.confirm_reset(token, new_password).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Password has been reset"
    })))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (Some(current), Some(new_password)) = (
        request.current_password.as_deref().filter(|p| !p.is_empty()),
        request.new_password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request(
            "Current password and new password are required",
        ));
    };

    state
        .credentials
        .change_password(&user.user_id, current, new_password)
        .await
        .map_err(|e| {
            warn!(user_id = %user.user_id, "Password change rejected: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(json!({
        "success": true,
        "message": "Password has been changed"
    })))
}

/// Extractor for the authenticated user behind the session cookie.
///
/// Any failure to resolve the session, including an unreachable store, is a 401.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(&state.config.auth.cookie_name)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

        match state.sessions.get_session(&token).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(ApiError::unauthorized("Session is invalid or has expired")),
            Err(e) => {
                warn!("Session lookup failed: {}", e);
                Err(ApiError::unauthorized("Authentication required"))
            }
        }
    }
}
