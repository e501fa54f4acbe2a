mod assets;
pub mod auth;
pub mod error;
mod sees;
mod templates;
mod users;
mod validation;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Session endpoints; login, logout and the reset pair are public
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/reset-password", post(auth::request_password_reset))
        .route("/reset-password/confirm", post(auth::confirm_password_reset))
        .route("/change-password", post(auth::change_password));

    // Role checks happen in the handlers via the SessionUser extractor
    let api_routes = Router::new()
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", put(users::update_user))
        // SEES records
        .route("/sees", get(sees::list_sees).post(sees::create_sees))
        .route("/sees/draft", post(sees::create_draft))
        .route("/sees/draft/:uuid", get(sees::get_draft))
        .route("/sees/preview/:uuid", get(sees::preview))
        .route(
            "/sees/:id",
            get(sees::get_sees)
                .put(sees::update_sees)
                .delete(sees::delete_sees),
        )
        // Templates
        .route("/templates/placeholders", get(templates::list_placeholders))
        .route("/templates/schema", get(templates::get_schema))
        .route("/templates/validate", post(templates::validate_values))
        .route("/templates/sample", get(templates::sample_values));

    Router::new()
        .route("/health", get(health_check))
        .route("/templates/*path", get(assets::template_asset))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
