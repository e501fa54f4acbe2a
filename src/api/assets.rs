use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::template::TemplateAssets;

/// Serve the embedded template and its stylesheet and images
pub async fn template_asset(Path(path): Path<String>) -> Response {
    let path = path.trim_start_matches('/');

    match TemplateAssets::get(path) {
        Some(file) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                file.data.into_owned(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}
