use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
struct BrandingOptions {
    login_disclaimer: Option<String>,
    custom_css: Option<String>,
    splashscreen_enabled: bool,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/Configuration", get(get_branding_configuration))
        .route("/Css", get(get_branding_css))
        .route("/Css.css", get(get_branding_css))
}

async fn get_branding_configuration() -> Json<BrandingOptions> {
    Json(BrandingOptions::default())
}

async fn get_branding_css() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/css; charset=utf-8")],
        "",
    )
}
