// Quick connect plus the small compatibility endpoints clients probe
// for. The stubs return empty-but-well-formed payloads so clients do
// not error out on missing features.

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::dto::ItemsResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::AuthSession;
use crate::AppState;

type QueryMap = HashMap<String, String>;

// =============================================================================
// Quick connect (disabled)
// =============================================================================

// Quick connect is not offered; the endpoints exist so clients get a
// clean "disabled" answer instead of a 404. The code store keeps the
// persistence contract for a later enablement.

pub fn quick_connect_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/Enabled", get(quick_connect_enabled))
        .route("/Initiate", get(initiate_quick_connect))
        .route("/Connect", get(poll_quick_connect))
}

async fn quick_connect_enabled() -> Json<bool> {
    Json(false)
}

async fn initiate_quick_connect() -> ApiError {
    ApiError::Unauthorized("quick connect is disabled".to_string())
}

async fn poll_quick_connect() -> ApiError {
    ApiError::Unauthorized("quick connect is disabled".to_string())
}

/// GET /QuickConnect/Authorize?code=... is acknowledged but never
/// approved while the feature is off.
pub(super) async fn authorize_quick_connect(
    Extension(_session): Extension<AuthSession>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<bool>> {
    if query.get("code").is_none() {
        return Err(ApiError::bad_request("missing code"));
    }
    Ok(Json(false))
}

// =============================================================================
// Compatibility stubs
// =============================================================================

pub fn segment_routes() -> Router<Arc<AppState>> {
    Router::new().route("/:id", get(get_media_segments))
}

/// Intro/credit segment markers; none are detected.
async fn get_media_segments(Path(_id): Path<String>) -> Json<ItemsResponse> {
    Json(ItemsResponse::full(Vec::new()))
}

pub fn display_preferences_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/usersettings",
        get(get_display_preferences).post(update_display_preferences),
    )
}

async fn get_display_preferences(
    Extension(_session): Extension<AuthSession>,
    Query(query): Query<QueryMap>,
) -> Json<Value> {
    let client = query.get("client").cloned().unwrap_or_default();
    Json(json!({
        "Id": "usersettings",
        "SortBy": "SortName",
        "RememberIndexing": false,
        "PrimaryImageHeight": 250,
        "PrimaryImageWidth": 250,
        "CustomPrefs": {},
        "ScrollDirection": "Horizontal",
        "ShowBackdrop": true,
        "RememberSorting": false,
        "SortOrder": "Ascending",
        "ShowSidebar": false,
        "Client": client,
    }))
}

/// Preferences are accepted and forgotten; clients re-send them anyway.
async fn update_display_preferences(Extension(_session): Extension<AuthSession>) -> StatusCode {
    StatusCode::NO_CONTENT
}

pub(super) async fn get_plugins(Extension(_session): Extension<AuthSession>) -> Json<Vec<Value>> {
    Json(Vec::new())
}
