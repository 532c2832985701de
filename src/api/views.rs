use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::api::dto::{ItemsResponse, JFItem, NameIdPair};
use crate::api::error::ApiResult;
use crate::api::AuthSession;
use crate::ids;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_user_views))
        .route("/GroupingOptions", get(get_grouping_options))
}

pub fn library_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/VirtualFolders", get(get_virtual_folders))
        .route("/MediaFolders", get(get_media_folders))
        .route("/Refresh", post(refresh_library))
}

/// Root view: every collection plus the two virtual collections. The
/// virtual entries are always present, never optional.
pub(super) async fn build_user_views(
    state: &AppState,
    session: &AuthSession,
) -> ApiResult<Vec<JFItem>> {
    let projector = state.projector(session);
    let mut items = Vec::with_capacity(state.library.collections().len() + 2);
    for collection in state.library.collections() {
        items.push(projector.collection(collection).await?);
    }
    items.push(projector.favorites_view().await?);
    items.push(projector.playlists_view().await?);
    Ok(items)
}

async fn get_user_views(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
) -> ApiResult<Json<ItemsResponse>> {
    let items = build_user_views(&state, &session).await?;
    Ok(Json(ItemsResponse::full(items)))
}

pub(super) async fn get_user_views_legacy(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(_user_id): Path<String>,
) -> ApiResult<Json<ItemsResponse>> {
    let items = build_user_views(&state, &session).await?;
    Ok(Json(ItemsResponse::full(items)))
}

async fn get_grouping_options(
    State(state): State<Arc<AppState>>,
    Extension(_session): Extension<AuthSession>,
) -> Json<Vec<NameIdPair>> {
    Json(grouping_options(&state))
}

pub(super) async fn get_grouping_options_legacy(
    State(state): State<Arc<AppState>>,
    Extension(_session): Extension<AuthSession>,
    Path(_user_id): Path<String>,
) -> Json<Vec<NameIdPair>> {
    Json(grouping_options(&state))
}

fn grouping_options(state: &AppState) -> Vec<NameIdPair> {
    state
        .library
        .collections()
        .iter()
        .map(|c| NameIdPair {
            name: c.name.clone(),
            id: ids::collection_id(&c.id),
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct VirtualFolderInfo {
    name: String,
    item_id: String,
    collection_type: String,
    locations: Vec<String>,
}

async fn get_virtual_folders(
    State(state): State<Arc<AppState>>,
    Extension(_session): Extension<AuthSession>,
) -> Json<Vec<VirtualFolderInfo>> {
    let folders = state
        .library
        .collections()
        .iter()
        .map(|c| VirtualFolderInfo {
            name: c.name.clone(),
            item_id: ids::collection_id(&c.id),
            collection_type: c.kind.as_str().to_string(),
            locations: vec![c.root.to_string_lossy().into_owned()],
        })
        .collect();
    Json(folders)
}

async fn get_media_folders(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
) -> ApiResult<Json<ItemsResponse>> {
    let projector = state.projector(&session);
    let mut items = Vec::new();
    for collection in state.library.collections() {
        items.push(projector.collection(collection).await?);
    }
    Ok(Json(ItemsResponse::full(items)))
}

/// Rescans happen out of band; acknowledge and move on.
async fn refresh_library(Extension(_session): Extension<AuthSession>) -> StatusCode {
    StatusCode::NO_CONTENT
}
