use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::dto::{ItemsResponse, JFItem};
use crate::api::error::{ApiError, ApiResult};
use crate::api::{filter, items, AuthSession};
use crate::ids;
use crate::models::Playlist;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_playlist))
        .route("/:id", get(get_playlist).post(update_playlist).delete(delete_playlist))
        .route(
            "/:id/Items",
            get(get_playlist_items)
                .post(add_playlist_items)
                .delete(remove_playlist_items),
        )
        .route(
            "/:id/Items/:item/Move/:index",
            get(move_playlist_item).post(move_playlist_item),
        )
        .route("/:id/Users", get(get_playlist_users))
        .route("/:id/Users/:user", get(get_playlist_user))
}

type QueryMap = HashMap<String, String>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreatePlaylistRequest {
    name: String,
    #[serde(default)]
    ids: Vec<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreatePlaylistResponse {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PlaylistUserPermissions {
    user_id: String,
    can_edit: bool,
}

/// Look up a playlist by its external ID, scoped to the caller.
async fn find_playlist(state: &AppState, session: &AuthSession, id: &str) -> ApiResult<Playlist> {
    let raw = match ids::classify(id) {
        ids::ExternalId::Playlist(raw) => raw,
        _ => return Err(ApiError::not_found("unknown playlist")),
    };
    Ok(state.repo.get_playlist(&session.user.id, &raw).await?)
}

async fn create_playlist(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Json(req): Json<CreatePlaylistRequest>,
) -> ApiResult<Json<CreatePlaylistResponse>> {
    if let Some(user_id) = &req.user_id {
        if user_id != &session.user.id {
            return Err(ApiError::Forbidden(
                "cannot create a playlist for another user".to_string(),
            ));
        }
    }
    let playlist = Playlist {
        id: Uuid::new_v4().simple().to_string(),
        user_id: session.user.id.clone(),
        name: req.name,
        item_ids: req.ids,
    };
    state.repo.create_playlist(&playlist).await?;
    tracing::info!(
        "Created playlist '{}' for user '{}'",
        playlist.name,
        session.user.name
    );
    Ok(Json(CreatePlaylistResponse {
        id: ids::playlist_id(&playlist.id),
    }))
}

async fn get_playlist(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
) -> ApiResult<Json<JFItem>> {
    let playlist = find_playlist(&state, &session, &id).await?;
    Ok(Json(state.projector(&session).playlist(&playlist)))
}

/// Rename and/or replace the item list in one shot.
async fn update_playlist(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
    Json(req): Json<CreatePlaylistRequest>,
) -> ApiResult<StatusCode> {
    let playlist = find_playlist(&state, &session, &id).await?;
    if !playlist.item_ids.is_empty() {
        state
            .repo
            .delete_playlist_items(&session.user.id, &playlist.id, &playlist.item_ids)
            .await?;
    }
    state
        .repo
        .add_items_to_playlist(&session.user.id, &playlist.id, &req.ids)
        .await?;
    state
        .repo
        .rename_playlist(&session.user.id, &playlist.id, &req.name)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_playlist(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let playlist = find_playlist(&state, &session, &id).await?;
    state
        .repo
        .delete_playlist(&session.user.id, &playlist.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_playlist_items(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<ItemsResponse>> {
    let playlist = find_playlist(&state, &session, &id).await?;
    let projector = state.projector(&session);
    let mut items = Vec::with_capacity(playlist.item_ids.len());
    for item_id in &playlist.item_ids {
        // Entries whose media has left the library are skipped, not errors.
        if let Some(item) = items::project_storage_id(&projector, item_id).await? {
            items.push(item);
        }
    }
    Ok(Json(filter::paginate(items, &query)))
}

fn id_list(query: &QueryMap, key: &str) -> Vec<String> {
    query
        .get(key)
        .map(|v| {
            v.split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

async fn add_playlist_items(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
    Query(query): Query<QueryMap>,
) -> ApiResult<StatusCode> {
    let playlist = find_playlist(&state, &session, &id).await?;
    let item_ids = id_list(&query, "ids");
    if !item_ids.is_empty() {
        state
            .repo
            .add_items_to_playlist(&session.user.id, &playlist.id, &item_ids)
            .await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_playlist_items(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
    Query(query): Query<QueryMap>,
) -> ApiResult<StatusCode> {
    let playlist = find_playlist(&state, &session, &id).await?;
    let entry_ids = id_list(&query, "entryIds");
    if !entry_ids.is_empty() {
        state
            .repo
            .delete_playlist_items(&session.user.id, &playlist.id, &entry_ids)
            .await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn move_playlist_item(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path((id, item_id, index)): Path<(String, String, u32)>,
) -> ApiResult<StatusCode> {
    let playlist = find_playlist(&state, &session, &id).await?;
    state
        .repo
        .move_playlist_item(&session.user.id, &playlist.id, &item_id, index)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_playlist_users(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<PlaylistUserPermissions>>> {
    let playlist = find_playlist(&state, &session, &id).await?;
    Ok(Json(vec![PlaylistUserPermissions {
        user_id: playlist.user_id,
        can_edit: true,
    }]))
}

async fn get_playlist_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path((id, user_id)): Path<(String, String)>,
) -> ApiResult<Json<PlaylistUserPermissions>> {
    let playlist = find_playlist(&state, &session, &id).await?;
    if playlist.user_id != user_id {
        return Err(ApiError::not_found("user has no access to this playlist"));
    }
    Ok(Json(PlaylistUserPermissions {
        user_id,
        can_edit: true,
    }))
}
