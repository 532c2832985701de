use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::dto::{ItemsResponse, JFItem};
use crate::api::error::{ApiError, ApiResult};
use crate::api::{filter, sort, AuthSession};
use crate::ids;
use crate::AppState;

pub fn person_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_persons))
        .route("/:name", get(get_person))
}

pub fn genre_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_genres))
        .route("/:name", get(get_genre))
}

pub fn studio_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_studios))
        .route("/:name", get(get_studio))
}

type QueryMap = HashMap<String, String>;

/// Path segment that may be a display name or an encoded entity ID.
/// Clients use both forms interchangeably.
fn name_of(segment: &str) -> String {
    match ids::classify(segment) {
        ids::ExternalId::Genre(raw)
        | ids::ExternalId::Studio(raw)
        | ids::ExternalId::Person(raw) => ids::decode_name(&raw).unwrap_or_else(|| segment.to_string()),
        _ => segment.to_string(),
    }
}

fn list_response(mut items: Vec<JFItem>, query: &QueryMap) -> ItemsResponse {
    items = filter::apply_filters(items, query);
    sort::apply_sort(&mut items, query);
    filter::paginate(items, query)
}

async fn get_persons(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<ItemsResponse>> {
    let projector = state.projector(&session);
    let items = state
        .library
        .persons()
        .values()
        .map(|p| projector.person(p))
        .collect();
    Ok(Json(list_response(items, &query)))
}

async fn get_person(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(segment): Path<String>,
) -> ApiResult<Json<JFItem>> {
    let name = name_of(&segment);
    let person = state
        .library
        .get_person_by_name(&name)
        .ok_or_else(|| ApiError::not_found("unknown person"))?;
    Ok(Json(state.projector(&session).person(&person)))
}

async fn get_genres(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<ItemsResponse>> {
    let projector = state.projector(&session);
    let items = state
        .library
        .genre_item_count()
        .iter()
        .map(|(name, count)| projector.genre(name, *count))
        .collect();
    Ok(Json(list_response(items, &query)))
}

async fn get_genre(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(segment): Path<String>,
) -> ApiResult<Json<JFItem>> {
    let name = name_of(&segment);
    let counts = state.library.genre_item_count();
    let count = counts
        .get(&name)
        .ok_or_else(|| ApiError::not_found("unknown genre"))?;
    Ok(Json(state.projector(&session).genre(&name, *count)))
}

async fn get_studios(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<ItemsResponse>> {
    let projector = state.projector(&session);
    let items = state
        .library
        .studio_item_count()
        .iter()
        .map(|(name, count)| projector.studio(name, *count))
        .collect();
    Ok(Json(list_response(items, &query)))
}

async fn get_studio(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(segment): Path<String>,
) -> ApiResult<Json<JFItem>> {
    let name = name_of(&segment);
    let counts = state.library.studio_item_count();
    let count = counts
        .get(&name)
        .ok_or_else(|| ApiError::not_found("unknown studio"))?;
    Ok(Json(state.projector(&session).studio(&name, *count)))
}
