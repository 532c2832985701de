use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::dto::{ItemsResponse, JFItem, NameIdPair};
use crate::api::error::{ApiError, ApiResult};
use crate::api::project::Projector;
use crate::api::{filter, sort, views, AuthSession};
use crate::ids;
use crate::library::similar;
use crate::models::Item;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_items))
        .route("/Counts", get(get_item_counts))
        .route("/Filters", get(get_item_filters))
        .route("/Filters2", get(get_item_filters2))
        .route("/Latest", get(get_latest))
        .route("/Suggestions", get(get_suggestions))
        .route("/Root", get(get_root))
        .route("/:id", get(get_item).delete(delete_item))
        .route("/:id/Similar", get(get_similar))
        .route("/:id/Ancestors", get(get_ancestors))
        .route("/:id/PlaybackInfo", get(get_playback_info).post(get_playback_info))
        .route("/:id/SpecialFeatures", get(empty_item_array))
        .route("/:id/ThemeMedia", get(get_theme_media))
        .route("/:id/Intros", get(empty_items_response))
        .route("/:id/LocalTrailers", get(empty_item_array))
        .route("/:id/Images", get(get_image_infos))
        .route("/:id/RemoteImages", get(get_remote_images))
        .route("/:id/RemoteImages/Providers", get(empty_provider_array))
}

pub fn user_items_routes() -> Router<Arc<AppState>> {
    Router::new().route("/Resume", get(get_resume))
}

type QueryMap = HashMap<String, String>;

fn wants_type(query: &QueryMap, item_type: &str) -> bool {
    query
        .get("includeItemTypes")
        .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(item_type)))
        .unwrap_or(false)
}

fn is_recursive(query: &QueryMap) -> bool {
    query
        .get("recursive")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Project an ID as stored in user data: bare movie/show IDs, bare
/// episode IDs. Wire-prefixed IDs fall through to the full dispatch.
pub(super) async fn project_storage_id(
    projector: &Projector<'_>,
    id: &str,
) -> ApiResult<Option<JFItem>> {
    if let Some((collection, item)) = projector.library.get_item_by_id(id) {
        return Ok(Some(projector.item(collection, item).await?));
    }
    if let Some((_, show, season, ep)) = projector.library.get_episode_by_id(id) {
        return Ok(Some(projector.episode(show, season, ep).await?));
    }
    Ok(projector.by_external_id(id).await?)
}

/// Resolve the candidate set for /Items before filtering. The
/// `parentId` prefix picks the branch; no parent means the whole
/// library.
async fn collect_scope(
    state: &AppState,
    session: &AuthSession,
    query: &QueryMap,
) -> ApiResult<Vec<JFItem>> {
    let projector = state.projector(session);

    if let Some(term) = query.get("searchTerm") {
        let mut out = Vec::new();
        for (collection, item) in state.library.search_item(term) {
            out.push(projector.item(collection, item).await?);
        }
        for person in state.library.search_person(term) {
            out.push(projector.person(&person));
        }
        return Ok(out);
    }

    let recursive = is_recursive(query);
    let with_seasons = recursive || wants_type(query, "Season");
    let with_episodes = recursive || wants_type(query, "Episode");

    let mut out = Vec::new();
    match query.get("parentId").map(String::as_str) {
        None => {
            for collection in state.library.collections() {
                collect_collection(&projector, collection, with_seasons, with_episodes, &mut out)
                    .await?;
            }
        }
        Some(parent) => match ids::classify(parent) {
            ids::ExternalId::Root(_) => {
                out = views::build_user_views(state, session).await?;
            }
            ids::ExternalId::FavoritesView(_) => {
                for id in state.repo.get_favorites(&session.user.id).await? {
                    if let Some(item) = project_storage_id(&projector, &id).await? {
                        out.push(item);
                    }
                }
            }
            ids::ExternalId::PlaylistView(_) => {
                for playlist in state.repo.get_playlists(&session.user.id).await? {
                    out.push(projector.playlist(&playlist));
                }
            }
            ids::ExternalId::Collection(raw) => {
                let collection = state
                    .library
                    .get_collection(&raw)
                    .ok_or_else(|| ApiError::not_found("unknown collection"))?;
                collect_collection(&projector, collection, with_seasons, with_episodes, &mut out)
                    .await?;
            }
            ids::ExternalId::Playlist(raw) => {
                let playlist = state.repo.get_playlist(&session.user.id, &raw).await?;
                for id in &playlist.item_ids {
                    if let Some(item) = project_storage_id(&projector, id).await? {
                        out.push(item);
                    }
                }
            }
            ids::ExternalId::Season(raw) => {
                let (_, show, season) = state
                    .library
                    .get_season_by_id(&raw)
                    .ok_or_else(|| ApiError::not_found("unknown season"))?;
                for ep in &season.episodes {
                    out.push(projector.episode(show, season, ep).await?);
                }
            }
            ids::ExternalId::Media(raw) => {
                // A show as parent yields its seasons (episodes too when
                // recursive); movies have no children.
                if let Some((_, show)) = state.library.get_show_by_id(&raw) {
                    for season in &show.seasons {
                        out.push(projector.season(show, season).await?);
                        if recursive || with_episodes {
                            for ep in &season.episodes {
                                out.push(projector.episode(show, season, ep).await?);
                            }
                        }
                    }
                }
            }
            _ => {}
        },
    }
    Ok(out)
}

async fn collect_collection(
    projector: &Projector<'_>,
    collection: &crate::models::Collection,
    with_seasons: bool,
    with_episodes: bool,
    out: &mut Vec<JFItem>,
) -> ApiResult<()> {
    for item in &collection.items {
        out.push(projector.item(collection, item).await?);
        if let Item::Show(show) = item {
            for season in &show.seasons {
                if with_seasons {
                    out.push(projector.season(show, season).await?);
                }
                if with_episodes {
                    for ep in &season.episodes {
                        out.push(projector.episode(show, season, ep).await?);
                    }
                }
            }
        }
    }
    Ok(())
}

async fn run_query(
    state: &AppState,
    session: &AuthSession,
    query: &QueryMap,
) -> ApiResult<ItemsResponse> {
    let items = collect_scope(state, session, query).await?;
    let mut items = filter::apply_filters(items, query);
    sort::apply_sort(&mut items, query);
    Ok(filter::paginate(items, query))
}

async fn get_items(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<ItemsResponse>> {
    Ok(Json(run_query(&state, &session, &query).await?))
}

pub(super) async fn get_user_items_legacy(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(_user_id): Path<String>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<ItemsResponse>> {
    Ok(Json(run_query(&state, &session, &query).await?))
}

async fn resolve_item(
    state: &AppState,
    session: &AuthSession,
    id: &str,
) -> ApiResult<JFItem> {
    // Name-encoded IDs that do not decode are malformed, not missing.
    match ids::classify(id) {
        ids::ExternalId::Genre(raw)
        | ids::ExternalId::Studio(raw)
        | ids::ExternalId::Person(raw) => {
            if ids::decode_name(&raw).is_none() {
                return Err(ApiError::bad_request("undecodable item id"));
            }
        }
        _ => {}
    }
    state
        .projector(session)
        .by_external_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("unknown item"))
}

async fn get_item(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
) -> ApiResult<Json<JFItem>> {
    Ok(Json(resolve_item(&state, &session, &id).await?))
}

pub(super) async fn get_user_item_legacy(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path((_user_id, id)): Path<(String, String)>,
) -> ApiResult<Json<JFItem>> {
    Ok(Json(resolve_item(&state, &session, &id).await?))
}

/// Media deletion is not supported over the API.
async fn delete_item(
    Extension(_session): Extension<AuthSession>,
    Path(_id): Path<String>,
) -> ApiError {
    ApiError::Forbidden("item deletion is not supported".to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ItemCounts {
    movie_count: i32,
    series_count: i32,
    episode_count: i32,
    artist_count: i32,
    program_count: i32,
    trailer_count: i32,
    song_count: i32,
    album_count: i32,
    music_video_count: i32,
    box_set_count: i32,
    book_count: i32,
    item_count: i32,
}

async fn get_item_counts(
    State(state): State<Arc<AppState>>,
    Extension(_session): Extension<AuthSession>,
) -> Json<ItemCounts> {
    let mut movies = 0;
    let mut series = 0;
    let mut episodes = 0;
    for (_, item) in state.library.items() {
        match item {
            Item::Movie(_) => movies += 1,
            Item::Show(show) => {
                series += 1;
                episodes += show.episode_count() as i32;
            }
        }
    }
    Json(ItemCounts {
        movie_count: movies,
        series_count: series,
        episode_count: episodes,
        artist_count: 0,
        program_count: 0,
        trailer_count: 0,
        song_count: 0,
        album_count: 0,
        music_video_count: 0,
        box_set_count: 0,
        book_count: 0,
        item_count: movies + series + episodes,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueryFilters {
    genres: Vec<String>,
    tags: Vec<String>,
    official_ratings: Vec<String>,
    years: Vec<i32>,
}

fn scoped_details(state: &AppState, query: &QueryMap) -> crate::library::Details {
    match query.get("parentId").map(|p| ids::classify(p)) {
        Some(ids::ExternalId::Collection(raw)) => state
            .library
            .get_collection(&raw)
            .map(|c| state.library.collection_details(c))
            .unwrap_or_default(),
        _ => state.library.details(),
    }
}

async fn get_item_filters(
    State(state): State<Arc<AppState>>,
    Extension(_session): Extension<AuthSession>,
    Query(query): Query<QueryMap>,
) -> Json<QueryFilters> {
    let details = scoped_details(&state, &query);
    Json(QueryFilters {
        genres: details.genres,
        tags: details.tags,
        official_ratings: details.official_ratings,
        years: details.years,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueryFilters2 {
    genres: Vec<NameIdPair>,
    tags: Vec<String>,
}

async fn get_item_filters2(
    State(state): State<Arc<AppState>>,
    Extension(_session): Extension<AuthSession>,
    Query(query): Query<QueryMap>,
) -> Json<QueryFilters2> {
    let details = scoped_details(&state, &query);
    Json(QueryFilters2 {
        genres: details
            .genres
            .into_iter()
            .map(|name| NameIdPair {
                id: ids::genre_id(&name),
                name,
            })
            .collect(),
        tags: details.tags,
    })
}

async fn latest_items(
    state: &AppState,
    session: &AuthSession,
    query: &QueryMap,
) -> ApiResult<Vec<JFItem>> {
    let items = collect_scope(state, session, query).await?;
    let mut items = filter::apply_filters(items, query);
    items.sort_by(|a, b| b.date_created.cmp(&a.date_created));
    let limit = query
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(16);
    items.truncate(limit);
    Ok(items)
}

/// Latest replies with a bare array, unlike every other list endpoint.
async fn get_latest(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<Vec<JFItem>>> {
    Ok(Json(latest_items(&state, &session, &query).await?))
}

pub(super) async fn get_latest_legacy(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(_user_id): Path<String>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<Vec<JFItem>>> {
    Ok(Json(latest_items(&state, &session, &query).await?))
}

async fn suggestions(
    state: &AppState,
    session: &AuthSession,
    query: &QueryMap,
) -> ApiResult<ItemsResponse> {
    let mut query = query.clone();
    query.insert("sortBy".to_string(), "Random".to_string());
    run_query(state, session, &query).await
}

async fn get_suggestions(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<ItemsResponse>> {
    Ok(Json(suggestions(&state, &session, &query).await?))
}

pub(super) async fn get_suggestions_legacy(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(_user_id): Path<String>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<ItemsResponse>> {
    Ok(Json(suggestions(&state, &session, &query).await?))
}

async fn get_root(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
) -> ApiResult<Json<JFItem>> {
    Ok(Json(state.projector(&session).root().await?))
}

/// In-progress items, most recent first.
async fn resume_items(
    state: &AppState,
    session: &AuthSession,
    query: &QueryMap,
) -> ApiResult<ItemsResponse> {
    let projector = state.projector(session);
    let ids = state
        .repo
        .get_recently_watched(&session.user.id, None, false)
        .await?;
    let mut items = Vec::new();
    for id in ids {
        if let Some(item) = project_storage_id(&projector, &id).await? {
            items.push(item);
        }
    }
    let items = filter::apply_filters(items, query);
    Ok(filter::paginate(items, query))
}

async fn get_resume(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<ItemsResponse>> {
    Ok(Json(resume_items(&state, &session, &query).await?))
}

pub(super) async fn get_resume_legacy(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(_user_id): Path<String>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<ItemsResponse>> {
    Ok(Json(resume_items(&state, &session, &query).await?))
}

async fn get_similar(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<ItemsResponse>> {
    let (collection, item) = state
        .library
        .get_item_by_id(&id)
        .ok_or_else(|| ApiError::not_found("unknown item"))?;

    let projector = state.projector(&session);
    let mut items = Vec::new();
    for neighbor in similar::similar(collection, item) {
        items.push(projector.item(collection, neighbor).await?);
    }
    Ok(Json(filter::paginate(items, &query)))
}

/// Parent chain, nearest first, ending at the root folder.
async fn get_ancestors(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<JFItem>>> {
    let projector = state.projector(&session);
    let mut chain = Vec::new();

    match ids::classify(&id) {
        ids::ExternalId::Episode(raw) => {
            let (collection, show, season, _) = state
                .library
                .get_episode_by_id(&raw)
                .ok_or_else(|| ApiError::not_found("unknown episode"))?;
            chain.push(projector.season(show, season).await?);
            chain.push(projector.show(collection, show).await?);
            chain.push(projector.collection(collection).await?);
        }
        ids::ExternalId::Season(raw) => {
            let (collection, show, _) = state
                .library
                .get_season_by_id(&raw)
                .ok_or_else(|| ApiError::not_found("unknown season"))?;
            chain.push(projector.show(collection, show).await?);
            chain.push(projector.collection(collection).await?);
        }
        ids::ExternalId::Media(raw) => {
            let (collection, _) = state
                .library
                .get_item_by_id(&raw)
                .ok_or_else(|| ApiError::not_found("unknown item"))?;
            chain.push(projector.collection(collection).await?);
        }
        ids::ExternalId::Collection(_) => {}
        ids::ExternalId::Playlist(_) => {
            chain.push(projector.playlists_view().await?);
        }
        _ => return Err(ApiError::not_found("unknown item")),
    }
    chain.push(projector.root().await?);
    Ok(Json(chain))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PlaybackInfoResponse {
    media_sources: Vec<crate::api::dto::JFMediaSource>,
    play_session_id: String,
}

async fn get_playback_info(
    State(state): State<Arc<AppState>>,
    Extension(_session): Extension<AuthSession>,
    Path(id): Path<String>,
) -> ApiResult<Json<PlaybackInfoResponse>> {
    let (item_id, name, media) = match ids::classify(&id) {
        ids::ExternalId::Episode(raw) => {
            let (_, _, _, ep) = state
                .library
                .get_episode_by_id(&raw)
                .ok_or_else(|| ApiError::not_found("unknown episode"))?;
            (ep.common.id.clone(), ep.common.name.clone(), &ep.media)
        }
        ids::ExternalId::Media(raw) => {
            let (_, movie) = state
                .library
                .get_movie_by_id(&raw)
                .ok_or_else(|| ApiError::not_found("unknown item"))?;
            (
                movie.common.id.clone(),
                movie.common.name.clone(),
                &movie.media,
            )
        }
        _ => return Err(ApiError::not_found("item is not playable")),
    };

    Ok(Json(PlaybackInfoResponse {
        media_sources: vec![crate::api::project::media_source(&item_id, &name, media)],
        play_session_id: uuid::Uuid::new_v4().to_string(),
    }))
}

// Stubs clients probe for; empty answers keep them quiet.

async fn empty_item_array() -> Json<Vec<JFItem>> {
    Json(Vec::new())
}

async fn empty_items_response() -> Json<ItemsResponse> {
    Json(ItemsResponse::full(Vec::new()))
}

async fn empty_provider_array() -> Json<Vec<serde_json::Value>> {
    Json(Vec::new())
}

async fn get_image_infos() -> Json<Vec<serde_json::Value>> {
    Json(Vec::new())
}

async fn get_theme_media() -> Json<serde_json::Value> {
    let empty = serde_json::json!({
        "Items": [],
        "TotalRecordCount": 0,
        "StartIndex": 0,
    });
    Json(serde_json::json!({
        "ThemeVideosResult": empty,
        "ThemeSongsResult": empty,
        "SoundtrackSongsResult": empty,
    }))
}

async fn get_remote_images() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "Images": [],
        "TotalRecordCount": 0,
        "Providers": [],
    }))
}
