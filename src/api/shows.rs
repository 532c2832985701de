use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::dto::ItemsResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::{filter, AuthSession};
use crate::ids;
use crate::library::nextup;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/NextUp", get(get_next_up))
        .route("/:id/Seasons", get(get_seasons))
        .route("/:id/Episodes", get(get_episodes))
}

type QueryMap = HashMap<String, String>;

async fn get_seasons(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
) -> ApiResult<Json<ItemsResponse>> {
    let (_, show) = state
        .library
        .get_show_by_id(&id)
        .ok_or_else(|| ApiError::not_found("unknown series"))?;

    let projector = state.projector(&session);
    let mut seasons: Vec<_> = show.seasons.iter().collect();
    seasons.sort_by_key(|s| s.display_index());

    let mut items = Vec::with_capacity(seasons.len());
    for season in seasons {
        items.push(projector.season(show, season).await?);
    }
    Ok(Json(ItemsResponse::full(items)))
}

async fn get_episodes(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<ItemsResponse>> {
    let (_, show) = state
        .library
        .get_show_by_id(&id)
        .ok_or_else(|| ApiError::not_found("unknown series"))?;

    let wanted_season = match query.get("seasonId") {
        Some(season_id) => match ids::classify(season_id) {
            ids::ExternalId::Season(raw) => Some(
                show.season(&raw)
                    .ok_or_else(|| ApiError::not_found("unknown season"))?,
            ),
            _ => return Err(ApiError::bad_request("seasonId is not a season")),
        },
        None => None,
    };

    let projector = state.projector(&session);
    let mut items = Vec::new();
    match wanted_season {
        Some(season) => {
            for ep in &season.episodes {
                items.push(projector.episode(show, season, ep).await?);
            }
        }
        None => {
            let mut seasons: Vec<_> = show.seasons.iter().collect();
            seasons.sort_by_key(|s| s.display_index());
            for season in seasons {
                for ep in &season.episodes {
                    items.push(projector.episode(show, season, ep).await?);
                }
            }
        }
    }
    Ok(Json(filter::paginate(items, &query)))
}

/// Next unwatched episode per recently touched series. With `seriesId`
/// the full watch history of that one series is considered; without it
/// the walk is bounded by a small recency window.
async fn get_next_up(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Json<ItemsResponse>> {
    let watched = state
        .repo
        .get_recently_watched(&session.user.id, None, true)
        .await?;

    let series_id = query.get("seriesId").map(String::as_str);
    let episodes = nextup::next_up_in_collection(&state.library, &watched, series_id);

    let projector = state.projector(&session);
    let mut items = Vec::with_capacity(episodes.len());
    for ep in episodes {
        let (_, show, season, ep) = state
            .library
            .get_episode_by_id(&ep.common.id)
            .ok_or_else(|| ApiError::not_found("unknown episode"))?;
        items.push(projector.episode(show, season, ep).await?);
    }
    Ok(Json(filter::paginate(items, &query)))
}
