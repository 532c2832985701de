use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::dto::{JFUserData, SessionInfo};
use crate::api::error::{ApiError, ApiResult};
use crate::api::AuthSession;
use crate::ids;
use crate::models::UserData;
use crate::repo::RepoError;
use crate::userdata;
use crate::AppState;

pub fn session_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_sessions))
        .route("/Playing", post(report_playing))
        .route("/Playing/Progress", post(report_progress))
        .route("/Playing/Stopped", post(report_stopped))
        .route("/Logout", post(logout))
        .route("/Capabilities", post(post_capabilities))
        .route("/Capabilities/Full", post(post_capabilities))
}

pub fn played_routes() -> Router<Arc<AppState>> {
    Router::new().route("/:id", post(mark_played).delete(mark_unplayed))
}

pub fn favorite_routes() -> Router<Arc<AppState>> {
    Router::new().route("/:id", post(favorite).delete(unfavorite))
}

/// Playable targets behind an external ID, with their durations.
/// Shows and seasons fan out to their episodes so a "mark watched" on
/// the folder level behaves the way clients expect.
fn resolve_targets(state: &AppState, id: &str) -> ApiResult<Vec<(String, Option<f64>)>> {
    match ids::classify(id) {
        ids::ExternalId::Episode(raw) => {
            let (_, _, _, ep) = state
                .library
                .get_episode_by_id(&raw)
                .ok_or_else(|| ApiError::not_found("unknown episode"))?;
            Ok(vec![(ep.common.id.clone(), ep.media.duration_secs)])
        }
        ids::ExternalId::Season(raw) => {
            let (_, _, season) = state
                .library
                .get_season_by_id(&raw)
                .ok_or_else(|| ApiError::not_found("unknown season"))?;
            Ok(season
                .episodes
                .iter()
                .map(|e| (e.common.id.clone(), e.media.duration_secs))
                .collect())
        }
        ids::ExternalId::Media(raw) => {
            match state.library.get_item_by_id(&raw) {
                Some((_, crate::models::Item::Movie(m))) => {
                    Ok(vec![(m.common.id.clone(), m.media.duration_secs)])
                }
                Some((_, crate::models::Item::Show(s))) => Ok(s
                    .episodes()
                    .map(|e| (e.common.id.clone(), e.media.duration_secs))
                    .collect()),
                None => {
                    // User data may refer to episodes by their bare ID.
                    let (_, _, _, ep) = state
                        .library
                        .get_episode_by_id(&raw)
                        .ok_or_else(|| ApiError::not_found("unknown item"))?;
                    Ok(vec![(ep.common.id.clone(), ep.media.duration_secs)])
                }
            }
        }
        _ => Err(ApiError::bad_request("item has no playback state")),
    }
}

async fn load_or_default(
    state: &AppState,
    user_id: &str,
    item_id: &str,
) -> ApiResult<UserData> {
    match state.repo.get_user_data(user_id, item_id).await {
        Ok(d) => Ok(d),
        Err(RepoError::NotFound) => Ok(UserData {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            ..Default::default()
        }),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PlaybackReport {
    item_id: String,
    #[serde(default)]
    position_ticks: i64,
}

async fn apply_report(
    state: &AppState,
    session: &AuthSession,
    report: &PlaybackReport,
) -> ApiResult<()> {
    let targets = resolve_targets(state, &report.item_id)?;
    let now = chrono::Utc::now().to_rfc3339();
    for (item_id, duration) in targets {
        let mut data = load_or_default(state, &session.user.id, &item_id).await?;
        userdata::apply_progress(&mut data, report.position_ticks, duration, false, now.clone());
        state.repo.update_user_data(&data).await?;
    }
    Ok(())
}

async fn report_playing(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Json(report): Json<PlaybackReport>,
) -> ApiResult<StatusCode> {
    apply_report(&state, &session, &report).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn report_progress(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Json(report): Json<PlaybackReport>,
) -> ApiResult<StatusCode> {
    apply_report(&state, &session, &report).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn report_stopped(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Json(report): Json<PlaybackReport>,
) -> ApiResult<StatusCode> {
    tracing::debug!(
        "Playback stopped for '{}' at {} ticks",
        report.item_id,
        report.position_ticks
    );
    apply_report(&state, &session, &report).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The UserData block of the item after the write, aggregates included.
async fn user_data_after(
    state: &AppState,
    session: &AuthSession,
    id: &str,
) -> ApiResult<JFUserData> {
    let item = state
        .projector(session)
        .by_external_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("unknown item"))?;
    Ok(item.user_data)
}

async fn set_played(
    state: &AppState,
    session: &AuthSession,
    id: &str,
    played: bool,
) -> ApiResult<JFUserData> {
    let targets = resolve_targets(state, id)?;
    let now = chrono::Utc::now().to_rfc3339();
    for (item_id, _) in targets {
        let mut data = load_or_default(state, &session.user.id, &item_id).await?;
        if played {
            userdata::apply_progress(&mut data, 0, None, true, now.clone());
        } else {
            data.position = 0.0;
            data.played_percentage = 0.0;
            data.played = false;
            data.updated_at = now.clone();
        }
        state.repo.update_user_data(&data).await?;
    }
    user_data_after(state, session, id).await
}

async fn set_favorite(
    state: &AppState,
    session: &AuthSession,
    id: &str,
    favorite: bool,
) -> ApiResult<JFUserData> {
    // Favorites apply to the item itself, never its children.
    let item_id = match ids::classify(id) {
        ids::ExternalId::Episode(raw) => raw,
        ids::ExternalId::Media(raw) => raw,
        _ => return Err(ApiError::bad_request("item cannot be a favorite")),
    };
    let mut data = load_or_default(state, &session.user.id, &item_id).await?;
    data.favorite = favorite;
    data.updated_at = chrono::Utc::now().to_rfc3339();
    state.repo.update_user_data(&data).await?;
    user_data_after(state, session, id).await
}

async fn mark_played(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
) -> ApiResult<Json<JFUserData>> {
    Ok(Json(set_played(&state, &session, &id, true).await?))
}

async fn mark_unplayed(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
) -> ApiResult<Json<JFUserData>> {
    Ok(Json(set_played(&state, &session, &id, false).await?))
}

async fn favorite(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
) -> ApiResult<Json<JFUserData>> {
    Ok(Json(set_favorite(&state, &session, &id, true).await?))
}

async fn unfavorite(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
) -> ApiResult<Json<JFUserData>> {
    Ok(Json(set_favorite(&state, &session, &id, false).await?))
}

// Legacy /Users/{userId}/... forms. Writes on behalf of another user
// are refused.

fn check_same_user(session: &AuthSession, user_id: &str) -> ApiResult<()> {
    if session.user.id != user_id {
        return Err(ApiError::Forbidden(
            "cannot modify another user's state".to_string(),
        ));
    }
    Ok(())
}

pub(super) async fn mark_played_legacy(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path((user_id, item_id)): Path<(String, String)>,
) -> ApiResult<Json<JFUserData>> {
    check_same_user(&session, &user_id)?;
    Ok(Json(set_played(&state, &session, &item_id, true).await?))
}

pub(super) async fn mark_unplayed_legacy(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path((user_id, item_id)): Path<(String, String)>,
) -> ApiResult<Json<JFUserData>> {
    check_same_user(&session, &user_id)?;
    Ok(Json(set_played(&state, &session, &item_id, false).await?))
}

pub(super) async fn favorite_legacy(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path((user_id, item_id)): Path<(String, String)>,
) -> ApiResult<Json<JFUserData>> {
    check_same_user(&session, &user_id)?;
    Ok(Json(set_favorite(&state, &session, &item_id, true).await?))
}

pub(super) async fn unfavorite_legacy(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path((user_id, item_id)): Path<(String, String)>,
) -> ApiResult<Json<JFUserData>> {
    check_same_user(&session, &user_id)?;
    Ok(Json(set_favorite(&state, &session, &item_id, false).await?))
}

async fn get_sessions(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
) -> ApiResult<Json<Vec<SessionInfo>>> {
    let tokens = state.repo.get_access_tokens(&session.user.id).await?;
    let sessions = tokens
        .into_iter()
        .map(|t| SessionInfo {
            id: t.token.clone(),
            user_id: t.user_id,
            user_name: session.user.name.clone(),
            client: t.client,
            application_version: t.client_version,
            device_name: t.device_name,
            device_id: t.device_id,
            remote_end_point: t.remote_addr,
            last_activity_date: Some(t.last_used),
        })
        .collect();
    Ok(Json(sessions))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
) -> ApiResult<StatusCode> {
    state
        .repo
        .delete_access_token(&session.token.token)
        .await?;
    tracing::info!("User '{}' logged out", session.user.name);
    Ok(StatusCode::NO_CONTENT)
}

async fn post_capabilities(Extension(_session): Extension<AuthSession>) -> StatusCode {
    StatusCode::NO_CONTENT
}
