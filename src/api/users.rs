use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::api::dto::{
    AuthenticateRequest, AuthenticationResult, SessionInfo, UserConfiguration, UserDto, UserPolicy,
};
use crate::api::error::{ApiError, ApiResult};
use crate::api::{items, playback, views, AuthSession};
use crate::models::{AccessToken, User};
use crate::repo::Repository;
use crate::services::auth;
use crate::AppState;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/AuthenticateByName", post(authenticate_by_name))
        .route(
            "/AuthenticateWithQuickConnect",
            post(authenticate_with_quick_connect),
        )
        .route("/Public", get(get_public_users))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_users))
        .route("/Me", get(get_current_user))
        .route("/:id", get(get_user))
}

/// Older clients scope everything under /Users/{userId}/...; the same
/// handlers serve both forms.
pub fn legacy_user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/Users/:userId/Views", get(views::get_user_views_legacy))
        .route(
            "/Users/:userId/GroupingOptions",
            get(views::get_grouping_options_legacy),
        )
        .route("/Users/:userId/Items", get(items::get_user_items_legacy))
        .route(
            "/Users/:userId/Items/Latest",
            get(items::get_latest_legacy),
        )
        .route(
            "/Users/:userId/Items/Resume",
            get(items::get_resume_legacy),
        )
        .route(
            "/Users/:userId/Items/Suggestions",
            get(items::get_suggestions_legacy),
        )
        .route(
            "/Users/:userId/Items/:itemId",
            get(items::get_user_item_legacy),
        )
        .route(
            "/Users/:userId/PlayedItems/:itemId",
            post(playback::mark_played_legacy).delete(playback::mark_unplayed_legacy),
        )
        .route(
            "/Users/:userId/FavoriteItems/:itemId",
            post(playback::favorite_legacy).delete(playback::unfavorite_legacy),
        )
}

pub(super) async fn user_dto(
    repo: &dyn Repository,
    server_id: &str,
    user: &User,
) -> ApiResult<UserDto> {
    let has_profile_image = repo.has_image(&user.id, "Primary").await?;
    Ok(UserDto {
        id: user.id.clone(),
        name: user.name.clone(),
        server_id: server_id.to_string(),
        has_password: true,
        has_configured_password: true,
        enable_auto_login: false,
        last_login_date: user.last_login.clone(),
        last_activity_date: user.last_used.clone(),
        primary_image_tag: has_profile_image.then(|| user.id.clone()),
        policy: UserPolicy {
            is_administrator: user.is_admin,
            ..Default::default()
        },
        configuration: UserConfiguration::default(),
    })
}

fn session_info(user: &User, token: &AccessToken) -> SessionInfo {
    SessionInfo {
        id: token.token.clone(),
        user_id: user.id.clone(),
        user_name: user.name.clone(),
        client: token.client.clone(),
        application_version: token.client_version.clone(),
        device_name: token.device_name.clone(),
        device_id: token.device_id.clone(),
        remote_end_point: token.remote_addr.clone(),
        last_activity_date: Some(token.last_used.clone()),
    }
}

async fn authenticate_by_name(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AuthenticateRequest>,
) -> ApiResult<Json<AuthenticationResult>> {
    let scheme = auth::parse_auth_scheme(&headers).unwrap_or_default();
    let remote_addr = super::remote_addr_of(&headers);

    let (user, token) = auth::authenticate_by_name(
        state.repo.as_ref(),
        &req.username,
        &req.pw,
        &scheme,
        &remote_addr,
        state.config.auth.auto_register,
    )
    .await?;

    tracing::info!("User '{}' authenticated from device '{}'", user.name, token.device_id);

    Ok(Json(AuthenticationResult {
        user: user_dto(state.repo.as_ref(), &state.server_id, &user).await?,
        session_info: session_info(&user, &token),
        access_token: token.token.clone(),
        server_id: state.server_id.clone(),
    }))
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QuickConnectAuthRequest {
    #[allow(dead_code)]
    secret: String,
}

/// Quick connect is disabled; no secret ever becomes a token.
async fn authenticate_with_quick_connect(Json(_req): Json<QuickConnectAuthRequest>) -> ApiError {
    ApiError::Unauthorized("quick connect is disabled".to_string())
}

async fn get_users(
    State(state): State<Arc<AppState>>,
    Extension(_session): Extension<AuthSession>,
) -> ApiResult<Json<Vec<UserDto>>> {
    let users = state.repo.get_users().await?;
    let mut dtos = Vec::with_capacity(users.len());
    for user in &users {
        dtos.push(user_dto(state.repo.as_ref(), &state.server_id, user).await?);
    }
    Ok(Json(dtos))
}

async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
) -> ApiResult<Json<UserDto>> {
    Ok(Json(
        user_dto(state.repo.as_ref(), &state.server_id, &session.user).await?,
    ))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserDto>> {
    if id != session.user.id && !session.user.is_admin {
        return Err(ApiError::Forbidden("cannot view other users".to_string()));
    }
    let user = state.repo.get_user_by_id(&id).await?;
    Ok(Json(
        user_dto(state.repo.as_ref(), &state.server_id, &user).await?,
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PublicUserDto {
    id: String,
    name: String,
    server_id: String,
    has_password: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_image_tag: Option<String>,
}

async fn get_public_users(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<PublicUserDto>>> {
    let users = state.repo.get_users().await?;
    let mut dtos = Vec::with_capacity(users.len());
    for user in users {
        let has_image = state.repo.has_image(&user.id, "Primary").await?;
        dtos.push(PublicUserDto {
            id: user.id.clone(),
            name: user.name,
            server_id: state.server_id.clone(),
            has_password: true,
            primary_image_tag: has_image.then(|| user.id),
        });
    }
    Ok(Json(dtos))
}
