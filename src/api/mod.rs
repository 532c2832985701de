use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{uri::Uri, HeaderMap},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::models::{AccessToken, User};
use crate::services::auth;
use crate::AppState;

pub mod dto;
pub mod error;
pub mod filter;
pub mod project;
pub mod sort;

mod branding;
mod images;
mod items;
mod localization;
mod persons;
mod playback;
mod playlists;
mod shows;
mod stubs;
mod system;
mod users;
mod videos;
mod views;

use error::ApiError;

/// Request identity attached by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token: AccessToken,
}

impl AppState {
    pub(crate) fn projector<'a>(&'a self, session: &'a AuthSession) -> project::Projector<'a> {
        project::Projector {
            library: &self.library,
            repo: self.repo.as_ref(),
            server_id: &self.server_id,
            user: &session.user,
        }
    }
}

/// The full application router with middleware applied.
pub fn router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/GetUtcTime", get(system::get_utc_time))
        .nest("/System", system::public_routes())
        .nest("/Users", users::public_routes())
        .nest("/Localization", localization::routes())
        .nest("/Branding", branding::routes())
        .nest("/QuickConnect", stubs::quick_connect_routes())
        // Some clients cannot attach credentials to media URLs, so
        // image and video GETs stay unauthenticated.
        .nest("/Videos", videos::routes())
        .merge(images::public_routes());

    let protected = Router::new()
        .nest("/System", system::routes())
        .nest("/Users", users::routes())
        .nest("/UserViews", views::routes())
        .nest("/Items", items::routes())
        .nest("/Shows", shows::routes())
        .nest("/Persons", persons::person_routes())
        .nest("/Genres", persons::genre_routes())
        .nest("/Studios", persons::studio_routes())
        .nest("/Sessions", playback::session_routes())
        .nest("/UserItems", items::user_items_routes())
        .nest("/UserPlayedItems", playback::played_routes())
        .nest("/UserFavoriteItems", playback::favorite_routes())
        .nest("/Playlists", playlists::routes())
        .nest("/Library", views::library_routes())
        .nest("/MediaSegments", stubs::segment_routes())
        .nest("/DisplayPreferences", stubs::display_preferences_routes())
        .route(
            "/QuickConnect/Authorize",
            get(stubs::authorize_quick_connect).post(stubs::authorize_quick_connect),
        )
        .route("/Plugins", get(stubs::get_plugins))
        .merge(users::legacy_user_routes())
        .merge(images::protected_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ))
        .route_layer(CompressionLayer::new());

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(middleware::from_fn(normalize_request))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Raw query pairs without percent-decoding. Good enough for token
/// lookup and key renaming; extractors decode later.
pub(crate) fn raw_query(uri: &Uri) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Some(q) = uri.query() {
        for pair in q.split('&') {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            map.insert(k.to_string(), v.to_string());
        }
    }
    map
}

/// Resolve the bearer token and attach the (user, token) pair. Runs on
/// every protected route before the handler.
async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let query = raw_query(req.uri());
    let token = auth::resolve_token(req.headers(), &query)
        .ok_or_else(|| ApiError::Unauthorized("missing access token".to_string()))?;
    let scheme = auth::parse_auth_scheme(req.headers());
    let remote_addr = remote_addr_of(req.headers());

    let (user, access) = auth::resolve_access_token(
        state.repo.as_ref(),
        &token,
        scheme.as_ref(),
        &remote_addr,
    )
    .await?;

    req.extensions_mut().insert(AuthSession {
        user,
        token: access,
    });
    Ok(next.run(req).await)
}

pub(crate) fn remote_addr_of(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Edge normalization, applied before routing:
/// 1. query parameter names get their first character lowercased
///    (clients disagree on `ParentId` vs `parentId`),
/// 2. the `fields` parameter is dropped (responses are always full),
/// 3. `/videos/...` path casing is canonicalized to `/Videos/...`.
async fn normalize_request(mut req: Request, next: Next) -> Response {
    let uri = req.uri();
    let path = normalize_path(uri.path());
    let query = uri.query().map(normalize_query_string);

    let path_and_query = match &query {
        Some(q) if !q.is_empty() => format!("{path}?{q}"),
        _ => path,
    };
    let mut parts = uri.clone().into_parts();
    if let Ok(pq) = path_and_query.parse() {
        parts.path_and_query = Some(pq);
        if let Ok(new_uri) = Uri::from_parts(parts) {
            *req.uri_mut() = new_uri;
        }
    }
    next.run(req).await
}

fn normalize_path(path: &str) -> String {
    let mut segments = path.splitn(3, '/');
    segments.next();
    if let Some(first) = segments.next() {
        if first.eq_ignore_ascii_case("videos") && first != "Videos" {
            let rest = segments.next().unwrap_or("");
            return if rest.is_empty() {
                "/Videos".to_string()
            } else {
                format!("/Videos/{rest}")
            };
        }
    }
    path.to_string()
}

fn normalize_query_string(query: &str) -> String {
    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let mut chars = key.chars();
            let key = match chars.next() {
                Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                None => return None,
            };
            if key == "fields" {
                return None;
            }
            Some(format!("{key}={value}"))
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_keys_get_first_char_lowercased() {
        assert_eq!(
            normalize_query_string("ParentId=abc&SortBy=SortName"),
            "parentId=abc&sortBy=SortName"
        );
    }

    #[test]
    fn fields_parameter_is_dropped() {
        assert_eq!(
            normalize_query_string("fields=Overview&Limit=5&Fields=Path"),
            "limit=5"
        );
    }

    #[test]
    fn video_path_casing_is_canonicalized() {
        assert_eq!(normalize_path("/videos/abc/stream"), "/Videos/abc/stream");
        assert_eq!(normalize_path("/VIDEOS/abc/stream"), "/Videos/abc/stream");
        assert_eq!(normalize_path("/Videos/abc/stream"), "/Videos/abc/stream");
        assert_eq!(normalize_path("/Items/videos"), "/Items/videos");
    }
}
