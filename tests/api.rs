// End-to-end tests against the full router: a scanned temp library,
// an in-memory database, and real request/response cycles.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;
use tower::ServiceExt;

use finbridge::config::{AppConfig, LibraryConfig};
use finbridge::db::{self, SqliteRepository};
use finbridge::models::User;
use finbridge::repo::Repository;
use finbridge::services::auth;
use finbridge::{api, scanner, AppState};

struct TestServer {
    app: Router,
    _media: TempDir,
}

fn touch(path: &Path) {
    fs::write(path, b"x").unwrap();
}

/// Two movies, one show with two seasons plus specials.
fn build_media_tree(root: &Path) -> (LibraryConfig, LibraryConfig) {
    let movies = root.join("movies");
    let shows = root.join("shows");

    let matrix = movies.join("The Matrix (1999)");
    fs::create_dir_all(&matrix).unwrap();
    touch(&matrix.join("The Matrix.mkv"));
    touch(&movies.join("Heat (1995).mp4"));

    let show = shows.join("Orbit City");
    for (dir, file) in [
        ("Season 1", "Orbit City S01E01.mkv"),
        ("Season 1", "Orbit City S01E02.mkv"),
        ("Season 1", "Orbit City S01E03.mkv"),
        ("Season 2", "Orbit City S02E01.mkv"),
        ("Specials", "Orbit City S00E01.mkv"),
    ] {
        let season_dir = show.join(dir);
        fs::create_dir_all(&season_dir).unwrap();
        touch(&season_dir.join(file));
    }

    (
        LibraryConfig {
            name: "Movies".to_string(),
            path: movies,
            kind: "movies".to_string(),
        },
        LibraryConfig {
            name: "Shows".to_string(),
            path: shows,
            kind: "tvshows".to_string(),
        },
    )
}

async fn spawn() -> TestServer {
    let media = tempfile::tempdir().unwrap();
    let (movies, shows) = build_media_tree(media.path());
    let library = scanner::scan_libraries(&[movies, shows]).unwrap();

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::migrate(&pool).await.unwrap();
    let repo: Arc<dyn Repository> = Arc::new(SqliteRepository::new(pool));

    let alice = User {
        id: "user-alice".to_string(),
        name: "alice".to_string(),
        password_hash: auth::hash_password("secret").unwrap(),
        is_admin: false,
        created_at: chrono::Utc::now().to_rfc3339(),
        last_login: None,
        last_used: None,
    };
    repo.upsert_user(&alice).await.unwrap();

    let state = Arc::new(AppState {
        library,
        repo,
        config: AppConfig::default(),
        server_id: "srv1".to_string(),
    });
    TestServer {
        app: api::router(state),
        _media: media,
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

async fn login(app: &Router) -> String {
    let req = Request::post("/Users/AuthenticateByName")
        .header(
            "x-emby-authorization",
            "MediaBrowser Client=\"harness\", Device=\"ci\", DeviceId=\"ci-1\", Version=\"1.0\"",
        )
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"Username": "alice", "Pw": "secret"}).to_string(),
        ))
        .unwrap();
    let (status, _, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    body["AccessToken"].as_str().unwrap().to_string()
}

async fn get(app: &Router, token: &str, uri: &str) -> (StatusCode, Value) {
    let req = Request::get(uri)
        .header("x-emby-token", token)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app, req).await;
    (status, body)
}

async fn post_json(app: &Router, token: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::post(uri)
        .header("x-emby-token", token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _, body) = send(app, req).await;
    (status, body)
}

async fn post_empty(app: &Router, token: &str, uri: &str) -> (StatusCode, Value) {
    let req = Request::post(uri)
        .header("x-emby-token", token)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app, req).await;
    (status, body)
}

/// The single show's bare ID, found by browsing the tvshows view.
async fn find_series_id(app: &Router, token: &str) -> String {
    let (_, views) = get(app, token, "/UserViews").await;
    let shows_view = views["Items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|v| v["CollectionType"] == "tvshows")
        .expect("tvshows view");
    let (status, body) = get(
        app,
        token,
        &format!("/Items?parentId={}", shows_view["Id"].as_str().unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let series = &body["Items"].as_array().unwrap()[0];
    assert_eq!(series["Type"], "Series");
    series["Id"].as_str().unwrap().to_string()
}

/// Episode IDs of season 1, in episode order.
async fn season_one_episode_ids(app: &Router, token: &str, series_id: &str) -> Vec<String> {
    let (_, seasons) = get(app, token, &format!("/Shows/{series_id}/Seasons")).await;
    let season_one = seasons["Items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["IndexNumber"] == 1)
        .expect("season 1");
    let (status, body) = get(
        app,
        token,
        &format!(
            "/Shows/{series_id}/Episodes?seasonId={}",
            season_one["Id"].as_str().unwrap()
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["Items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["Id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn login_returns_token_and_user() {
    let server = spawn().await;
    let req = Request::post("/Users/AuthenticateByName")
        .header(
            "x-emby-authorization",
            "MediaBrowser Client=\"harness\", Device=\"ci\", DeviceId=\"ci-1\", Version=\"1.0\"",
        )
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"Username": "Alice", "Pw": "secret"}).to_string(),
        ))
        .unwrap();
    let (status, _, body) = send(&server.app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body["AccessToken"].as_str().unwrap().is_empty());
    assert_eq!(body["ServerId"], "srv1");
    assert_eq!(body["User"]["Name"], "alice");
    assert_eq!(body["SessionInfo"]["DeviceId"], "ci-1");
}

#[tokio::test]
async fn bad_password_is_rejected() {
    let server = spawn().await;
    let (status, body) = post_json(
        &server.app,
        "",
        "/Users/AuthenticateByName",
        json!({"Username": "alice", "Pw": "wrong"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn missing_token_yields_problem_details() {
    let server = spawn().await;
    let (status, body) = get(&server.app, "", "/UserViews").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
    assert_eq!(
        body["type"],
        "https://tools.ietf.org/html/rfc9110#section-15.5.2"
    );
    assert!(!body["title"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn wrong_method_is_405() {
    let server = spawn().await;
    let token = login(&server.app).await;
    let req = Request::delete("/UserViews")
        .header("x-emby-token", &token)
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&server.app, req).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn root_views_contain_collections_and_virtual_views() {
    let server = spawn().await;
    let token = login(&server.app).await;
    let (status, body) = get(&server.app, &token, "/UserViews").await;

    assert_eq!(status, StatusCode::OK);
    let items = body["Items"].as_array().unwrap();
    assert_eq!(items.len(), 4);
    assert_eq!(body["TotalRecordCount"], 4);

    let names: Vec<&str> = items.iter().map(|i| i["Name"].as_str().unwrap()).collect();
    assert!(names.contains(&"Movies"));
    assert!(names.contains(&"Shows"));
    assert!(names.contains(&"Favorites"));
    assert!(names.contains(&"Playlists"));

    let favorites = items.iter().find(|i| i["Name"] == "Favorites").unwrap();
    assert!(favorites["Id"]
        .as_str()
        .unwrap()
        .starts_with("collectionfavorites_"));
    let playlists = items.iter().find(|i| i["Name"] == "Playlists").unwrap();
    assert!(playlists["Id"]
        .as_str()
        .unwrap()
        .starts_with("collectionplaylist_"));
}

#[tokio::test]
async fn specials_season_sorts_last_with_index_99() {
    let server = spawn().await;
    let token = login(&server.app).await;
    let series_id = find_series_id(&server.app, &token).await;

    let (status, body) = get(&server.app, &token, &format!("/Shows/{series_id}/Seasons")).await;
    assert_eq!(status, StatusCode::OK);

    let seasons = body["Items"].as_array().unwrap();
    assert_eq!(seasons.len(), 3);
    let indexes: Vec<i64> = seasons
        .iter()
        .map(|s| s["IndexNumber"].as_i64().unwrap())
        .collect();
    assert_eq!(indexes, vec![1, 2, 99]);

    let specials = &seasons[2];
    assert_eq!(specials["Name"], "Specials");
    assert_eq!(specials["SortName"], "9999");
    assert_eq!(specials["Type"], "Season");
}

#[tokio::test]
async fn progress_reports_resume_then_promote_to_played() {
    let server = spawn().await;
    let token = login(&server.app).await;
    let series_id = find_series_id(&server.app, &token).await;
    let episodes = season_one_episode_ids(&server.app, &token, &series_id).await;
    let episode = &episodes[0];

    // One minute in: a resume point, not played.
    let (status, _) = post_json(
        &server.app,
        &token,
        "/Sessions/Playing/Progress",
        json!({"ItemId": episode, "PositionTicks": 600_000_000_i64}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, item) = get(&server.app, &token, &format!("/Items/{episode}")).await;
    assert_eq!(item["UserData"]["PlaybackPositionTicks"], 600_000_000_i64);
    assert_eq!(item["UserData"]["Played"], false);
    // No sidecar duration, so the one hour fallback applies.
    let pct = item["UserData"]["PlayedPercentage"].as_f64().unwrap();
    assert!((pct - 100.0 * 60.0 / 3600.0).abs() < 0.01);

    // 99% in: crosses the threshold, position resets.
    let (status, _) = post_json(
        &server.app,
        &token,
        "/Sessions/Playing/Progress",
        json!({"ItemId": episode, "PositionTicks": 35_640_000_000_i64}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, item) = get(&server.app, &token, &format!("/Items/{episode}")).await;
    assert_eq!(item["UserData"]["Played"], true);
    assert_eq!(item["UserData"]["PlaybackPositionTicks"], 0);
}

#[tokio::test]
async fn next_up_advances_past_watched_episodes() {
    let server = spawn().await;
    let token = login(&server.app).await;
    let series_id = find_series_id(&server.app, &token).await;
    let episodes = season_one_episode_ids(&server.app, &token, &series_id).await;
    assert_eq!(episodes.len(), 3);

    for episode in &episodes[..2] {
        let (status, body) =
            post_empty(&server.app, &token, &format!("/UserPlayedItems/{episode}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Played"], true);
    }

    let (status, body) = get(
        &server.app,
        &token,
        &format!("/Shows/NextUp?seriesId={series_id}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = body["Items"].as_array().unwrap();
    assert!(!items.is_empty());
    assert_eq!(items[0]["IndexNumber"], 3);
    assert_eq!(items[0]["Id"].as_str().unwrap(), episodes[2]);
}

#[tokio::test]
async fn redirect_image_tags_are_302_with_month_cache() {
    let server = spawn().await;
    let uri = "/Items/anything/Images/Primary?tag=redirect_https%3A%2F%2Fcdn.example%2Fp.jpg";
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let (status, headers, _) = send(&server.app, req).await;

    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(
        headers.get(header::LOCATION).unwrap(),
        "https://cdn.example/p.jpg"
    );
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=2592000"
    );
}

#[tokio::test]
async fn favorites_round_trip() {
    let server = spawn().await;
    let token = login(&server.app).await;
    let series_id = find_series_id(&server.app, &token).await;
    let episodes = season_one_episode_ids(&server.app, &token, &series_id).await;
    let episode = &episodes[0];

    let (status, body) =
        post_empty(&server.app, &token, &format!("/UserFavoriteItems/{episode}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["IsFavorite"], true);

    let (_, item) = get(&server.app, &token, &format!("/Items/{episode}")).await;
    assert_eq!(item["UserData"]["IsFavorite"], true);

    let req = Request::delete(format!("/UserFavoriteItems/{episode}"))
        .header("x-emby-token", &token)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&server.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["IsFavorite"], false);
}

#[tokio::test]
async fn playlists_create_add_and_list() {
    let server = spawn().await;
    let token = login(&server.app).await;
    let series_id = find_series_id(&server.app, &token).await;
    let episodes = season_one_episode_ids(&server.app, &token, &series_id).await;

    let (status, body) = post_json(
        &server.app,
        &token,
        "/Playlists",
        json!({"Name": "Weekend", "Ids": [episodes[0], episodes[1]]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let playlist_id = body["Id"].as_str().unwrap().to_string();
    assert!(playlist_id.starts_with("playlist_"));

    let (status, body) = get(
        &server.app,
        &token,
        &format!("/Playlists/{playlist_id}/Items"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["TotalRecordCount"], 2);
    assert_eq!(body["Items"][0]["Id"].as_str().unwrap(), episodes[0]);
}

#[tokio::test]
async fn playlist_move_via_get_reorders_items() {
    let server = spawn().await;
    let token = login(&server.app).await;
    let series_id = find_series_id(&server.app, &token).await;
    let episodes = season_one_episode_ids(&server.app, &token, &series_id).await;

    let (status, body) = post_json(
        &server.app,
        &token,
        "/Playlists",
        json!({"Name": "Reorder", "Ids": [episodes[0], episodes[1]]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let playlist_id = body["Id"].as_str().unwrap().to_string();

    let (status, _) = get(
        &server.app,
        &token,
        &format!("/Playlists/{playlist_id}/Items/{}/Move/1", episodes[0]),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = get(
        &server.app,
        &token,
        &format!("/Playlists/{playlist_id}/Items"),
    )
    .await;
    assert_eq!(body["Items"][0]["Id"].as_str().unwrap(), episodes[1]);
    assert_eq!(body["Items"][1]["Id"].as_str().unwrap(), episodes[0]);
}

#[tokio::test]
async fn quick_connect_reports_disabled() {
    let server = spawn().await;

    let req = Request::get("/QuickConnect/Enabled")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&server.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Bool(false));

    let req = Request::get("/QuickConnect/Initiate")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&server.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn quick_connect_authorize_accepts_get() {
    let server = spawn().await;
    let token = login(&server.app).await;

    let (status, body) = get(&server.app, &token, "/QuickConnect/Authorize?code=123456").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Bool(false));

    // Without a code the request is malformed, not a method mismatch.
    let (status, _) = get(&server.app, &token, "/QuickConnect/Authorize").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn public_system_info_is_brand_compatible() {
    let server = spawn().await;
    let req = Request::get("/System/Info/Public")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&server.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ProductName"], "Jellyfin Server");
    assert_eq!(body["Version"], "10.10.3");
    assert_eq!(body["Id"], "srv1");
}
