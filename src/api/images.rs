use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Extension, Router,
};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::api::error::{ApiError, ApiResult};
use crate::api::AuthSession;
use crate::ids;
use crate::models::StoredImage;
use crate::AppState;

/// A month, in seconds. Applied to redirects so clients cache the
/// upstream URL rather than re-resolving through us.
const REDIRECT_MAX_AGE: u32 = 2_592_000;

// Image GETs stay unauthenticated; players fetch artwork without
// credentials. Uploads and deletes go through the auth layer.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/Items/:id/Images/:type", get(get_item_image))
        .route("/Items/:id/Images/:type/:index", get(get_item_image_indexed))
        .route("/Users/:id/Images/:type", get(get_user_image))
}

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/Items/:id/Images/:type", post(upload_item_image))
        .route(
            "/Users/:id/Images/:type",
            post(upload_user_image).delete(delete_user_image),
        )
}

type QueryMap = HashMap<String, String>;

fn image_content_type(path: &std::path::Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "image/jpeg",
    }
}

fn redirect_to(url: &str) -> ApiResult<Response> {
    let response = Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, url)
        .header(
            header::CACHE_CONTROL,
            format!("public, max-age={REDIRECT_MAX_AGE}"),
        )
        .body(Body::empty())
        .map_err(anyhow::Error::from)?;
    Ok(response)
}

/// First 16 hex chars of the SHA-256 of an uploaded blob.
pub(crate) fn etag_of(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..16].to_string()
}

/// Disk art is tagged by its mtime so a replaced file busts the cache.
async fn file_etag(path: &std::path::Path) -> Option<String> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    let mtime = meta.modified().ok()?;
    let secs = mtime
        .duration_since(std::time::UNIX_EPOCH)
        .ok()?
        .as_secs();
    Some(format!("{secs:x}"))
}

fn not_modified(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_matches('"') == etag)
        .unwrap_or(false)
}

fn cached_response(etag: &str) -> ApiResult<Response> {
    let response = Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header(header::ETAG, format!("\"{etag}\""))
        .body(Body::empty())
        .map_err(anyhow::Error::from)?;
    Ok(response)
}

enum Rendition {
    /// Re-encoded JPEG bounded to the configured width.
    Scaled,
    /// Bytes straight off the disk (backdrops, vector art).
    Original,
}

async fn serve_disk_image(
    state: &AppState,
    path: PathBuf,
    rendition: Rendition,
    headers: &HeaderMap,
) -> ApiResult<Response> {
    let etag = file_etag(&path)
        .await
        .ok_or_else(|| ApiError::not_found("image missing on disk"))?;
    if not_modified(headers, &etag) {
        return cached_response(&etag);
    }

    match rendition {
        Rendition::Scaled => {
            let max_width = state.config.images.max_width;
            let quality = state.config.images.quality;
            let encoded = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<u8>> {
                let img = image::open(&path)?;
                let img = if img.width() > max_width {
                    img.thumbnail(max_width, u32::MAX)
                } else {
                    img
                };
                let mut buf = Vec::new();
                let encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality);
                img.write_with_encoder(encoder)?;
                Ok(buf)
            })
            .await
            .map_err(anyhow::Error::from)??;

            let response = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "image/jpeg")
                .header(header::CONTENT_LENGTH, encoded.len())
                .header(header::ETAG, format!("\"{etag}\""))
                .header(header::CACHE_CONTROL, "public, max-age=86400")
                .body(Body::from(encoded))
                .map_err(anyhow::Error::from)?;
            Ok(response)
        }
        Rendition::Original => {
            let file = File::open(&path)
                .await
                .map_err(|_| ApiError::not_found("image missing on disk"))?;
            let len = file.metadata().await.map_err(anyhow::Error::from)?.len();
            let content_type = image_content_type(&path);
            let response = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, len)
                .header(header::ETAG, format!("\"{etag}\""))
                .header(header::CACHE_CONTROL, "public, max-age=86400")
                .body(Body::from_stream(ReaderStream::new(file)))
                .map_err(anyhow::Error::from)?;
            Ok(response)
        }
    }
}

fn serve_stored_image(stored: StoredImage, headers: &HeaderMap) -> ApiResult<Response> {
    if not_modified(headers, &stored.etag) {
        return cached_response(&stored.etag);
    }
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header(header::CONTENT_LENGTH, stored.data.len())
        .header(header::ETAG, format!("\"{}\"", stored.etag))
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .body(Body::from(stored.data))
        .map_err(anyhow::Error::from)?;
    Ok(response)
}

/// Art paths for an item by image type. Episodes fall back to their
/// show's art; seasons to their own poster, then the show's.
fn art_path(state: &AppState, id: &str, image_type: &str) -> Option<(PathBuf, Rendition)> {
    let from_common = |common: &crate::models::ItemCommon| match image_type {
        "Primary" => common.poster_path.clone().map(|p| (p, Rendition::Scaled)),
        "Logo" => common.logo_path.clone().map(|p| (p, Rendition::Scaled)),
        "Backdrop" => common.fanart_path.clone().map(|p| (p, Rendition::Original)),
        _ => None,
    };

    match ids::classify(id) {
        ids::ExternalId::Media(raw) => {
            let (_, item) = state.library.get_item_by_id(&raw)?;
            from_common(item.common())
        }
        ids::ExternalId::Season(raw) => {
            let (_, show, season) = state.library.get_season_by_id(&raw)?;
            if image_type == "Primary" {
                if let Some(poster) = &season.poster_path {
                    return Some((poster.clone(), Rendition::Scaled));
                }
            }
            from_common(&show.common)
        }
        ids::ExternalId::Episode(raw) => {
            let (_, show, _, _) = state.library.get_episode_by_id(&raw)?;
            from_common(&show.common)
        }
        _ => None,
    }
}

async fn get_item_image(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, image_type)): Path<(String, String)>,
    Query(query): Query<QueryMap>,
) -> ApiResult<Response> {
    // A redirect tag short-circuits everything else.
    if let Some(url) = query.get("tag").and_then(|t| ids::redirect_url(t)) {
        return redirect_to(url);
    }

    match ids::classify(&id) {
        ids::ExternalId::Person(raw) => {
            let name = ids::decode_name(&raw)
                .ok_or_else(|| ApiError::bad_request("malformed person id"))?;
            let thumb = state
                .library
                .person_thumb(&name)
                .ok_or_else(|| ApiError::not_found("person has no image"))?;
            redirect_to(&thumb)
        }
        ids::ExternalId::Collection(raw) => {
            let stored = state.repo.get_image(&raw, &image_type).await?;
            serve_stored_image(stored, &headers)
        }
        _ => {
            let (path, rendition) = art_path(&state, &id, &image_type)
                .ok_or_else(|| ApiError::not_found("no image of this type"))?;
            serve_disk_image(&state, path, rendition, &headers).await
        }
    }
}

async fn get_item_image_indexed(
    state: State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, image_type, _index)): Path<(String, String, u32)>,
    query: Query<QueryMap>,
) -> ApiResult<Response> {
    // Only one image per type exists; every index maps to it.
    get_item_image(state, headers, Path((id, image_type)), query).await
}

async fn get_user_image(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((user_id, image_type)): Path<(String, String)>,
) -> ApiResult<Response> {
    let stored = state.repo.get_image(&user_id, &image_type).await?;
    serve_stored_image(stored, &headers)
}

/// Uploads arrive either as raw bytes or base64 text, depending on the
/// client. Sniff: valid base64 that decodes to something image-sized
/// wins.
fn decode_upload(body: &[u8]) -> Vec<u8> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    if let Ok(text) = std::str::from_utf8(body) {
        if let Ok(decoded) = STANDARD.decode(text.trim()) {
            if !decoded.is_empty() {
                return decoded;
            }
        }
    }
    body.to_vec()
}

async fn store_upload(
    state: &AppState,
    owner_id: &str,
    image_type: &str,
    body: &[u8],
) -> ApiResult<()> {
    let data = decode_upload(body);
    if data.is_empty() {
        return Err(ApiError::bad_request("empty image upload"));
    }
    let image = StoredImage {
        owner_id: owner_id.to_string(),
        image_type: image_type.to_string(),
        etag: etag_of(&data),
        data,
    };
    state.repo.store_image(&image).await?;
    Ok(())
}

async fn upload_item_image(
    State(state): State<Arc<AppState>>,
    Extension(_session): Extension<AuthSession>,
    Path((id, image_type)): Path<(String, String)>,
    body: axum::body::Bytes,
) -> ApiResult<StatusCode> {
    let owner = match ids::classify(&id) {
        ids::ExternalId::Collection(raw) => raw,
        _ => {
            return Err(ApiError::bad_request(
                "only collection artwork can be uploaded",
            ))
        }
    };
    store_upload(&state, &owner, &image_type, &body).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_user_image(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path((user_id, image_type)): Path<(String, String)>,
    body: axum::body::Bytes,
) -> ApiResult<StatusCode> {
    if session.user.id != user_id && !session.user.is_admin {
        return Err(ApiError::Forbidden(
            "cannot change another user's image".to_string(),
        ));
    }
    store_upload(&state, &user_id, &image_type, &body).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_user_image(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path((user_id, image_type)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    if session.user.id != user_id && !session.user.is_admin {
        return Err(ApiError::Forbidden(
            "cannot change another user's image".to_string(),
        ));
    }
    state.repo.delete_image(&user_id, &image_type).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_is_first_16_hex_of_sha256() {
        // sha256("hello") = 2cf24dba5fb0a30e...
        assert_eq!(etag_of(b"hello"), "2cf24dba5fb0a30e");
    }

    #[test]
    fn base64_uploads_are_decoded() {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        let raw = vec![0xffu8, 0xd8, 0xff, 0xe0];
        let encoded = STANDARD.encode(&raw);
        assert_eq!(decode_upload(encoded.as_bytes()), raw);
        assert_eq!(decode_upload(&raw), raw);
    }

    #[test]
    fn if_none_match_comparison_ignores_quotes() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, "\"abc123\"".parse().unwrap());
        assert!(not_modified(&headers, "abc123"));
        assert!(!not_modified(&headers, "other"));
    }
}
