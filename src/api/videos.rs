use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::api::error::{ApiError, ApiResult};
use crate::ids;
use crate::AppState;

// Media URLs are fetched by player components that cannot attach
// credentials, so these routes skip the auth layer.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:id/stream", get(stream_video))
        .route("/:id/stream.:container", get(stream_video))
        .route("/:id/original", get(stream_video))
        .route("/:id/original.:container", get(stream_video))
}

#[derive(Debug, Deserialize)]
pub struct VideoPath {
    id: String,
    #[serde(default)]
    #[allow(dead_code)]
    container: Option<String>,
}

fn content_type_of(path: &std::path::Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "ts" | "m2ts" | "mts" => "video/mp2t",
        "ogv" => "video/ogg",
        "3gp" => "video/3gpp",
        _ => "application/octet-stream",
    }
}

/// Parse a `bytes=start-end` range against the file size. Suffix and
/// open-ended forms are supported; an unsatisfiable range reads as
/// "no range" and the whole file is served.
fn parse_range_header(range_header: Option<&HeaderValue>, file_size: u64) -> Option<(u64, u64)> {
    let range_str = range_header?.to_str().ok()?;
    let range = range_str.strip_prefix("bytes=")?;
    let (start_str, end_str) = range.split_once('-')?;

    let start: u64 = if start_str.is_empty() {
        let suffix_len: u64 = end_str.parse().ok()?;
        file_size.saturating_sub(suffix_len)
    } else {
        start_str.parse().ok()?
    };

    let end: u64 = if end_str.is_empty() || start_str.is_empty() {
        file_size.saturating_sub(1)
    } else {
        end_str.parse().ok()?
    };

    if start > end || start >= file_size {
        return None;
    }
    Some((start, end.min(file_size - 1)))
}

/// External ID to an on-disk media path. Accepts episode-prefixed IDs
/// and bare IDs (movies, or episodes stored without their prefix).
fn media_path(state: &AppState, id: &str) -> ApiResult<PathBuf> {
    let media = match ids::classify(id) {
        ids::ExternalId::Episode(raw) => {
            state
                .library
                .get_episode_by_id(&raw)
                .map(|(_, _, _, ep)| &ep.media)
        }
        ids::ExternalId::Media(raw) => match state.library.get_movie_by_id(&raw) {
            Some((_, movie)) => Some(&movie.media),
            None => state
                .library
                .get_episode_by_id(&raw)
                .map(|(_, _, _, ep)| &ep.media),
        },
        _ => None,
    };
    media
        .map(|m| m.path.clone())
        .ok_or_else(|| ApiError::not_found("no media behind this id"))
}

async fn stream_video(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(path_params): Path<VideoPath>,
) -> ApiResult<Response> {
    let file_path = media_path(&state, &path_params.id)?;

    let file = File::open(&file_path)
        .await
        .map_err(|_| ApiError::not_found("media file missing on disk"))?;
    let metadata = file.metadata().await.map_err(anyhow::Error::from)?;
    let file_size = metadata.len();
    let content_type = content_type_of(&file_path);

    match parse_range_header(headers.get(header::RANGE), file_size) {
        Some((start, end)) => {
            let length = end - start + 1;
            tracing::debug!(
                "Serving range {start}-{end}/{file_size} of {}",
                file_path.display()
            );

            let mut file = file;
            file.seek(std::io::SeekFrom::Start(start))
                .await
                .map_err(anyhow::Error::from)?;
            let body = Body::from_stream(ReaderStream::new(file.take(length)));

            let response = Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, length)
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {start}-{end}/{file_size}"),
                )
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::CACHE_CONTROL, "no-cache")
                .body(body)
                .map_err(anyhow::Error::from)?;
            Ok(response)
        }
        None => {
            tracing::debug!(
                "Serving full file {} ({file_size} bytes)",
                file_path.display()
            );
            let body = Body::from_stream(ReaderStream::new(file));
            let response = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, file_size)
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::CACHE_CONTROL, "no-cache")
                .body(body)
                .map_err(anyhow::Error::from)?;
            Ok(response)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(value: &str, size: u64) -> Option<(u64, u64)> {
        let hv = HeaderValue::from_str(value).unwrap();
        parse_range_header(Some(&hv), size)
    }

    #[test]
    fn plain_range() {
        assert_eq!(range("bytes=0-1023", 4096), Some((0, 1023)));
    }

    #[test]
    fn open_ended_range_runs_to_eof() {
        assert_eq!(range("bytes=1024-", 4096), Some((1024, 4095)));
    }

    #[test]
    fn suffix_range_takes_last_bytes() {
        assert_eq!(range("bytes=-500", 4096), Some((3596, 4095)));
    }

    #[test]
    fn end_is_clamped_to_file_size() {
        assert_eq!(range("bytes=0-999999", 4096), Some((0, 4095)));
    }

    #[test]
    fn unsatisfiable_range_is_none() {
        assert_eq!(range("bytes=5000-6000", 4096), None);
        assert_eq!(range("not-bytes", 4096), None);
    }

    #[test]
    fn video_mime_types() {
        assert_eq!(content_type_of(std::path::Path::new("a.mkv")), "video/x-matroska");
        assert_eq!(content_type_of(std::path::Path::new("a.mp4")), "video/mp4");
        assert_eq!(
            content_type_of(std::path::Path::new("a.bin")),
            "application/octet-stream"
        );
    }
}
