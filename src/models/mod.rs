use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::nfo::NfoCell;

// =============================================================================
// Library entities (read-mostly after scan)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionKind {
    Movies,
    TvShows,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Movies => "movies",
            CollectionKind::TvShows => "tvshows",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "movies" => Some(CollectionKind::Movies),
            "tvshows" => Some(CollectionKind::TvShows),
            _ => None,
        }
    }
}

/// A named, typed group of media items backed by a directory.
#[derive(Debug)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub kind: CollectionKind,
    pub root: PathBuf,
    pub items: Vec<Item>,
}

/// Fields shared by every concrete library item.
#[derive(Debug)]
pub struct ItemCommon {
    /// Stable, collection-unique ID (no wire prefix for movies/shows).
    pub id: String,
    pub name: String,
    /// Empty sort name falls back to `name`.
    pub sort_name: Option<String>,
    pub created: DateTime<Utc>,
    /// Lazy metadata sidecar; absent or unparsable NFO degrades silently.
    pub nfo: NfoCell,
    pub poster_path: Option<PathBuf>,
    pub fanart_path: Option<PathBuf>,
    pub logo_path: Option<PathBuf>,
}

impl ItemCommon {
    pub fn sort_name(&self) -> &str {
        match &self.sort_name {
            Some(s) if !s.is_empty() => s,
            _ => &self.name,
        }
    }

    pub fn nfo(&self) -> Option<&crate::nfo::Nfo> {
        self.nfo.get()
    }

    pub fn genres(&self) -> &[String] {
        self.nfo().map(|n| n.genres.as_slice()).unwrap_or(&[])
    }

    pub fn studios(&self) -> &[String] {
        self.nfo().map(|n| n.studios.as_slice()).unwrap_or(&[])
    }

    pub fn official_rating(&self) -> Option<&str> {
        self.nfo().and_then(|n| n.official_rating.as_deref())
    }

    pub fn community_rating(&self) -> Option<f64> {
        self.nfo().and_then(|n| n.community_rating)
    }

    pub fn year(&self) -> Option<i32> {
        self.nfo().and_then(|n| n.year)
    }

    pub fn premiere_date(&self) -> Option<&str> {
        self.nfo()
            .and_then(|n| n.premiered.as_deref().or(n.aired.as_deref()))
    }
}

/// On-disk media file plus whatever stream details the sidecar knew.
#[derive(Debug, Default, Clone)]
pub struct MediaFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    /// Seconds. Unknown durations fall back to 3600 in playback math.
    pub duration_secs: Option<f64>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub framerate: Option<f32>,
    pub audio_channels: Option<i32>,
    pub audio_language: Option<String>,
}

#[derive(Debug)]
pub enum Item {
    Movie(Movie),
    Show(Show),
}

impl Item {
    pub fn common(&self) -> &ItemCommon {
        match self {
            Item::Movie(m) => &m.common,
            Item::Show(s) => &s.common,
        }
    }

    pub fn id(&self) -> &str {
        &self.common().id
    }
}

#[derive(Debug)]
pub struct Movie {
    pub common: ItemCommon,
    pub media: MediaFile,
}

#[derive(Debug)]
pub struct Show {
    pub common: ItemCommon,
    /// Seasons in scan order; season 0 ("Specials") sorts last for display.
    pub seasons: Vec<Season>,
}

impl Show {
    pub fn episode_count(&self) -> usize {
        self.seasons.iter().map(|s| s.episodes.len()).sum()
    }

    pub fn episodes(&self) -> impl Iterator<Item = &Episode> {
        self.seasons.iter().flat_map(|s| s.episodes.iter())
    }

    pub fn season(&self, season_id: &str) -> Option<&Season> {
        self.seasons.iter().find(|s| s.id == season_id)
    }
}

#[derive(Debug)]
pub struct Season {
    pub id: String,
    /// 0 means "Specials".
    pub season_no: i32,
    pub episodes: Vec<Episode>,
    pub poster_path: Option<PathBuf>,
}

impl Season {
    /// Display index: season 0 is remapped to 99 so Specials sort last.
    pub fn display_index(&self) -> i32 {
        if self.season_no == 0 {
            99
        } else {
            self.season_no
        }
    }

    pub fn display_name(&self) -> String {
        if self.season_no == 0 {
            "Specials".to_string()
        } else {
            format!("Season {}", self.season_no)
        }
    }
}

#[derive(Debug)]
pub struct Episode {
    pub common: ItemCommon,
    pub season_no: i32,
    pub episode_no: i32,
    pub media: MediaFile,
}

// =============================================================================
// Persistence rows
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    /// Stored lowercase; lookups are case-insensitive.
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: String,
    pub last_login: Option<String>,
    pub last_used: Option<String>,
}

/// Opaque bearer token bound to a (user, device) pair. One active token
/// per device ID; reauthentication reuses the row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessToken {
    pub token: String,
    pub user_id: String,
    pub client: String,
    pub client_version: String,
    pub device_name: String,
    pub device_id: String,
    pub remote_addr: String,
    pub created_at: String,
    pub last_used: String,
}

/// Per (user, item) playback state. An absent row reads as all zeroes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserData {
    pub user_id: String,
    pub item_id: String,
    /// Seconds into the item.
    pub position: f64,
    pub played_percentage: f64,
    pub played: bool,
    pub favorite: bool,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Playlist {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[sqlx(skip)]
    pub item_ids: Vec<String>,
}

/// Uploaded image blob (user profile, collection art).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredImage {
    pub owner_id: String,
    pub image_type: String,
    pub data: Vec<u8>,
    pub etag: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuickConnectCode {
    pub code: String,
    pub secret: String,
    pub device_id: String,
    pub authenticated: bool,
    pub user_id: Option<String>,
    pub created_at: String,
}
