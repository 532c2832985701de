// Wire documents. Shapes are dictated by the Jellyfin API: PascalCase
// keys, and omitted fields must be absent rather than null.

use serde::{Deserialize, Serialize};

/// The item-ID literal Jellyfin places inside every UserData block
/// regardless of the owning item. Clients rely on it; do not "fix".
pub const USER_DATA_ITEM_ID: &str = "00000000000000000000000000000000";

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct JFItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub item_type: String,
    pub server_id: String,
    pub is_folder: bool,
    pub location_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taglines: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive_item_count: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_number: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_index_number: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_time_ticks: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub community_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critic_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub official_rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premiere_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre_items: Option<Vec<NameIdPair>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub studios: Option<Vec<NameIdPair>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub people: Option<Vec<JFPerson>>,

    #[serde(rename = "IsHD", skip_serializing_if = "Option::is_none")]
    pub is_hd: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_tags: Option<ImageTags>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backdrop_image_tags: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_sources: Option<Vec<JFMediaSource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_streams: Option<Vec<JFMediaStream>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_ids: Option<std::collections::HashMap<String, String>>,

    pub user_data: JFUserData,
}

impl JFItem {
    /// Video height of the first media source, for resolution filters.
    pub fn video_height(&self) -> Option<i32> {
        self.media_sources
            .as_deref()?
            .first()?
            .media_streams
            .iter()
            .find(|s| s.stream_type == "Video")
            .and_then(|s| s.height)
    }
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct NameIdPair {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct JFPerson {
    pub name: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "Type")]
    pub person_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_image_tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ImageTags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backdrop: Option<String>,
}

impl ImageTags {
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.logo.is_none() && self.backdrop.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct JFUserData {
    pub playback_position_ticks: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub played_percentage: Option<f64>,
    pub play_count: i32,
    pub is_favorite: bool,
    pub played: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_played_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unplayed_item_count: Option<i32>,
    pub key: String,
    pub item_id: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct JFMediaSource {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_time_ticks: Option<i64>,
    #[serde(rename = "Type")]
    pub source_type: String,
    pub is_remote: bool,
    pub supports_direct_play: bool,
    pub supports_direct_stream: bool,
    pub supports_transcoding: bool,
    pub supports_probing: bool,
    pub media_streams: Vec<JFMediaStream>,
    pub default_audio_stream_index: i32,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct JFMediaStream {
    #[serde(rename = "Type")]
    pub stream_type: String,
    pub index: i32,
    pub codec: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec_tag: Option<String>,
    pub is_default: bool,
    pub is_forced: bool,
    pub is_external: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_frame_rate: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_frame_rate: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_layout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_title: Option<String>,
}

/// `{Items, TotalRecordCount, StartIndex}` — the universal list reply.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemsResponse {
    pub items: Vec<JFItem>,
    pub total_record_count: i32,
    pub start_index: i32,
}

impl ItemsResponse {
    pub fn new(items: Vec<JFItem>, total: usize, start_index: usize) -> Self {
        Self {
            items,
            total_record_count: total as i32,
            start_index: start_index as i32,
        }
    }

    pub fn full(items: Vec<JFItem>) -> Self {
        let total = items.len();
        Self::new(items, total, 0)
    }
}

// =============================================================================
// Users & sessions
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticateRequest {
    pub username: String,
    #[serde(default)]
    pub pw: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticationResult {
    pub user: UserDto,
    pub session_info: SessionInfo,
    pub access_token: String,
    pub server_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserDto {
    pub id: String,
    pub name: String,
    pub server_id: String,
    pub has_password: bool,
    pub has_configured_password: bool,
    pub enable_auto_login: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_image_tag: Option<String>,
    pub policy: UserPolicy,
    pub configuration: UserConfiguration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPolicy {
    pub is_administrator: bool,
    pub is_hidden: bool,
    pub is_disabled: bool,
    pub enable_all_folders: bool,
    pub enable_audio_playback_transcoding: bool,
    pub enable_video_playback_transcoding: bool,
    pub enable_playback_remuxing: bool,
    pub enable_media_conversion: bool,
    pub enable_content_downloading: bool,
    pub authentication_provider_id: String,
    pub password_reset_provider_id: String,
}

impl Default for UserPolicy {
    fn default() -> Self {
        Self {
            is_administrator: false,
            is_hidden: false,
            is_disabled: false,
            enable_all_folders: true,
            enable_audio_playback_transcoding: false,
            enable_video_playback_transcoding: false,
            enable_playback_remuxing: true,
            enable_media_conversion: false,
            enable_content_downloading: true,
            authentication_provider_id:
                "Jellyfin.Server.Implementations.Users.DefaultAuthenticationProvider".to_string(),
            password_reset_provider_id:
                "Jellyfin.Server.Implementations.Users.DefaultPasswordResetProvider".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserConfiguration {
    pub play_default_audio_track: bool,
    pub subtitle_language_preference: String,
    pub display_missing_episodes: bool,
    pub subtitle_mode: String,
    pub enable_local_password: bool,
    pub hide_played_in_latest: bool,
    pub remember_audio_selections: bool,
    pub remember_subtitle_selections: bool,
}

impl Default for UserConfiguration {
    fn default() -> Self {
        Self {
            play_default_audio_track: true,
            subtitle_language_preference: String::new(),
            display_missing_episodes: false,
            subtitle_mode: "Default".to_string(),
            enable_local_password: false,
            hide_played_in_latest: true,
            remember_audio_selections: true,
            remember_subtitle_selections: true,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionInfo {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub client: String,
    pub application_version: String,
    pub device_name: String,
    pub device_id: String,
    pub remote_end_point: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_date: Option<String>,
}

// =============================================================================
// System
// =============================================================================

/// Brand-checked by some clients: ProductName and Version are literals.
pub const PRODUCT_NAME: &str = "Jellyfin Server";
pub const PRODUCT_VERSION: &str = "10.10.3";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublicSystemInfo {
    pub id: String,
    pub local_address: String,
    pub server_name: String,
    pub product_name: String,
    pub version: String,
    pub startup_wizard_completed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SystemInfo {
    pub id: String,
    pub local_address: String,
    pub server_name: String,
    pub product_name: String,
    pub version: String,
    pub startup_wizard_completed: bool,
    pub operating_system: String,
    pub has_pending_restart: bool,
    pub is_shutting_down: bool,
    pub supports_library_monitor: bool,
    pub web_socket_port_number: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_are_omitted_not_null() {
        let item = JFItem {
            id: "m1".to_string(),
            name: "Alpha".to_string(),
            item_type: "Movie".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&item).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("Overview"));
        assert!(!obj.contains_key("SeriesId"));
        assert!(obj.contains_key("UserData"));
        assert_eq!(obj["Type"], "Movie");
    }

    #[test]
    fn user_data_serializes_pascal_case() {
        let data = JFUserData {
            item_id: USER_DATA_ITEM_ID.to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["ItemId"], USER_DATA_ITEM_ID);
        assert_eq!(json["PlaybackPositionTicks"], 0);
        assert!(json.get("PlayedPercentage").is_none());
    }
}
