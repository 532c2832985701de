// Projection of library entities into Jellyfin item documents. Every
// handler that answers with a JFItem goes through here, so the wire
// quirks (tick math, codec normalization, specials remapping, the
// UserData literals) live in exactly one place.

use crate::api::dto::{
    ImageTags, JFItem, JFMediaSource, JFMediaStream, JFPerson, JFUserData, NameIdPair,
    USER_DATA_ITEM_ID,
};
use crate::ids;
use crate::library::Library;
use crate::models::{Collection, Episode, Item, MediaFile, Movie, Season, Show, User, UserData};
use crate::nfo::PersonKind;
use crate::repo::{RepoError, RepoResult, Repository};
use crate::userdata::seconds_to_ticks;

pub struct Projector<'a> {
    pub library: &'a Library,
    pub repo: &'a dyn Repository,
    pub server_id: &'a str,
    pub user: &'a User,
}

/// Codec normalization: what the sidecar calls it → what clients expect.
pub fn normalize_codec(codec: &str) -> (&'static str, Option<&'static str>) {
    match codec.to_ascii_lowercase().as_str() {
        "avc" | "x264" | "h264" => ("h264", Some("avc1")),
        "x265" | "h265" | "hevc" => ("hevc", Some("hvc1")),
        "vc1" => ("vc1", Some("wvc1")),
        "ac3" => ("ac3", Some("ac-3")),
        "aac" => ("aac", Some("mp4a")),
        "eac3" => ("eac3", Some("ec-3")),
        "wma" => ("wmapro", None),
        _ => ("unknown", Some("unknown")),
    }
}

pub fn channel_layout(channels: i32) -> String {
    match channels {
        1 => "mono".to_string(),
        2 => "stereo".to_string(),
        3 => "3.0".to_string(),
        4 => "4.0".to_string(),
        5 => "5.0".to_string(),
        6 => "5.1".to_string(),
        8 => "7.1".to_string(),
        n => format!("{n} channels"),
    }
}

fn channel_display(channels: i32) -> String {
    match channels {
        1 => "Mono".to_string(),
        2 => "Stereo".to_string(),
        3 => "2.1 Channel".to_string(),
        6 => "5.1 Channel".to_string(),
        8 => "7.1 Channel".to_string(),
        n => format!("{n} Channel"),
    }
}

pub fn runtime_ticks(duration_secs: Option<f64>) -> Option<i64> {
    duration_secs.map(seconds_to_ticks)
}

fn is_hd(height: Option<i32>) -> bool {
    height.is_some_and(|h| h >= 720)
}

fn container_of(file_name: &str) -> Option<String> {
    file_name.rsplit('.').next().map(|s| s.to_lowercase())
}

/// The single MediaSources[0] entry: one Video stream at index 0, one
/// Audio stream at index 1. DefaultAudioStreamIndex stays 1 even when
/// no audio stream exists; clients rely on the literal.
pub fn media_source(item_id: &str, name: &str, media: &MediaFile) -> JFMediaSource {
    let mut streams = Vec::new();

    let (vcodec, vtag) = normalize_codec(media.video_codec.as_deref().unwrap_or(""));
    streams.push(JFMediaStream {
        stream_type: "Video".to_string(),
        index: 0,
        codec: vcodec.to_string(),
        codec_tag: vtag.map(str::to_string),
        is_default: true,
        width: media.width,
        height: media.height,
        average_frame_rate: media.framerate,
        real_frame_rate: media.framerate,
        video_range: Some("SDR".to_string()),
        display_title: Some(match (media.width, media.height) {
            (Some(w), Some(h)) => format!("{} {}x{}", vcodec.to_uppercase(), w, h),
            _ => vcodec.to_uppercase(),
        }),
        ..Default::default()
    });

    let (acodec, atag) = normalize_codec(media.audio_codec.as_deref().unwrap_or(""));
    streams.push(JFMediaStream {
        stream_type: "Audio".to_string(),
        index: 1,
        codec: acodec.to_string(),
        codec_tag: atag.map(str::to_string),
        is_default: true,
        channels: media.audio_channels,
        channel_layout: media.audio_channels.map(channel_layout),
        language: media.audio_language.clone(),
        display_title: media
            .audio_channels
            .map(|c| format!("{} {}", acodec.to_uppercase(), channel_display(c))),
        ..Default::default()
    });

    JFMediaSource {
        id: item_id.to_string(),
        name: name.to_string(),
        path: Some(media.path.to_string_lossy().into_owned()),
        protocol: "File".to_string(),
        container: container_of(&media.file_name),
        size: Some(media.size as i64),
        run_time_ticks: runtime_ticks(media.duration_secs),
        source_type: "Default".to_string(),
        is_remote: false,
        supports_direct_play: true,
        supports_direct_stream: true,
        supports_transcoding: false,
        supports_probing: true,
        media_streams: streams,
        default_audio_stream_index: 1,
    }
}

impl<'a> Projector<'a> {
    fn empty_user_data(&self, item_id: &str) -> JFUserData {
        JFUserData {
            key: format!("{}/{}", self.user.id, item_id),
            item_id: USER_DATA_ITEM_ID.to_string(),
            ..Default::default()
        }
    }

    fn user_data_dto(&self, item_id: &str, data: &UserData) -> JFUserData {
        JFUserData {
            playback_position_ticks: seconds_to_ticks(data.position),
            played_percentage: (data.played_percentage > 0.0).then_some(data.played_percentage),
            play_count: i32::from(data.played),
            is_favorite: data.favorite,
            played: data.played,
            last_played_date: (!data.updated_at.is_empty()).then(|| data.updated_at.clone()),
            unplayed_item_count: None,
            key: format!("{}/{}", self.user.id, item_id),
            item_id: USER_DATA_ITEM_ID.to_string(),
        }
    }

    async fn user_data(&self, item_id: &str) -> RepoResult<JFUserData> {
        match self.repo.get_user_data(&self.user.id, item_id).await {
            Ok(data) => Ok(self.user_data_dto(item_id, &data)),
            Err(RepoError::NotFound) => Ok(self.empty_user_data(item_id)),
            Err(e) => Err(e),
        }
    }

    fn people(&self, item: &crate::models::ItemCommon) -> Option<Vec<JFPerson>> {
        let nfo = item.nfo()?;
        if nfo.cast.is_empty() {
            return None;
        }
        Some(
            nfo.cast
                .iter()
                .map(|m| JFPerson {
                    name: m.name.clone(),
                    id: ids::person_id(&m.name),
                    role: m.role.clone(),
                    person_type: match m.kind {
                        PersonKind::Actor => "Actor".to_string(),
                        PersonKind::Director => "Director".to_string(),
                        PersonKind::Writer => "Writer".to_string(),
                    },
                    primary_image_tag: m.thumb.as_deref().map(ids::redirect_tag),
                })
                .collect(),
        )
    }

    fn name_pairs(names: &[String], make_id: fn(&str) -> String) -> Option<Vec<NameIdPair>> {
        if names.is_empty() {
            return None;
        }
        Some(
            names
                .iter()
                .map(|n| NameIdPair {
                    name: n.clone(),
                    id: make_id(n),
                })
                .collect(),
        )
    }

    fn image_tags(external_id: &str, common: &crate::models::ItemCommon) -> Option<ImageTags> {
        let tags = ImageTags {
            primary: common.poster_path.as_ref().map(|_| external_id.to_string()),
            logo: common.logo_path.as_ref().map(|_| external_id.to_string()),
            backdrop: common.fanart_path.as_ref().map(|_| external_id.to_string()),
        };
        (!tags.is_empty()).then_some(tags)
    }

    fn provider_ids(
        common: &crate::models::ItemCommon,
    ) -> Option<std::collections::HashMap<String, String>> {
        let nfo = common.nfo()?;
        let mut ids = std::collections::HashMap::new();
        if let Some(v) = &nfo.imdb_id {
            ids.insert("Imdb".to_string(), v.clone());
        }
        if let Some(v) = &nfo.tmdb_id {
            ids.insert("Tmdb".to_string(), v.clone());
        }
        if let Some(v) = &nfo.tvdb_id {
            ids.insert("Tvdb".to_string(), v.clone());
        }
        (!ids.is_empty()).then_some(ids)
    }

    /// Shared metadata block for movies/shows/episodes.
    fn base_item(&self, external_id: &str, common: &crate::models::ItemCommon) -> JFItem {
        let nfo = common.nfo();
        JFItem {
            id: external_id.to_string(),
            name: common.name.clone(),
            sort_name: Some(common.sort_name().to_string()),
            server_id: self.server_id.to_string(),
            location_type: "FileSystem".to_string(),
            overview: nfo.and_then(|n| n.plot.clone()),
            taglines: nfo
                .and_then(|n| n.tagline.clone())
                .map(|t| vec![t]),
            community_rating: common.community_rating(),
            official_rating: common.official_rating().map(str::to_string),
            production_year: common.year(),
            premiere_date: common.premiere_date().map(str::to_string),
            date_created: Some(common.created.to_rfc3339()),
            genres: (!common.genres().is_empty()).then(|| common.genres().to_vec()),
            genre_items: Self::name_pairs(common.genres(), ids::genre_id),
            studios: Self::name_pairs(common.studios(), ids::studio_id),
            people: self.people(common),
            provider_ids: Self::provider_ids(common),
            image_tags: Self::image_tags(external_id, common),
            backdrop_image_tags: common
                .fanart_path
                .as_ref()
                .map(|_| vec![external_id.to_string()]),
            ..Default::default()
        }
    }

    // =========================================================================
    // Concrete entities
    // =========================================================================

    pub async fn movie(&self, collection: &Collection, movie: &Movie) -> RepoResult<JFItem> {
        let mut item = self.base_item(&movie.common.id, &movie.common);
        item.item_type = "Movie".to_string();
        item.media_type = Some("Video".to_string());
        item.is_folder = false;
        item.parent_id = Some(ids::collection_id(&collection.id));
        item.run_time_ticks = runtime_ticks(movie.media.duration_secs);
        item.container = container_of(&movie.media.file_name);
        item.is_hd = Some(is_hd(movie.media.height));
        let source = media_source(&movie.common.id, &movie.common.name, &movie.media);
        item.media_streams = Some(source.media_streams.clone());
        item.media_sources = Some(vec![source]);
        item.user_data = self.user_data(&movie.common.id).await?;
        Ok(item)
    }

    pub async fn show(&self, collection: &Collection, show: &Show) -> RepoResult<JFItem> {
        let mut item = self.base_item(&show.common.id, &show.common);
        item.item_type = "Series".to_string();
        item.is_folder = true;
        item.parent_id = Some(ids::collection_id(&collection.id));
        item.child_count = Some(show.seasons.len() as i32);
        item.recursive_item_count = Some(show.episode_count() as i32);

        let mut data = self.empty_user_data(&show.common.id);
        let total = show.episode_count();
        let mut played = 0usize;
        let mut favorite = false;
        let mut last_played: Option<String> = None;
        for ep in show.episodes() {
            match self.repo.get_user_data(&self.user.id, &ep.common.id).await {
                Ok(d) => {
                    if d.played {
                        played += 1;
                    }
                    favorite |= d.favorite;
                    if !d.updated_at.is_empty()
                        && last_played.as_deref().map_or(true, |l| d.updated_at.as_str() > l)
                    {
                        last_played = Some(d.updated_at.clone());
                    }
                }
                Err(RepoError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        // A show with zero episodes stays unplayed; the vacuous
        // "all episodes played" reading is not promoted.
        if total > 0 {
            data.played_percentage =
                (played > 0).then(|| 100.0 * played as f64 / total as f64);
            data.played = played == total;
            data.unplayed_item_count = Some((total - played) as i32);
        }
        data.is_favorite = favorite;
        data.last_played_date = last_played;
        item.user_data = data;
        Ok(item)
    }

    pub async fn season(&self, show: &Show, season: &Season) -> RepoResult<JFItem> {
        let external_id = ids::season_id(&season.id);
        let mut item = self.base_item(&external_id, &show.common);
        item.id = external_id.clone();
        item.name = season.display_name();
        item.item_type = "Season".to_string();
        item.is_folder = true;
        item.parent_id = Some(show.common.id.clone());
        item.series_id = Some(show.common.id.clone());
        item.series_name = Some(show.common.name.clone());
        item.index_number = Some(season.display_index());
        // Specials sort after every numbered season.
        item.sort_name = Some(if season.season_no == 0 {
            "9999".to_string()
        } else {
            format!("{:04}", season.season_no)
        });
        item.child_count = Some(season.episodes.len() as i32);
        item.premiere_date = season
            .episodes
            .first()
            .and_then(|e| e.common.premiere_date().map(str::to_string));
        item.image_tags = season.poster_path.as_ref().map(|_| ImageTags {
            primary: Some(external_id.clone()),
            ..Default::default()
        });
        item.backdrop_image_tags = None;

        let mut data = self.empty_user_data(&external_id);
        let total = season.episodes.len();
        let mut played = 0usize;
        for ep in &season.episodes {
            match self.repo.get_user_data(&self.user.id, &ep.common.id).await {
                Ok(d) if d.played => played += 1,
                Ok(_) => {}
                Err(RepoError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        if total > 0 {
            data.played_percentage =
                (played > 0).then(|| 100.0 * played as f64 / total as f64);
            data.played = played == total;
            data.unplayed_item_count = Some((total - played) as i32);
        }
        item.user_data = data;
        Ok(item)
    }

    pub async fn episode(
        &self,
        show: &Show,
        season: &Season,
        episode: &Episode,
    ) -> RepoResult<JFItem> {
        let external_id = ids::episode_id(&episode.common.id);
        let mut item = self.base_item(&external_id, &episode.common);
        item.id = external_id.clone();
        item.item_type = "Episode".to_string();
        item.media_type = Some("Video".to_string());
        item.is_folder = false;
        item.parent_id = Some(ids::season_id(&season.id));
        item.season_id = Some(ids::season_id(&season.id));
        item.season_name = Some(season.display_name());
        item.series_id = Some(show.common.id.clone());
        item.series_name = Some(show.common.name.clone());
        item.parent_index_number = Some(episode.season_no);
        item.index_number = Some(episode.episode_no);
        item.run_time_ticks = runtime_ticks(episode.media.duration_secs);
        item.container = container_of(&episode.media.file_name);
        item.is_hd = Some(is_hd(episode.media.height));

        // Episodes inherit show genres and studios when their own sidecar
        // has none. The show's parental rating never propagates down.
        if item.genres.is_none() && !show.common.genres().is_empty() {
            item.genres = Some(show.common.genres().to_vec());
            item.genre_items = Self::name_pairs(show.common.genres(), ids::genre_id);
        }
        if item.studios.is_none() {
            item.studios = Self::name_pairs(show.common.studios(), ids::studio_id);
        }
        item.official_rating = episode.common.official_rating().map(str::to_string);

        if item.image_tags.is_none() {
            // Clients fall back to the show poster through the episode tag.
            item.image_tags = Self::image_tags(&external_id, &show.common)
                .map(|t| ImageTags { primary: t.primary, ..Default::default() });
        }

        let source = media_source(&episode.common.id, &episode.common.name, &episode.media);
        item.media_streams = Some(source.media_streams.clone());
        item.media_sources = Some(vec![source]);
        item.user_data = self.user_data(&episode.common.id).await?;
        Ok(item)
    }

    pub async fn item(&self, collection: &Collection, item: &Item) -> RepoResult<JFItem> {
        match item {
            Item::Movie(m) => self.movie(collection, m).await,
            Item::Show(s) => self.show(collection, s).await,
        }
    }

    // =========================================================================
    // Virtual entities
    // =========================================================================

    pub async fn root(&self) -> RepoResult<JFItem> {
        let details = self.library.details();
        let mut item = JFItem {
            id: ids::root_id(self.server_id),
            name: "Media Folders".to_string(),
            item_type: "UserRootFolder".to_string(),
            server_id: self.server_id.to_string(),
            is_folder: true,
            location_type: "FileSystem".to_string(),
            child_count: Some(self.library.collections().len() as i32 + 2),
            genres: (!details.genres.is_empty()).then_some(details.genres),
            ..Default::default()
        };
        item.user_data = self.empty_user_data(&item.id.clone());
        Ok(item)
    }

    pub async fn collection(&self, collection: &Collection) -> RepoResult<JFItem> {
        let external_id = ids::collection_id(&collection.id);
        let has_upload = self.repo.has_image(&external_id, "Primary").await?;
        let mut item = JFItem {
            id: external_id.clone(),
            name: collection.name.clone(),
            item_type: "CollectionFolder".to_string(),
            server_id: self.server_id.to_string(),
            is_folder: true,
            location_type: "FileSystem".to_string(),
            parent_id: Some(ids::root_id(self.server_id)),
            collection_type: Some(collection.kind.as_str().to_string()),
            child_count: Some(collection.items.len() as i32),
            image_tags: has_upload.then(|| ImageTags {
                primary: Some(external_id.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };
        item.user_data = self.empty_user_data(&item.id.clone());
        Ok(item)
    }

    pub async fn favorites_view(&self) -> RepoResult<JFItem> {
        let count = self.repo.get_favorites(&self.user.id).await?.len();
        let mut item = JFItem {
            id: ids::favorites_view_id(self.server_id),
            name: "Favorites".to_string(),
            item_type: "UserView".to_string(),
            server_id: self.server_id.to_string(),
            is_folder: true,
            location_type: "Virtual".to_string(),
            parent_id: Some(ids::root_id(self.server_id)),
            child_count: Some(count as i32),
            ..Default::default()
        };
        item.user_data = self.empty_user_data(&item.id.clone());
        Ok(item)
    }

    pub async fn playlists_view(&self) -> RepoResult<JFItem> {
        let count = self.repo.get_playlists(&self.user.id).await?.len();
        let mut item = JFItem {
            id: ids::playlist_view_id(self.server_id),
            name: "Playlists".to_string(),
            item_type: "UserView".to_string(),
            server_id: self.server_id.to_string(),
            is_folder: true,
            location_type: "Virtual".to_string(),
            parent_id: Some(ids::root_id(self.server_id)),
            child_count: Some(count as i32),
            ..Default::default()
        };
        item.user_data = self.empty_user_data(&item.id.clone());
        Ok(item)
    }

    pub fn playlist(&self, playlist: &crate::models::Playlist) -> JFItem {
        let external_id = ids::playlist_id(&playlist.id);
        let mut item = JFItem {
            id: external_id,
            name: playlist.name.clone(),
            item_type: "Playlist".to_string(),
            server_id: self.server_id.to_string(),
            is_folder: true,
            location_type: "Virtual".to_string(),
            media_type: Some("Video".to_string()),
            parent_id: Some(ids::playlist_view_id(self.server_id)),
            child_count: Some(playlist.item_ids.len() as i32),
            ..Default::default()
        };
        item.user_data = self.empty_user_data(&item.id.clone());
        item
    }

    pub fn genre(&self, name: &str, item_count: usize) -> JFItem {
        self.named_entity(name, "Genre", ids::genre_id(name), item_count)
    }

    pub fn studio(&self, name: &str, item_count: usize) -> JFItem {
        self.named_entity(name, "Studio", ids::studio_id(name), item_count)
    }

    pub fn person(&self, person: &crate::library::PersonInfo) -> JFItem {
        let mut item = self.named_entity(
            &person.name,
            "Person",
            ids::person_id(&person.name),
            person.item_count,
        );
        if let Some(thumb) = &person.thumb {
            item.image_tags = Some(ImageTags {
                primary: Some(ids::redirect_tag(thumb)),
                ..Default::default()
            });
        }
        item
    }

    fn named_entity(&self, name: &str, kind: &str, id: String, item_count: usize) -> JFItem {
        let mut item = JFItem {
            id,
            name: name.to_string(),
            item_type: kind.to_string(),
            server_id: self.server_id.to_string(),
            is_folder: true,
            location_type: "Virtual".to_string(),
            child_count: Some(item_count as i32),
            ..Default::default()
        };
        item.user_data = self.empty_user_data(&item.id.clone());
        item
    }

    // =========================================================================
    // Dispatch by external ID
    // =========================================================================

    /// Resolve any wire-form ID to its projected document. `Ok(None)`
    /// means the ID decoded cleanly but names nothing we have.
    pub async fn by_external_id(&self, id: &str) -> RepoResult<Option<JFItem>> {
        match ids::classify(id) {
            ids::ExternalId::Root(_) => Ok(Some(self.root().await?)),
            ids::ExternalId::FavoritesView(_) => Ok(Some(self.favorites_view().await?)),
            ids::ExternalId::PlaylistView(_) => Ok(Some(self.playlists_view().await?)),
            ids::ExternalId::Collection(raw) => match self.library.get_collection(&raw) {
                Some(c) => Ok(Some(self.collection(c).await?)),
                None => Ok(None),
            },
            ids::ExternalId::Season(raw) => match self.library.get_season_by_id(&raw) {
                Some((_, show, season)) => Ok(Some(self.season(show, season).await?)),
                None => Ok(None),
            },
            ids::ExternalId::Episode(raw) => match self.library.get_episode_by_id(&raw) {
                Some((_, show, season, ep)) => Ok(Some(self.episode(show, season, ep).await?)),
                None => Ok(None),
            },
            ids::ExternalId::Playlist(raw) => {
                match self.repo.get_playlist(&self.user.id, &raw).await {
                    Ok(p) => Ok(Some(self.playlist(&p))),
                    Err(RepoError::NotFound) => Ok(None),
                    Err(e) => Err(e),
                }
            }
            ids::ExternalId::Genre(raw) => Ok(ids::decode_name(&raw).map(|name| {
                let count = self
                    .library
                    .genre_item_count()
                    .get(&name)
                    .copied()
                    .unwrap_or(0);
                self.genre(&name, count)
            })),
            ids::ExternalId::Studio(raw) => Ok(ids::decode_name(&raw).map(|name| {
                let count = self
                    .library
                    .studio_item_count()
                    .get(&name)
                    .copied()
                    .unwrap_or(0);
                self.studio(&name, count)
            })),
            ids::ExternalId::Person(raw) => Ok(ids::decode_name(&raw)
                .and_then(|name| self.library.get_person_by_name(&name))
                .map(|p| self.person(&p))),
            ids::ExternalId::DisplayPrefs(_) => Ok(None),
            ids::ExternalId::Media(raw) => match self.library.get_item_by_id(&raw) {
                Some((c, item)) => Ok(Some(self.item(c, item).await?)),
                None => Ok(None),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_table_covers_aliases() {
        assert_eq!(normalize_codec("X264"), ("h264", Some("avc1")));
        assert_eq!(normalize_codec("hevc"), ("hevc", Some("hvc1")));
        assert_eq!(normalize_codec("vc1"), ("vc1", Some("wvc1")));
        assert_eq!(normalize_codec("AAC"), ("aac", Some("mp4a")));
        assert_eq!(normalize_codec("eac3"), ("eac3", Some("ec-3")));
        assert_eq!(normalize_codec("wma"), ("wmapro", None));
        assert_eq!(normalize_codec("theora"), ("unknown", Some("unknown")));
    }

    #[test]
    fn channel_layouts() {
        assert_eq!(channel_layout(1), "mono");
        assert_eq!(channel_layout(2), "stereo");
        assert_eq!(channel_layout(6), "5.1");
        assert_eq!(channel_layout(8), "7.1");
        assert_eq!(channel_layout(7), "7 channels");
    }

    #[test]
    fn ticks_are_microseconds_times_ten() {
        assert_eq!(runtime_ticks(Some(60.0)), Some(600_000_000));
        assert_eq!(runtime_ticks(None), None);
    }

    #[test]
    fn media_source_shape_is_fixed() {
        let media = MediaFile {
            path: "/media/f.mkv".into(),
            file_name: "f.mkv".to_string(),
            size: 10,
            duration_secs: Some(10.0),
            video_codec: Some("h265".to_string()),
            audio_codec: Some("ac3".to_string()),
            width: Some(3840),
            height: Some(2160),
            framerate: Some(24.0),
            audio_channels: Some(6),
            audio_language: Some("eng".to_string()),
        };
        let source = media_source("m1", "F", &media);
        assert_eq!(source.default_audio_stream_index, 1);
        assert_eq!(source.media_streams[0].stream_type, "Video");
        assert_eq!(source.media_streams[0].index, 0);
        assert_eq!(source.media_streams[0].codec, "hevc");
        assert_eq!(source.media_streams[0].video_range.as_deref(), Some("SDR"));
        assert_eq!(source.media_streams[1].stream_type, "Audio");
        assert_eq!(source.media_streams[1].index, 1);
        assert_eq!(source.media_streams[1].codec_tag.as_deref(), Some("ac-3"));
        assert_eq!(source.media_streams[1].channel_layout.as_deref(), Some("5.1"));
        assert_eq!(source.container.as_deref(), Some("mkv"));
    }

    #[test]
    fn hd_threshold_is_720() {
        assert!(is_hd(Some(720)));
        assert!(is_hd(Some(1080)));
        assert!(!is_hd(Some(576)));
        assert!(!is_hd(None));
    }
}
