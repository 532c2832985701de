// Filesystem scan: turns configured library directories into the
// in-memory collection tree. The scan is synchronous and runs once at
// startup; metadata sidecars are discovered here but parsed lazily.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

use crate::config::LibraryConfig;
use crate::library::Library;
use crate::models::{
    Collection, CollectionKind, Episode, Item, ItemCommon, MediaFile, Movie, Season, Show,
};
use crate::nfo::NfoCell;

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ts",
];

static RE_SEASON_EP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Ss](\d{1,2})[Ee](\d{1,3})").unwrap());
static RE_SEASON_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^season[ ._-]*(\d+)$").unwrap());
static RE_YEAR_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)[\s.]*[\(\[](\d{4})[\)\]]\s*$").unwrap());

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Stable item ID derived from the absolute path. Survives rescans as
/// long as the file does not move.
fn path_id(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    digest
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn created_at(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// Strip a trailing "(1999)" style year marker from a display name.
fn clean_name(raw: &str) -> String {
    match RE_YEAR_SUFFIX.captures(raw) {
        Some(caps) => caps[1].trim().to_string(),
        None => raw.trim().to_string(),
    }
}

fn find_with_stems(dir: &Path, stems: &[&str]) -> Option<PathBuf> {
    const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];
    for stem in stems {
        for ext in IMAGE_EXTENSIONS {
            let candidate = dir.join(format!("{stem}.{ext}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

fn find_poster(dir: &Path) -> Option<PathBuf> {
    find_with_stems(dir, &["poster", "folder", "cover"])
}

fn find_fanart(dir: &Path) -> Option<PathBuf> {
    find_with_stems(dir, &["fanart", "backdrop", "background"])
}

fn find_logo(dir: &Path) -> Option<PathBuf> {
    find_with_stems(dir, &["logo", "clearlogo"])
}

fn sidecar_for(video: &Path) -> Option<PathBuf> {
    let nfo = video.with_extension("nfo");
    nfo.is_file().then_some(nfo)
}

fn named_sidecar(dir: &Path, name: &str) -> Option<PathBuf> {
    let nfo = dir.join(name);
    nfo.is_file().then_some(nfo)
}

/// Largest video file under a directory, one level of nesting allowed
/// (extras folders and samples lose to the main feature by size).
fn main_video(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_video_file(e.path()))
        .max_by_key(|e| e.metadata().map(|m| m.len()).unwrap_or(0))
        .map(|e| e.into_path())
}

fn media_file(path: &Path, common: &ItemCommon) -> MediaFile {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let mut media = MediaFile {
        path: path.to_path_buf(),
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        size,
        ..Default::default()
    };

    // One eager parse per media-bearing item; the cell caches it for
    // later projection.
    if let Some(nfo) = common.nfo() {
        let streams = &nfo.streams;
        media.duration_secs = streams
            .duration_secs
            .or_else(|| nfo.runtime.map(|minutes| f64::from(minutes) * 60.0));
        media.video_codec = streams.video_codec.clone();
        media.audio_codec = streams.audio_codec.clone();
        media.width = streams.width;
        media.height = streams.height;
        media.audio_channels = streams.audio_channels;
        media.audio_language = streams.audio_language.clone();
    }
    media
}

fn item_common(id: String, name: String, art_dir: Option<&Path>, created_from: &Path, nfo: NfoCell) -> ItemCommon {
    let (poster, fanart, logo) = match art_dir {
        Some(dir) => (find_poster(dir), find_fanart(dir), find_logo(dir)),
        None => (None, None, None),
    };
    ItemCommon {
        id,
        name,
        sort_name: None,
        created: created_at(created_from),
        nfo,
        poster_path: poster,
        fanart_path: fanart,
        logo_path: logo,
    }
}

fn scan_movie_dir(dir: &Path) -> Option<Item> {
    let video = main_video(dir)?;
    let dir_name = dir.file_name()?.to_string_lossy().into_owned();
    let nfo_path = named_sidecar(dir, "movie.nfo").or_else(|| sidecar_for(&video));

    let mut common = item_common(
        path_id(&video),
        clean_name(&dir_name),
        Some(dir),
        &video,
        NfoCell::new(nfo_path),
    );
    if let Some(title) = common.nfo().and_then(|n| n.title.clone()) {
        common.name = title;
    }
    let media = media_file(&video, &common);
    Some(Item::Movie(Movie { common, media }))
}

fn scan_movie_file(video: &Path) -> Option<Item> {
    let stem = video.file_stem()?.to_string_lossy().into_owned();
    let mut common = item_common(
        path_id(video),
        clean_name(&stem),
        None,
        video,
        NfoCell::new(sidecar_for(video)),
    );
    if let Some(title) = common.nfo().and_then(|n| n.title.clone()) {
        common.name = title;
    }
    let media = media_file(video, &common);
    Some(Item::Movie(Movie { common, media }))
}

fn scan_movies(root: &Path) -> Result<Vec<Item>> {
    let mut items = Vec::new();
    let entries =
        std::fs::read_dir(root).with_context(|| format!("reading {}", root.display()))?;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let item = if path.is_dir() {
            scan_movie_dir(&path)
        } else if is_video_file(&path) {
            scan_movie_file(&path)
        } else {
            None
        };
        if let Some(item) = item {
            items.push(item);
        }
    }
    items.sort_by(|a, b| a.common().name.cmp(&b.common().name));
    Ok(items)
}

fn scan_episode(video: &Path) -> Option<Episode> {
    let file_name = video.file_name()?.to_string_lossy().into_owned();
    let caps = RE_SEASON_EP.captures(&file_name)?;
    let season_no: i32 = caps.get(1)?.as_str().parse().ok()?;
    let episode_no: i32 = caps.get(2)?.as_str().parse().ok()?;

    let stem = video.file_stem()?.to_string_lossy().into_owned();
    let mut common = item_common(
        path_id(video),
        stem,
        None,
        video,
        NfoCell::new(sidecar_for(video)),
    );
    if let Some(title) = common.nfo().and_then(|n| n.title.clone()) {
        common.name = title;
    } else {
        common.name = format!("Episode {episode_no}");
    }
    let media = media_file(video, &common);
    Some(Episode {
        common,
        season_no,
        episode_no,
        media,
    })
}

fn season_number_of(dir_name: &str) -> Option<i32> {
    if dir_name.eq_ignore_ascii_case("specials") {
        return Some(0);
    }
    RE_SEASON_DIR
        .captures(dir_name)
        .and_then(|caps| caps[1].parse().ok())
}

fn scan_show(dir: &Path) -> Option<Item> {
    let dir_name = dir.file_name()?.to_string_lossy().into_owned();
    let mut episodes_by_season: std::collections::BTreeMap<i32, (Vec<Episode>, Option<PathBuf>)> =
        std::collections::BTreeMap::new();

    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(season_no) = season_number_of(&name) else {
                continue;
            };
            let slot = episodes_by_season
                .entry(season_no)
                .or_insert_with(|| (Vec::new(), find_poster(&path)));
            for file in WalkDir::new(&path)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_video_file(e.path()))
            {
                if let Some(mut ep) = scan_episode(file.path()) {
                    // The directory decides the season, not the filename.
                    ep.season_no = season_no;
                    slot.0.push(ep);
                }
            }
        } else if is_video_file(&path) {
            // Loose episodes directly in the show folder.
            if let Some(ep) = scan_episode(&path) {
                episodes_by_season
                    .entry(ep.season_no)
                    .or_insert_with(|| (Vec::new(), None))
                    .0
                    .push(ep);
            }
        }
    }

    let mut seasons = Vec::new();
    for (season_no, (mut episodes, poster)) in episodes_by_season {
        if episodes.is_empty() {
            continue;
        }
        episodes.sort_by_key(|e| e.episode_no);
        seasons.push(Season {
            id: path_id(&dir.join(format!("season-{season_no}"))),
            season_no,
            episodes,
            poster_path: poster,
        });
    }
    if seasons.is_empty() {
        return None;
    }

    let mut common = item_common(
        path_id(dir),
        clean_name(&dir_name),
        Some(dir),
        dir,
        NfoCell::new(named_sidecar(dir, "tvshow.nfo")),
    );
    if let Some(title) = common.nfo().and_then(|n| n.title.clone()) {
        common.name = title;
    }
    Some(Item::Show(Show { common, seasons }))
}

fn scan_shows(root: &Path) -> Result<Vec<Item>> {
    let mut items = Vec::new();
    let entries =
        std::fs::read_dir(root).with_context(|| format!("reading {}", root.display()))?;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            if let Some(item) = scan_show(&path) {
                items.push(item);
            }
        }
    }
    items.sort_by(|a, b| a.common().name.cmp(&b.common().name));
    Ok(items)
}

fn scan_collection(config: &LibraryConfig) -> Result<Collection> {
    let kind = CollectionKind::parse(&config.kind)
        .with_context(|| format!("unknown library kind '{}'", config.kind))?;
    let root = config.path.clone();
    let items = match kind {
        CollectionKind::Movies => scan_movies(&root)?,
        CollectionKind::TvShows => scan_shows(&root)?,
    };
    tracing::info!(
        "Scanned library '{}': {} items under {}",
        config.name,
        items.len(),
        root.display()
    );
    Ok(Collection {
        id: path_id(&root),
        name: config.name.clone(),
        kind,
        root,
        items,
    })
}

/// Scan every configured library into a fresh `Library`. Unreadable
/// library roots fail the scan; a library with zero items is fine.
pub fn scan_libraries(configs: &[LibraryConfig]) -> Result<Library> {
    let mut collections = Vec::with_capacity(configs.len());
    for config in configs {
        collections.push(scan_collection(config)?);
    }
    Ok(Library::new(collections))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn movie_directory_with_art_and_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("Blade Runner (1982)");
        fs::create_dir(&dir).unwrap();
        touch(&dir.join("Blade Runner.mkv"));
        touch(&dir.join("poster.jpg"));
        touch(&dir.join("fanart.jpg"));
        fs::write(
            dir.join("movie.nfo"),
            "<movie><title>Blade Runner</title><year>1982</year></movie>",
        )
        .unwrap();

        let items = scan_movies(tmp.path()).unwrap();
        assert_eq!(items.len(), 1);
        let common = items[0].common();
        assert_eq!(common.name, "Blade Runner");
        assert!(common.poster_path.is_some());
        assert!(common.fanart_path.is_some());
        assert!(common.logo_path.is_none());
        assert_eq!(common.year(), Some(1982));
    }

    #[test]
    fn bare_video_file_is_a_movie() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("Heat (1995).mp4"));
        let items = scan_movies(tmp.path()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].common().name, "Heat");
    }

    #[test]
    fn show_with_seasons_and_specials() {
        let tmp = tempfile::tempdir().unwrap();
        let show = tmp.path().join("Some Show");
        for (dir, file) in [
            ("Season 1", "Some Show S01E01.mkv"),
            ("Season 1", "Some Show S01E02.mkv"),
            ("Season 2", "Some Show S02E01.mkv"),
            ("Specials", "Some Show S00E01.mkv"),
        ] {
            let season_dir = show.join(dir);
            fs::create_dir_all(&season_dir).unwrap();
            touch(&season_dir.join(file));
        }

        let items = scan_shows(tmp.path()).unwrap();
        assert_eq!(items.len(), 1);
        let Item::Show(s) = &items[0] else {
            panic!("expected a show");
        };
        assert_eq!(s.seasons.len(), 3);
        assert_eq!(s.episode_count(), 4);
        // BTreeMap ordering: specials (0) first in storage.
        assert_eq!(s.seasons[0].season_no, 0);
        assert_eq!(s.seasons[1].season_no, 1);
        assert_eq!(s.seasons[1].episodes.len(), 2);
        assert_eq!(s.seasons[1].episodes[0].episode_no, 1);
    }

    #[test]
    fn directories_without_episodes_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("Empty Folder")).unwrap();
        let items = scan_shows(tmp.path()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn season_directory_names() {
        assert_eq!(season_number_of("Season 1"), Some(1));
        assert_eq!(season_number_of("season 02"), Some(2));
        assert_eq!(season_number_of("Season_3"), Some(3));
        assert_eq!(season_number_of("Specials"), Some(0));
        assert_eq!(season_number_of("Extras"), None);
    }

    #[test]
    fn year_markers_are_stripped_from_names() {
        assert_eq!(clean_name("The Matrix (1999)"), "The Matrix");
        assert_eq!(clean_name("Dune [2021]"), "Dune");
        assert_eq!(clean_name("No Year Here"), "No Year Here");
    }

    #[test]
    fn path_ids_are_stable_and_distinct() {
        let a = path_id(Path::new("/media/a.mkv"));
        let b = path_id(Path::new("/media/b.mkv"));
        assert_eq!(a, path_id(Path::new("/media/a.mkv")));
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
    }
}
