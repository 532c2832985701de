// Read-only view of the scanned media library. The library is built
// once at startup and shared behind an Arc; every method here is a pure
// read, so request handlers never take locks.

use std::collections::BTreeMap;

use crate::models::{Collection, Episode, Item, Movie, Season, Show};
use crate::nfo::PersonKind;

pub mod nextup;
pub mod similar;

#[derive(Debug, Default)]
pub struct Library {
    collections: Vec<Collection>,
}

/// Aggregated facets, per collection or across the whole library.
/// BTree keeps wire output stable between requests.
#[derive(Debug, Default, Clone)]
pub struct Details {
    pub genres: Vec<String>,
    pub studios: Vec<String>,
    pub official_ratings: Vec<String>,
    pub years: Vec<i32>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PersonInfo {
    pub name: String,
    /// Poster URL from a sidecar, when any item knew one.
    pub thumb: Option<String>,
    pub item_count: usize,
}

impl Library {
    pub fn new(collections: Vec<Collection>) -> Self {
        Self { collections }
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn get_collection(&self, id: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.id == id)
    }

    /// Bare-ID lookup: movies and shows only (the prefixless wire form).
    pub fn get_item_by_id(&self, id: &str) -> Option<(&Collection, &Item)> {
        for collection in &self.collections {
            if let Some(item) = collection.items.iter().find(|i| i.id() == id) {
                return Some((collection, item));
            }
        }
        None
    }

    pub fn get_show_by_id(&self, id: &str) -> Option<(&Collection, &Show)> {
        match self.get_item_by_id(id)? {
            (c, Item::Show(s)) => Some((c, s)),
            _ => None,
        }
    }

    pub fn get_movie_by_id(&self, id: &str) -> Option<(&Collection, &Movie)> {
        match self.get_item_by_id(id)? {
            (c, Item::Movie(m)) => Some((c, m)),
            _ => None,
        }
    }

    pub fn get_season_by_id(&self, id: &str) -> Option<(&Collection, &Show, &Season)> {
        for collection in &self.collections {
            for item in &collection.items {
                if let Item::Show(show) = item {
                    if let Some(season) = show.seasons.iter().find(|s| s.id == id) {
                        return Some((collection, show, season));
                    }
                }
            }
        }
        None
    }

    pub fn get_episode_by_id(
        &self,
        id: &str,
    ) -> Option<(&Collection, &Show, &Season, &Episode)> {
        for collection in &self.collections {
            for item in &collection.items {
                if let Item::Show(show) = item {
                    for season in &show.seasons {
                        if let Some(ep) = season.episodes.iter().find(|e| e.common.id == id) {
                            return Some((collection, show, season, ep));
                        }
                    }
                }
            }
        }
        None
    }

    /// Owning show for an episode ID.
    pub fn get_series_of_episode(&self, episode_id: &str) -> Option<(&Collection, &Show)> {
        let (c, show, _, _) = self.get_episode_by_id(episode_id)?;
        Some((c, show))
    }

    pub fn items(&self) -> impl Iterator<Item = (&Collection, &Item)> {
        self.collections
            .iter()
            .flat_map(|c| c.items.iter().map(move |i| (c, i)))
    }

    /// Facets across every collection.
    pub fn details(&self) -> Details {
        facets(self.items().map(|(_, i)| i))
    }

    /// Facets of one collection.
    pub fn collection_details(&self, collection: &Collection) -> Details {
        facets(collection.items.iter())
    }

    /// Genre name → number of referring top-level media items.
    pub fn genre_item_count(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for (_, item) in self.items() {
            for genre in item.common().genres() {
                *counts.entry(genre.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn studio_item_count(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for (_, item) in self.items() {
            for studio in item.common().studios() {
                *counts.entry(studio.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Case-insensitive substring search over movie and show names.
    pub fn search_item(&self, term: &str) -> Vec<(&Collection, &Item)> {
        let needle = term.to_lowercase();
        self.items()
            .filter(|(_, item)| item.common().name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn search_person(&self, term: &str) -> Vec<PersonInfo> {
        let needle = term.to_lowercase();
        self.persons()
            .into_values()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn get_person_by_name(&self, name: &str) -> Option<PersonInfo> {
        self.persons().remove(&name.to_lowercase())
    }

    /// Every credited person across the library, keyed by lowercase name.
    pub fn persons(&self) -> BTreeMap<String, PersonInfo> {
        let mut persons: BTreeMap<String, PersonInfo> = BTreeMap::new();
        for (_, item) in self.items() {
            if let Some(nfo) = item.common().nfo() {
                for member in &nfo.cast {
                    let entry = persons
                        .entry(member.name.to_lowercase())
                        .or_insert_with(|| PersonInfo {
                            name: member.name.clone(),
                            thumb: None,
                            item_count: 0,
                        });
                    entry.item_count += 1;
                    if entry.thumb.is_none() {
                        entry.thumb = member.thumb.clone();
                    }
                }
            }
        }
        persons
    }

    /// Items crediting the person, for the person child count and filters.
    pub fn items_with_person(&self, name: &str) -> Vec<(&Collection, &Item)> {
        let needle = name.to_lowercase();
        self.items()
            .filter(|(_, item)| {
                item.common()
                    .nfo()
                    .map(|n| n.cast.iter().any(|c| c.name.to_lowercase() == needle))
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn person_thumb(&self, name: &str) -> Option<String> {
        let needle = name.to_lowercase();
        for (_, item) in self.items() {
            if let Some(nfo) = item.common().nfo() {
                for member in &nfo.cast {
                    if member.kind == PersonKind::Actor
                        && member.name.to_lowercase() == needle
                    {
                        if let Some(thumb) = &member.thumb {
                            return Some(thumb.clone());
                        }
                    }
                }
            }
        }
        None
    }
}

fn facets<'a>(items: impl Iterator<Item = &'a Item>) -> Details {
    let mut genres = BTreeMap::new();
    let mut studios = BTreeMap::new();
    let mut ratings = BTreeMap::new();
    let mut years = BTreeMap::new();

    for item in items {
        let common = item.common();
        for g in common.genres() {
            genres.insert(g.clone(), ());
        }
        for s in common.studios() {
            studios.insert(s.clone(), ());
        }
        if let Some(r) = common.official_rating() {
            ratings.insert(r.to_string(), ());
        }
        if let Some(y) = common.year() {
            years.insert(y, ());
        }
    }

    Details {
        genres: genres.into_keys().collect(),
        studios: studios.into_keys().collect(),
        official_ratings: ratings.into_keys().collect(),
        years: years.into_keys().collect(),
        tags: Vec::new(),
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use chrono::Utc;
    use std::path::PathBuf;

    use crate::models::*;
    use crate::nfo::{CastMember, Nfo, NfoCell, PersonKind};

    pub fn common(id: &str, name: &str, nfo: Option<Nfo>) -> ItemCommon {
        ItemCommon {
            id: id.to_string(),
            name: name.to_string(),
            sort_name: None,
            created: Utc::now(),
            nfo: nfo.map(NfoCell::preparsed).unwrap_or_default(),
            poster_path: Some(PathBuf::from(format!("/media/{id}/poster.jpg"))),
            fanart_path: None,
            logo_path: None,
        }
    }

    pub fn media(duration: f64) -> MediaFile {
        MediaFile {
            path: PathBuf::from("/media/file.mkv"),
            file_name: "file.mkv".to_string(),
            size: 1024,
            duration_secs: Some(duration),
            video_codec: Some("h264".to_string()),
            audio_codec: Some("aac".to_string()),
            width: Some(1920),
            height: Some(1080),
            framerate: Some(23.976),
            audio_channels: Some(6),
            audio_language: Some("eng".to_string()),
        }
    }

    pub fn movie(id: &str, name: &str, nfo: Option<Nfo>) -> Item {
        Item::Movie(Movie {
            common: common(id, name, nfo),
            media: media(5400.0),
        })
    }

    pub fn nfo_with(genres: &[&str], studios: &[&str], rating: Option<&str>, year: Option<i32>) -> Nfo {
        Nfo {
            genres: genres.iter().map(|s| s.to_string()).collect(),
            studios: studios.iter().map(|s| s.to_string()).collect(),
            official_rating: rating.map(|s| s.to_string()),
            year,
            ..Default::default()
        }
    }

    pub fn cast(name: &str, kind: PersonKind) -> CastMember {
        CastMember {
            name: name.to_string(),
            role: None,
            kind,
            thumb: None,
        }
    }

    pub fn episode(id: &str, season_no: i32, episode_no: i32) -> Episode {
        Episode {
            common: common(id, &format!("Episode {episode_no}"), None),
            season_no,
            episode_no,
            media: media(1800.0),
        }
    }

    pub fn show(id: &str, name: &str, seasons: Vec<Season>) -> Item {
        Item::Show(Show {
            common: common(id, name, None),
            seasons,
        })
    }

    pub fn season(id: &str, season_no: i32, episodes: Vec<Episode>) -> Season {
        Season {
            id: id.to_string(),
            season_no,
            episodes,
            poster_path: None,
        }
    }

    pub fn collection(id: &str, kind: CollectionKind, items: Vec<Item>) -> Collection {
        Collection {
            id: id.to_string(),
            name: id.to_string(),
            kind,
            root: PathBuf::from("/media"),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;
    use crate::models::CollectionKind;

    fn sample() -> Library {
        let movies = collection(
            "c1",
            CollectionKind::Movies,
            vec![
                movie("m1", "Alpha", Some(nfo_with(&["Drama"], &["A24"], Some("R"), Some(2019)))),
                movie("m2", "Beta", Some(nfo_with(&["Drama", "Crime"], &[], None, Some(2020)))),
            ],
        );
        let shows = collection(
            "c2",
            CollectionKind::TvShows,
            vec![show(
                "s1",
                "Gamma",
                vec![season("se1", 1, vec![episode("e1", 1, 1), episode("e2", 1, 2)])],
            )],
        );
        Library::new(vec![movies, shows])
    }

    #[test]
    fn lookups_resolve_across_collections() {
        let lib = sample();
        assert!(lib.get_item_by_id("m1").is_some());
        assert!(lib.get_show_by_id("s1").is_some());
        let (_, show, season, ep) = lib.get_episode_by_id("e2").unwrap();
        assert_eq!(show.common.id, "s1");
        assert_eq!(season.season_no, 1);
        assert_eq!(ep.episode_no, 2);
        assert!(lib.get_item_by_id("nope").is_none());
    }

    #[test]
    fn details_aggregate_and_dedupe() {
        let lib = sample();
        let details = lib.details();
        assert_eq!(details.genres, vec!["Crime", "Drama"]);
        assert_eq!(details.studios, vec!["A24"]);
        assert_eq!(details.official_ratings, vec!["R"]);
        assert_eq!(details.years, vec![2019, 2020]);
    }

    #[test]
    fn genre_counts_count_referring_items() {
        let lib = sample();
        let counts = lib.genre_item_count();
        assert_eq!(counts.get("Drama"), Some(&2));
        assert_eq!(counts.get("Crime"), Some(&1));
    }

    #[test]
    fn search_is_case_insensitive() {
        let lib = sample();
        assert_eq!(lib.search_item("alp").len(), 1);
        assert_eq!(lib.search_item("AMM").len(), 1); // gAMMa
        assert!(lib.search_item("zeta").is_empty());
    }
}
