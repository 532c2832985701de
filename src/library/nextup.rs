// Next-up selection: the next unwatched episode of a partially watched
// series. Pure functions of the watch history and the library.

use std::collections::HashSet;

use super::Library;
use crate::models::{Episode, Show};

/// How far back the cross-series variant looks into the watch history.
pub const RECENCY_WINDOW: usize = 10;

fn sort_season(season_no: i32) -> i32 {
    // Specials (season 0) come after every numbered season.
    if season_no == 0 {
        99
    } else {
        season_no
    }
}

/// Episodes of a show in playback order.
pub fn episodes_in_order(show: &Show) -> Vec<&Episode> {
    let mut eps: Vec<&Episode> = show.episodes().collect();
    eps.sort_by_key(|e| (sort_season(e.season_no), e.episode_no));
    eps
}

/// Next unwatched episode of `show` given the user's played episode IDs,
/// most recent first. `None` when nothing of the show was watched or the
/// show is finished.
pub fn next_up_in_series<'a>(show: &'a Show, recently_watched: &[String]) -> Option<&'a Episode> {
    let eps = episodes_in_order(show);
    let own_ids: HashSet<&str> = eps.iter().map(|e| e.common.id.as_str()).collect();

    let last_watched = recently_watched
        .iter()
        .find(|id| own_ids.contains(id.as_str()))?;
    let pos = eps.iter().position(|e| e.common.id == *last_watched)?;

    let watched: HashSet<&str> = recently_watched.iter().map(String::as_str).collect();
    eps[pos + 1..]
        .iter()
        .find(|e| !watched.contains(e.common.id.as_str()))
        .copied()
}

/// Cross-series next-up: one candidate per recently touched series, in
/// recency order. The walk is bounded by [`RECENCY_WINDOW`]; an optional
/// `series_id` restricts the result to a single series (unbounded walk).
pub fn next_up_in_collection<'a>(
    library: &'a Library,
    recently_watched: &[String],
    series_id: Option<&str>,
) -> Vec<&'a Episode> {
    if let Some(series_id) = series_id {
        return library
            .get_show_by_id(series_id)
            .and_then(|(_, show)| next_up_in_series(show, recently_watched))
            .into_iter()
            .collect();
    }

    let mut seen_series: HashSet<&str> = HashSet::new();
    let mut result = Vec::new();
    for watched_id in recently_watched.iter().take(RECENCY_WINDOW) {
        let Some((_, show)) = library.get_series_of_episode(watched_id) else {
            continue;
        };
        if !seen_series.insert(show.common.id.as_str()) {
            continue;
        }
        if let Some(ep) = next_up_in_series(show, recently_watched) {
            result.push(ep);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::testutil::*;
    use crate::models::CollectionKind;

    fn library_one_show() -> Library {
        let s = show(
            "s1",
            "Gamma",
            vec![
                season(
                    "se1",
                    1,
                    vec![episode("e1", 1, 1), episode("e2", 1, 2), episode("e3", 1, 3)],
                ),
                season("se2", 2, vec![episode("e4", 2, 1)]),
            ],
        );
        Library::new(vec![collection("c1", CollectionKind::TvShows, vec![s])])
    }

    #[test]
    fn next_episode_after_last_watched() {
        let lib = library_one_show();
        let (_, show) = lib.get_show_by_id("s1").unwrap();

        let watched = vec!["e2".to_string()];
        let next = next_up_in_series(show, &watched).unwrap();
        assert_eq!(next.common.id, "e3");
    }

    #[test]
    fn skips_already_watched_successors() {
        let lib = library_one_show();
        let (_, show) = lib.get_show_by_id("s1").unwrap();

        // e3 watched most recently, e2 before; next is the season 2 opener.
        let watched = vec!["e3".to_string(), "e2".to_string()];
        let next = next_up_in_series(show, &watched).unwrap();
        assert_eq!(next.common.id, "e4");
    }

    #[test]
    fn finished_series_yields_nothing() {
        let lib = library_one_show();
        let (_, show) = lib.get_show_by_id("s1").unwrap();

        let watched = vec![
            "e4".to_string(),
            "e3".to_string(),
            "e2".to_string(),
            "e1".to_string(),
        ];
        assert!(next_up_in_series(show, &watched).is_none());
    }

    #[test]
    fn unwatched_series_yields_nothing() {
        let lib = library_one_show();
        let (_, show) = lib.get_show_by_id("s1").unwrap();
        assert!(next_up_in_series(show, &[]).is_none());
    }

    #[test]
    fn specials_sort_after_numbered_seasons() {
        let s = show(
            "s1",
            "Gamma",
            vec![
                season("se0", 0, vec![episode("sp1", 0, 1)]),
                season("se1", 1, vec![episode("e1", 1, 1)]),
            ],
        );
        let lib = Library::new(vec![collection("c1", CollectionKind::TvShows, vec![s])]);
        let (_, show) = lib.get_show_by_id("s1").unwrap();

        let watched = vec!["e1".to_string()];
        let next = next_up_in_series(show, &watched).unwrap();
        assert_eq!(next.common.id, "sp1");
    }

    #[test]
    fn collection_variant_dedupes_series_and_respects_filter() {
        let s1 = show("s1", "Gamma", vec![season("se1", 1, vec![episode("e1", 1, 1), episode("e2", 1, 2)])]);
        let s2 = show("s2", "Delta", vec![season("se3", 1, vec![episode("f1", 1, 1), episode("f2", 1, 2)])]);
        let lib = Library::new(vec![collection("c1", CollectionKind::TvShows, vec![s1, s2])]);

        let watched = vec!["f1".to_string(), "e1".to_string()];
        let ups = next_up_in_collection(&lib, &watched, None);
        let ids: Vec<&str> = ups.iter().map(|e| e.common.id.as_str()).collect();
        assert_eq!(ids, vec!["f2", "e2"]);

        let only_s1 = next_up_in_collection(&lib, &watched, Some("s1"));
        assert_eq!(only_s1.len(), 1);
        assert_eq!(only_s1[0].common.id, "e2");
    }
}
