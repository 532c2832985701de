// Query-string filter grammar over projected items. Keys arrive with a
// lowercased first character (the request normalizer guarantees it);
// unknown keys are ignored. Filtering preserves input order, so the
// output is always a subsequence of the input.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::api::dto::{ItemsResponse, JFItem};
use crate::ids;

/// Comma- or pipe-delimited list value.
fn split_list(value: &str) -> Vec<&str> {
    value
        .split(|c| c == ',' || c == '|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Leading date of an ISO-8601 value ("2019-05-01" or a full timestamp).
fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.get(..10)?, "%Y-%m-%d").ok()
}

fn sort_name_of(item: &JFItem) -> String {
    item.sort_name
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| item.name.clone())
        .to_lowercase()
}

/// Decode `genre_`/`studio_`/`person_` style IDs back into names.
fn decode_names(value: &str) -> Vec<String> {
    split_list(value)
        .into_iter()
        .filter_map(|id| match ids::classify(id) {
            ids::ExternalId::Genre(raw)
            | ids::ExternalId::Studio(raw)
            | ids::ExternalId::Person(raw) => ids::decode_name(&raw),
            _ => None,
        })
        .collect()
}

fn matches(item: &JFItem, query: &HashMap<String, String>) -> bool {
    for (key, value) in query {
        let keep = match key.as_str() {
            "includeItemTypes" => split_list(value)
                .iter()
                .any(|t| t.eq_ignore_ascii_case(&item.item_type)),
            "excludeItemTypes" => !split_list(value)
                .iter()
                .any(|t| t.eq_ignore_ascii_case(&item.item_type)),
            "mediaTypes" => match &item.media_type {
                Some(mt) => split_list(value).iter().any(|t| t.eq_ignore_ascii_case(mt)),
                None => false,
            },
            "isHd" => match parse_bool(value) {
                Some(want) => item.is_hd.unwrap_or(false) == want,
                None => true,
            },
            "is4K" => match parse_bool(value) {
                Some(want) => item.video_height().is_some_and(|h| h >= 1500) == want,
                None => true,
            },
            "ids" => split_list(value).contains(&item.id.as_str()),
            "excludeItemIds" => !split_list(value).contains(&item.id.as_str()),
            "genreIds" => {
                let names = decode_names(value);
                item.genres
                    .as_deref()
                    .unwrap_or(&[])
                    .iter()
                    .any(|g| names.contains(g))
            }
            "studioIds" => {
                let names = decode_names(value);
                item.studios
                    .as_deref()
                    .unwrap_or(&[])
                    .iter()
                    .any(|s| names.contains(&s.name))
            }
            "personIds" => {
                let names = decode_names(value);
                item.people
                    .as_deref()
                    .unwrap_or(&[])
                    .iter()
                    .any(|p| names.contains(&p.name))
            }
            "seriesId" => item.series_id.as_deref() == Some(value.as_str()),
            "seasonId" => item.season_id.as_deref() == Some(value.as_str()),
            "parentId" => item.parent_id.as_deref() == Some(value.as_str()),
            "parentIndexNumber" => match value.parse::<i32>() {
                Ok(n) => item.parent_index_number == Some(n),
                Err(_) => true,
            },
            "indexNumber" => match value.parse::<i32>() {
                Ok(n) => item.index_number == Some(n),
                Err(_) => true,
            },
            "nameStartsWith" => sort_name_of(item).starts_with(&value.to_lowercase()),
            "nameStartsWithOrGreater" => sort_name_of(item) >= value.to_lowercase(),
            "nameLessThan" => sort_name_of(item) < value.to_lowercase(),
            "genres" => {
                let wanted = split_list(value);
                item.genres
                    .as_deref()
                    .unwrap_or(&[])
                    .iter()
                    .any(|g| wanted.iter().any(|w| w.eq_ignore_ascii_case(g)))
            }
            "studios" => {
                let wanted = split_list(value);
                item.studios
                    .as_deref()
                    .unwrap_or(&[])
                    .iter()
                    .any(|s| wanted.iter().any(|w| w.eq_ignore_ascii_case(&s.name)))
            }
            "officialRatings" => match &item.official_rating {
                Some(r) => split_list(value).iter().any(|w| w.eq_ignore_ascii_case(r)),
                None => false,
            },
            "minCommunityRating" => match value.parse::<f64>() {
                Ok(min) => item.community_rating.is_some_and(|r| r >= min),
                Err(_) => true,
            },
            "minCriticRating" => match value.parse::<f64>() {
                Ok(min) => item.critic_rating.is_some_and(|r| r >= min),
                Err(_) => true,
            },
            "minPremiereDate" => match parse_date(value) {
                Some(min) => item
                    .premiere_date
                    .as_deref()
                    .and_then(parse_date)
                    .is_some_and(|d| d >= min),
                None => true,
            },
            "maxPremiereDate" => match parse_date(value) {
                Some(max) => item
                    .premiere_date
                    .as_deref()
                    .and_then(parse_date)
                    .is_some_and(|d| d <= max),
                None => true,
            },
            "years" => match item.production_year {
                Some(y) => split_list(value)
                    .iter()
                    .any(|v| v.parse::<i32>() == Ok(y)),
                None => false,
            },
            "isPlayed" => match parse_bool(value) {
                Some(want) => item.user_data.played == want,
                None => true,
            },
            "isFavorite" => match parse_bool(value) {
                Some(want) => item.user_data.is_favorite == want,
                None => true,
            },
            "filters" => split_list(value).iter().all(|f| match *f {
                "IsFavorite" | "IsFavoriteOrLikes" => item.user_data.is_favorite,
                "IsPlayed" => item.user_data.played,
                "IsUnplayed" => !item.user_data.played,
                "IsResumable" => item.user_data.playback_position_ticks > 0,
                _ => true,
            }),
            _ => true,
        };
        if !keep {
            return false;
        }
    }
    true
}

pub fn apply_filters(items: Vec<JFItem>, query: &HashMap<String, String>) -> Vec<JFItem> {
    items.into_iter().filter(|i| matches(i, query)).collect()
}

/// `startIndex` then `limit`, both clamped. TotalRecordCount is the
/// pre-pagination length.
pub fn paginate(items: Vec<JFItem>, query: &HashMap<String, String>) -> ItemsResponse {
    let total = items.len();
    let start = query
        .get("startIndex")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0)
        .min(total);
    let limit = query
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(total - start);

    let page: Vec<JFItem> = items.into_iter().skip(start).take(limit).collect();
    ItemsResponse::new(page, total, start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::JFUserData;

    fn item(id: &str, item_type: &str) -> JFItem {
        JFItem {
            id: id.to_string(),
            name: id.to_string(),
            item_type: item_type.to_string(),
            ..Default::default()
        }
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn filtering_is_a_subsequence_of_the_input() {
        let items = vec![
            item("a", "Movie"),
            item("b", "Series"),
            item("c", "Movie"),
            item("d", "Episode"),
        ];
        let out = apply_filters(items, &query(&[("includeItemTypes", "Movie,Series")]));
        let ids: Vec<&str> = out.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let items = vec![item("a", "Movie")];
        let out = apply_filters(items, &query(&[("enableTotalRecordCount", "true")]));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn is_played_false_keeps_only_unplayed() {
        let mut played = item("a", "Movie");
        played.user_data = JFUserData {
            played: true,
            ..Default::default()
        };
        let items = vec![played, item("b", "Movie")];
        let out = apply_filters(items, &query(&[("isPlayed", "false")]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "b");
    }

    #[test]
    fn genre_id_filters_decode_to_names() {
        let mut drama = item("a", "Movie");
        drama.genres = Some(vec!["Drama".to_string()]);
        let items = vec![drama, item("b", "Movie")];
        let q = query(&[("genreIds", &ids::genre_id("Drama"))]);
        let out = apply_filters(items, &q);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn year_and_name_comparisons() {
        let mut a = item("alpha", "Movie");
        a.production_year = Some(2019);
        let mut b = item("beta", "Movie");
        b.production_year = Some(2020);
        let items = vec![a, b];

        let by_year = apply_filters(items.clone(), &query(&[("years", "2020,2021")]));
        assert_eq!(by_year[0].id, "beta");

        let by_name = apply_filters(items, &query(&[("nameStartsWithOrGreater", "b")]));
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, "beta");
    }

    #[test]
    fn pagination_clamps_and_reports_totals() {
        let items: Vec<JFItem> = (0..5).map(|i| item(&i.to_string(), "Movie")).collect();

        let page = paginate(items.clone(), &query(&[("startIndex", "3"), ("limit", "10")]));
        assert_eq!(page.total_record_count, 5);
        assert_eq!(page.start_index, 3);
        assert_eq!(page.items.len(), 2);

        let beyond = paginate(items, &query(&[("startIndex", "99")]));
        assert_eq!(beyond.items.len(), 0);
        assert_eq!(beyond.total_record_count, 5);
    }
}
