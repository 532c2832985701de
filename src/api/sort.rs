// Multi-key stable sort over projected items. Field names match
// case-insensitively since clients send both `SortName` and `sortName`.
// Ties fall through to the next field; a total tie keeps input order
// (Vec::sort_by is stable).

use std::cmp::Ordering;
use std::collections::HashMap;

use rand::seq::SliceRandom;

use crate::api::dto::JFItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortField {
    CommunityRating,
    CriticRating,
    DateCreated,
    DatePlayed,
    DateLastContentAdded,
    IndexNumber,
    IsFavoriteOrLiked,
    IsFolder,
    IsPlayed,
    IsUnplayed,
    OfficialRating,
    ParentIndexNumber,
    PremiereDate,
    ProductionYear,
    Random,
    Runtime,
    Name,
}

fn parse_field(name: &str) -> Option<SortField> {
    let field = match name.to_ascii_lowercase().as_str() {
        "communityrating" => SortField::CommunityRating,
        "criticrating" => SortField::CriticRating,
        "datecreated" => SortField::DateCreated,
        "dateplayed" => SortField::DatePlayed,
        "datelastcontentadded" => SortField::DateLastContentAdded,
        "indexnumber" => SortField::IndexNumber,
        "isfavoriteorliked" => SortField::IsFavoriteOrLiked,
        "isfolder" => SortField::IsFolder,
        "isplayed" => SortField::IsPlayed,
        "isunplayed" => SortField::IsUnplayed,
        "officialrating" => SortField::OfficialRating,
        "parentindexnumber" => SortField::ParentIndexNumber,
        "premieredate" => SortField::PremiereDate,
        "productionyear" => SortField::ProductionYear,
        "random" => SortField::Random,
        "runtime" => SortField::Runtime,
        "name" | "seriessortname" | "sortname" | "default" => SortField::Name,
        _ => return None,
    };
    Some(field)
}

fn sort_name_of(item: &JFItem) -> String {
    item.sort_name
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| item.name.clone())
        .to_lowercase()
}

fn cmp_opt_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn cmp_field(field: SortField, a: &JFItem, b: &JFItem) -> Ordering {
    match field {
        SortField::CommunityRating => cmp_opt_f64(a.community_rating, b.community_rating),
        SortField::CriticRating => cmp_opt_f64(a.critic_rating, b.critic_rating),
        SortField::DateCreated | SortField::DateLastContentAdded => {
            a.date_created.cmp(&b.date_created)
        }
        SortField::DatePlayed => a
            .user_data
            .last_played_date
            .cmp(&b.user_data.last_played_date),
        SortField::IndexNumber => a.index_number.cmp(&b.index_number),
        SortField::IsFavoriteOrLiked => a.user_data.is_favorite.cmp(&b.user_data.is_favorite),
        SortField::IsFolder => a.is_folder.cmp(&b.is_folder),
        SortField::IsPlayed => a.user_data.played.cmp(&b.user_data.played),
        SortField::IsUnplayed => b.user_data.played.cmp(&a.user_data.played),
        SortField::OfficialRating => a.official_rating.cmp(&b.official_rating),
        SortField::ParentIndexNumber => a.parent_index_number.cmp(&b.parent_index_number),
        SortField::PremiereDate => a.premiere_date.cmp(&b.premiere_date),
        SortField::ProductionYear => a.production_year.cmp(&b.production_year),
        SortField::Runtime => a.run_time_ticks.cmp(&b.run_time_ticks),
        SortField::Name => sort_name_of(a).cmp(&sort_name_of(b)),
        // Handled before the comparator runs.
        SortField::Random => Ordering::Equal,
    }
}

/// Apply `sortBy`/`sortOrder` from the normalized query in place.
pub fn apply_sort(items: &mut [JFItem], query: &HashMap<String, String>) {
    let Some(sort_by) = query.get("sortBy") else {
        return;
    };
    let fields: Vec<SortField> = sort_by
        .split(',')
        .filter_map(|f| parse_field(f.trim()))
        .collect();
    if fields.is_empty() {
        return;
    }

    if fields.contains(&SortField::Random) {
        items.shuffle(&mut rand::thread_rng());
        return;
    }

    let descending = query
        .get("sortOrder")
        .is_some_and(|o| o.eq_ignore_ascii_case("Descending"));

    items.sort_by(|a, b| {
        let mut ordering = Ordering::Equal;
        for field in &fields {
            ordering = cmp_field(*field, a, b);
            if ordering != Ordering::Equal {
                break;
            }
        }
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, name: &str, year: Option<i32>) -> JFItem {
        JFItem {
            id: id.to_string(),
            name: name.to_string(),
            production_year: year,
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
    fn sorts_by_name_case_insensitively() {
        let mut items = vec![
            item("1", "beta", None),
            item("2", "Alpha", None),
            item("3", "gamma", None),
        ];
        apply_sort(&mut items, &query(&[("sortBy", "SortName")]));
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
    }

    #[test]
    fn descending_reverses_every_key() {
        let mut items = vec![
            item("1", "a", Some(2019)),
            item("2", "b", Some(2021)),
            item("3", "c", Some(2020)),
        ];
        apply_sort(
            &mut items,
            &query(&[("sortBy", "ProductionYear"), ("sortOrder", "Descending")]),
        );
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "1"]);
    }

    #[test]
    fn ties_fall_through_then_keep_input_order() {
        let mut items = vec![
            item("first", "same", Some(2020)),
            item("second", "same", Some(2020)),
            item("third", "same", Some(2019)),
        ];
        apply_sort(
            &mut items,
            &query(&[("sortBy", "ProductionYear,SortName")]),
        );
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        // Year breaks the third out; full ties retain input order.
        assert_eq!(ids, vec!["third", "first", "second"]);
    }

    #[test]
    fn missing_values_sort_before_present_ones() {
        let mut items = vec![item("1", "a", Some(2020)), item("2", "b", None)];
        apply_sort(&mut items, &query(&[("sortBy", "ProductionYear")]));
        assert_eq!(items[0].id, "2");
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let mut items = vec![item("1", "b", None), item("2", "a", None)];
        apply_sort(&mut items, &query(&[("sortBy", "AirTime,SortName")]));
        assert_eq!(items[0].id, "2");
    }

    #[test]
    fn random_keeps_the_same_items() {
        let mut items: Vec<JFItem> = (0..20)
            .map(|i| item(&i.to_string(), &i.to_string(), None))
            .collect();
        apply_sort(&mut items, &query(&[("sortBy", "Random")]));
        assert_eq!(items.len(), 20);
        let mut ids: Vec<i32> = items.iter().map(|i| i.id.parse().unwrap()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..20).collect::<Vec<_>>());
    }
}
