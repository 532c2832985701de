// "More like this": rank items of the same collection by metadata
// overlap with a target item. Deterministic: equal scores keep library
// order.

use crate::models::{Collection, Item};

const GENRE_WEIGHT: i64 = 3;
const STUDIO_WEIGHT: i64 = 2;
const RATING_WEIGHT: i64 = 1;
const YEAR_WEIGHT: i64 = 1;
const YEAR_DISTANCE: i32 = 5;

pub fn similar<'a>(collection: &'a Collection, target: &Item) -> Vec<&'a Item> {
    let t = target.common();

    let mut scored: Vec<(i64, usize, &Item)> = Vec::new();
    for (idx, candidate) in collection.items.iter().enumerate() {
        if candidate.id() == target.id() {
            continue;
        }
        let c = candidate.common();

        let mut score = 0;
        score += GENRE_WEIGHT
            * c.genres()
                .iter()
                .filter(|g| t.genres().contains(g))
                .count() as i64;
        score += STUDIO_WEIGHT
            * c.studios()
                .iter()
                .filter(|s| t.studios().contains(s))
                .count() as i64;
        if let (Some(a), Some(b)) = (t.official_rating(), c.official_rating()) {
            if a == b {
                score += RATING_WEIGHT;
            }
        }
        if let (Some(a), Some(b)) = (t.year(), c.year()) {
            if (a - b).abs() <= YEAR_DISTANCE {
                score += YEAR_WEIGHT;
            }
        }

        if score > 0 {
            scored.push((score, idx, candidate));
        }
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.into_iter().map(|(_, _, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::testutil::*;
    use crate::models::CollectionKind;

    #[test]
    fn ranks_by_overlap_and_stays_stable() {
        let target_nfo = nfo_with(&["Drama", "Crime"], &["A24"], Some("R"), Some(2019));
        let col = collection(
            "c1",
            CollectionKind::Movies,
            vec![
                movie("t", "Target", Some(target_nfo)),
                // two genres + studio + rating + year
                movie("best", "Best", Some(nfo_with(&["Drama", "Crime"], &["A24"], Some("R"), Some(2020)))),
                // one genre only
                movie("weak", "Weak", Some(nfo_with(&["Drama"], &[], None, None))),
                // nothing in common
                movie("none", "None", Some(nfo_with(&["Comedy"], &[], Some("PG"), Some(1990)))),
                // ties with "weak": input order must hold
                movie("weak2", "Weak2", Some(nfo_with(&["Crime"], &[], None, None))),
            ],
        );
        let target = col.items.iter().find(|i| i.id() == "t").unwrap();

        let ranked: Vec<&str> = similar(&col, target).iter().map(|i| i.id()).collect();
        assert_eq!(ranked, vec!["best", "weak", "weak2"]);
    }

    #[test]
    fn target_is_never_its_own_neighbor() {
        let col = collection(
            "c1",
            CollectionKind::Movies,
            vec![movie("t", "Target", Some(nfo_with(&["Drama"], &[], None, None)))],
        );
        let target = &col.items[0];
        assert!(similar(&col, target).is_empty());
    }
}
