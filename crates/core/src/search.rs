use crate::domain::item::Item;

/// At most this many matches are presented per query, in store-scan order.
pub const MAX_SEARCH_RESULTS: usize = 3;

/// Exact-substring match against the comma-joined tag text or the lowercased
/// description. `query_lower` must already be lowercased. No ranking, no
/// fuzziness — deliberately the simplest retrieval that works.
pub fn matches_query(item: &Item, query_lower: &str) -> bool {
    item.tags.join(",").contains(query_lower)
        || item.description.to_lowercase().contains(query_lower)
}

/// Scan `items` (one owner's partition) and keep the first
/// [`MAX_SEARCH_RESULTS`] matches. Case-insensitive on the query side; tags
/// are lowercase by construction.
pub fn search<'a>(items: &'a [Item], query: &str) -> Vec<&'a Item> {
    let query_lower = query.trim().to_lowercase();
    items.iter().filter(|item| matches_query(item, &query_lower)).take(MAX_SEARCH_RESULTS).collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::item::{Item, ItemId, MediaRef, OwnerId};

    use super::{search, MAX_SEARCH_RESULTS};

    fn item(id: i64, description: &str, tags: &[&str]) -> Item {
        let now = Utc::now();
        Item {
            id: ItemId(id),
            owner_id: OwnerId("owner-1".to_owned()),
            name: "Без названия".to_owned(),
            description: description.to_owned(),
            photo_ref: MediaRef(format!("photo-{id}")),
            tags: tags.iter().map(|tag| (*tag).to_owned()).collect(),
            location: "Спальня".to_owned(),
            created_at: now,
            last_used: now,
        }
    }

    #[test]
    fn matches_tag_substring_case_insensitively() {
        let items = vec![item(1, "Паспорт в синей папке", &["паспорт", "папка"])];

        assert_eq!(search(&items, "ПАСПОРТ").len(), 1);
        assert_eq!(search(&items, "папк").len(), 1);
        assert!(search(&items, "ключи").is_empty());
    }

    #[test]
    fn matches_description_when_tags_miss() {
        let items = vec![item(1, "Зарядка от ноутбука в ящике", &["зарядка"])];

        assert_eq!(search(&items, "ноутбук").len(), 1);
    }

    #[test]
    fn caps_results_in_scan_order() {
        let items: Vec<_> =
            (1..=5).map(|id| item(id, "паспорт на полке", &["паспорт"])).collect();

        let found = search(&items, "паспорт");
        assert_eq!(found.len(), MAX_SEARCH_RESULTS);
        assert_eq!(found[0].id.0, 1);
        assert_eq!(found[2].id.0, 3);
    }

    #[test]
    fn empty_query_matches_everything_up_to_cap() {
        let items: Vec<_> = (1..=4).map(|id| item(id, "что-то", &[])).collect();

        assert_eq!(search(&items, "").len(), MAX_SEARCH_RESULTS);
    }
}
