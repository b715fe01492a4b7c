//! Choice of the next entry to announce

use crate::error::Result;
use crate::feed::FeedEntry;
use crate::store::EntryStore;

/// Pick the first entry, in feed order, whose title has not been recorded
///
/// Returns `Ok(None)` when the feed is empty or every entry has already been
/// announced; that is the normal "nothing new" outcome. The entries are not
/// re-sorted, so when several are new the one listed first wins and the rest
/// wait for later cycles.
///
/// The title is the only deduplication key: two entries with the same title
/// and different links count as one entry.
///
/// # Errors
///
/// Propagates store failures. Without the store no safe choice exists.
pub fn select<'a>(entries: &'a [FeedEntry], store: &dyn EntryStore) -> Result<Option<&'a FeedEntry>> {
    for entry in entries {
        if !store.contains(&entry.title)? {
            return Ok(Some(entry));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn entries(titles: &[&str]) -> Vec<FeedEntry> {
        titles
            .iter()
            .map(|t| FeedEntry::new(*t, "", format!("https://x/{}", t)))
            .collect()
    }

    #[test]
    fn test_select_first_unseen() {
        let store = MemoryStore::with_titles(["A", "B"]);
        let feed = entries(&["A", "B", "C"]);

        let selected = select(&feed, &store).unwrap();
        assert_eq!(selected.map(|e| e.title.as_str()), Some("C"));
    }

    #[test]
    fn test_select_all_seen_returns_none() {
        let store = MemoryStore::with_titles(["A", "B", "C"]);
        let feed = entries(&["A", "B", "C"]);

        assert!(select(&feed, &store).unwrap().is_none());
    }

    #[test]
    fn test_select_empty_feed_returns_none() {
        let store = MemoryStore::new();
        assert!(select(&[], &store).unwrap().is_none());
    }

    #[test]
    fn test_select_keeps_feed_order() {
        let store = MemoryStore::new();
        let feed = entries(&["Zeta", "Alpha", "Mid"]);

        let selected = select(&feed, &store).unwrap();
        assert_eq!(selected.map(|e| e.title.as_str()), Some("Zeta"));
    }

    #[test]
    fn test_select_skips_seen_entries_anywhere_in_feed() {
        let store = MemoryStore::with_titles(["B"]);
        let feed = entries(&["B", "A", "C"]);

        let selected = select(&feed, &store).unwrap();
        assert_eq!(selected.map(|e| e.title.as_str()), Some("A"));
    }

    #[test]
    fn test_select_same_title_different_link_is_seen() {
        let store = MemoryStore::with_titles(["Launch"]);
        let feed = vec![FeedEntry::new("Launch", "", "https://x/other-link")];

        assert!(select(&feed, &store).unwrap().is_none());
    }

    #[test]
    fn test_select_never_returns_recorded_title() {
        let feed = entries(&["A", "B", "C", "D"]);
        let mut store = MemoryStore::new();
        let mut announced = Vec::new();

        while let Some(entry) = select(&feed, &store).unwrap() {
            assert!(!announced.contains(&entry.title));
            announced.push(entry.title.clone());
            store.append(&entry.title).unwrap();
        }

        assert_eq!(announced, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_select_propagates_store_failure() {
        let store = MemoryStore::new();
        store.set_failing(true);

        assert!(select(&entries(&["A"]), &store).is_err());
    }
}
