use shardscan_protocol::SuggestionItem;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Drops later duplicates, orders what is left and keeps the first `count`.
pub fn rank(items: Vec<SuggestionItem>, count: usize) -> Vec<SuggestionItem> {
    let mut seen = HashSet::new();
    let mut unique: Vec<SuggestionItem> = items
        .into_iter()
        .filter(|item| seen.insert(item.dedup_key()))
        .collect();
    unique.sort_by(compare);
    unique.truncate(count);
    unique
}

/// Score descending, then shorter labels, then labels alphabetically.
pub fn compare(a: &SuggestionItem, b: &SuggestionItem) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.length().cmp(&b.length()))
        .then_with(|| a.label.cmp(&b.label))
}
