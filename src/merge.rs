//! Id-deduplicating merges for the feed and comment collections.

use std::collections::HashSet;

use crate::model::Identified;

/// Appends every incoming item whose id is not yet present.
///
/// Existing entries keep their position; incoming items keep their relative
/// order. When `incoming` repeats an id only its first occurrence is kept.
pub fn merge<T: Identified>(existing: Vec<T>, incoming: Vec<T>) -> Vec<T> {
    let mut seen: HashSet<String> = existing.iter().map(|item| item.id().to_string()).collect();
    let mut merged = existing;
    merged.reserve(incoming.len());
    for item in incoming {
        if seen.insert(item.id().to_string()) {
            merged.push(item);
        }
    }
    merged
}

/// Puts `item` in front of the collection unless its id is already there.
pub fn prepend<T: Identified>(existing: Vec<T>, item: T) -> Vec<T> {
    if existing.iter().any(|present| present.id() == item.id()) {
        return existing;
    }
    let mut merged = Vec::with_capacity(existing.len() + 1);
    merged.push(item);
    merged.extend(existing);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(&'static str, u32);

    impl Identified for Item {
        fn id(&self) -> &str {
            self.0
        }
    }

    fn ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(|item| item.0).collect()
    }

    #[test]
    fn overlapping_page_is_not_duplicated() {
        let merged = merge(
            vec![Item("m1", 0), Item("m2", 0)],
            vec![Item("m2", 1), Item("m3", 1)],
        );
        assert_eq!(ids(&merged), ["m1", "m2", "m3"]);
        assert_eq!(merged[1], Item("m2", 0), "existing entry wins");
    }

    #[test]
    fn disjoint_pages_concatenate() {
        let a = vec![Item("a", 0), Item("b", 0)];
        let b = vec![Item("c", 0), Item("d", 0)];
        let merged = merge(a.clone(), b.clone());
        let mut expected = a;
        expected.extend(b);
        assert_eq!(merged, expected);
    }

    #[test]
    fn merging_the_same_page_twice_is_idempotent() {
        let a = vec![Item("a", 0), Item("b", 0)];
        let b = vec![Item("b", 1), Item("c", 1), Item("a", 1)];
        let once = merge(a, b.clone());
        let twice = merge(once.clone(), b);
        assert_eq!(once, twice);
    }

    #[test]
    fn never_drops_existing_entries() {
        let a = vec![Item("x", 0), Item("y", 0), Item("z", 0)];
        let merged = merge(a.clone(), vec![Item("y", 9), Item("q", 9)]);
        for item in &a {
            assert!(merged.contains(item));
        }
    }

    #[test]
    fn first_incoming_duplicate_survives() {
        let merged = merge(
            vec![Item("a", 0)],
            vec![Item("b", 1), Item("a", 1), Item("b", 2)],
        );
        assert_eq!(merged, vec![Item("a", 0), Item("b", 1)]);
    }

    #[test]
    fn prepend_puts_new_item_first_once() {
        let list = prepend(vec![Item("c1", 0)], Item("c2", 0));
        assert_eq!(ids(&list), ["c2", "c1"]);
        let again = prepend(list.clone(), Item("c2", 5));
        assert_eq!(again, list);
    }
}
