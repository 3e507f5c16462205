//! Ranking helpers for reducers that need a deterministic top-K or vote.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Stable sort by `key_fn` in `order`, truncated to `k`. Elements with equal
/// keys keep their input order; keys that do not compare (NaN) count as equal.
pub fn top_k_by<T, K, F>(values: impl IntoIterator<Item = T>, k: usize, order: SortOrder, key_fn: F) -> Vec<T>
where
    K: PartialOrd,
    F: Fn(&T) -> K,
{
    let mut items: Vec<T> = values.into_iter().collect();
    items.sort_by(|a, b| {
        let ord = key_fn(a).partial_cmp(&key_fn(b)).unwrap_or(Ordering::Equal);
        match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });
    items.truncate(k);
    items
}

/// Occurrence count of every distinct item, in the order items were first seen.
pub fn count_first_seen<T>(items: impl IntoIterator<Item = T>) -> Vec<(T, u64)>
where
    T: Eq + Hash + Clone,
{
    add_counts_first_seen(items.into_iter().map(|t| (t, 1)))
}

/// Sums pre-counted `(item, count)` pairs, keeping first-seen order.
pub fn add_counts_first_seen<T>(counted: impl IntoIterator<Item = (T, u64)>) -> Vec<(T, u64)>
where
    T: Eq + Hash + Clone,
{
    let mut index: HashMap<T, usize> = HashMap::new();
    let mut counts: Vec<(T, u64)> = Vec::new();
    for (item, n) in counted {
        match index.get(&item) {
            Some(&i) => counts[i].1 += n,
            None => {
                index.insert(item.clone(), counts.len());
                counts.push((item, n));
            }
        }
    }
    counts
}

/// Vote over an empty group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyGroup;

impl fmt::Display for EmptyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "majority vote over an empty group")
    }
}

impl std::error::Error for EmptyGroup {}

/// Label with the highest count. On a tie the label seen first wins.
pub fn majority_vote<L>(labels: impl IntoIterator<Item = L>) -> Result<L, EmptyGroup>
where
    L: Eq + Hash + Clone,
{
    let mut best: Option<(L, u64)> = None;
    for (label, count) in count_first_seen(labels) {
        let beats = match &best {
            Some((_, top)) => count > *top,
            None => true,
        };
        if beats {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label).ok_or(EmptyGroup)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_three_vote_for_a() {
        let neighbours = vec![(5.0, "A"), (1.0, "A"), (4.0, "B"), (3.0, "B"), (2.0, "A")];
        let nearest = top_k_by(neighbours, 3, SortOrder::Ascending, |n| n.0);
        assert_eq!(nearest, vec![(1.0, "A"), (2.0, "A"), (3.0, "B")]);
        assert_eq!(majority_vote(nearest.into_iter().map(|n| n.1)), Ok("A"));
    }

    #[test]
    fn descending_ties_keep_first_seen_order() {
        let counts = vec![("b", 2), ("a", 3), ("c", 2), ("d", 1)];
        let top = top_k_by(counts, 3, SortOrder::Descending, |c| c.1);
        assert_eq!(top, vec![("a", 3), ("b", 2), ("c", 2)]);
    }

    #[test]
    fn k_larger_than_input_returns_everything() {
        assert_eq!(top_k_by(vec![3, 1, 2], 10, SortOrder::Ascending, |x| *x), vec![1, 2, 3]);
        assert!(top_k_by(Vec::<u8>::new(), 5, SortOrder::Ascending, |x| *x).is_empty());
    }

    #[test]
    fn vote_tie_goes_to_first_seen_label() {
        assert_eq!(majority_vote(vec!["B", "A", "A", "B"]), Ok("B"));
        assert_eq!(majority_vote(vec!["C", "A", "B"]), Ok("C"));
    }

    #[test]
    fn vote_over_nothing_fails() {
        assert_eq!(majority_vote(Vec::<String>::new()), Err(EmptyGroup));
    }

    #[test]
    fn counts_merge_in_first_seen_order() {
        let merged = add_counts_first_seen(vec![("x", 2), ("y", 1), ("x", 3)]);
        assert_eq!(merged, vec![("x", 5), ("y", 1)]);
        assert_eq!(count_first_seen("abca".chars()), vec![('a', 2), ('b', 1), ('c', 1)]);
    }
}
