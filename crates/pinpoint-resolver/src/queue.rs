//! Min-priority queue of search states.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Entry<T, K> {
    key: K,
    choices: usize,
    seq: u64,
    item: T,
}

impl<T, K: PartialOrd> PartialEq for Entry<T, K> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T, K: PartialOrd> Eq for Entry<T, K> {}

impl<T, K: PartialOrd> PartialOrd for Entry<T, K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, K: PartialOrd> Ord for Entry<T, K> {
    // `BinaryHeap` pops the greatest entry: lowest key first, then the entry
    // with more choices, then the one pushed earliest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .partial_cmp(&self.key)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.choices.cmp(&other.choices))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Priority queue popping the item with the lowest key.
///
/// Ties go to the item with more choices made, then to insertion order.
/// Incomparable keys (NaN) count as equal.
pub struct PriorityQueue<T, K> {
    heap: BinaryHeap<Entry<T, K>>,
    next_seq: u64,
}

impl<T, K: PartialOrd> PriorityQueue<T, K> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, item: T, key: K, choices: usize) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            key,
            choices,
            seq,
            item,
        });
    }

    pub fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|entry| entry.item)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<T, K: PartialOrd> Default for PriorityQueue<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_lowest_key_first() {
        let mut q = PriorityQueue::new();
        q.push("b", 2.0, 0);
        q.push("a", 1.0, 0);
        q.push("c", 3.0, 0);
        assert_eq!(q.len(), 3);
        assert_eq!(q.pop(), Some("a"));
        assert_eq!(q.pop(), Some("b"));
        assert_eq!(q.pop(), Some("c"));
        assert!(q.pop().is_none());
    }

    #[test]
    fn ties_prefer_more_choices_then_fifo() {
        let mut q = PriorityQueue::new();
        q.push("first", 0.0, 1);
        q.push("deeper", 0.0, 3);
        q.push("second", 0.0, 1);
        assert_eq!(q.pop(), Some("deeper"));
        assert_eq!(q.pop(), Some("first"));
        assert_eq!(q.pop(), Some("second"));
        assert!(q.is_empty());
    }

    #[test]
    fn array_keys_compare_lexicographically() {
        let mut q = PriorityQueue::new();
        q.push("major", [1.0, 0.0], 0);
        q.push("minor", [0.0, 50.0], 0);
        assert_eq!(q.pop(), Some("minor"));
    }
}
