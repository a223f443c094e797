use std::collections::VecDeque;

use serde::{Serialize, Serializer};

/// Ordered series that never holds more than `cap` entries. Appends evict
/// from the front, so the oldest *arrival* goes first.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedSeries<T> {
    items: VecDeque<T>,
    cap: usize,
}

impl<T> BoundedSeries<T> {
    pub fn new(cap: usize) -> Self {
        Self { items: VecDeque::with_capacity(cap), cap }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        while self.items.len() > self.cap {
            self.items.pop_front();
        }
    }

    /// Replaces the whole series, keeping only the last `cap` items of `items`.
    pub fn replace<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.items.clear();
        for item in items {
            self.push(item);
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }
}

impl<T: Serialize> Serialize for BoundedSeries<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.items)
    }
}

/// Last-writer-wins replacement guarded by a recency key: `incoming` only
/// replaces the held value when its key is not older. Returns whether the
/// slot changed.
pub fn replace_latest<T, K, F>(slot: &mut Option<T>, incoming: T, key: F) -> bool
where
    K: PartialOrd,
    F: Fn(&T) -> K,
{
    if let Some(held) = slot.as_ref() {
        if key(&incoming) < key(held) {
            return false;
        }
    }
    *slot = Some(incoming);
    true
}
