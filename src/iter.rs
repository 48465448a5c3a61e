//! Lazy, single-pass sequences produced by the containers.
//!
//! A sequence is filled from a snapshot taken under the container's shared
//! lock; the lock is released before the caller sees the first element.
//! Consumers may stop early: nothing stays locked and the container is
//! unaffected.

use crossbeam_channel::{bounded, Receiver};

/// An immutable `(key, value)` pair yielded by iteration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Entry<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> Entry<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Self { key, value }
    }

    pub fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }
}

impl<K, V> From<(K, V)> for Entry<K, V> {
    fn from((key, value): (K, V)) -> Self {
        Self { key, value }
    }
}

/// Queue a snapshot into a closed bounded channel of exactly its size.
/// Capacity equals the item count, so no send can block.
fn closed_queue<T>(items: Vec<T>) -> Receiver<T> {
    let (tx, rx) = bounded(items.len());
    for item in items {
        if tx.send(item).is_err() {
            break;
        }
    }
    rx
}

/// Lazy sequence of entries. Dropping it early is always safe.
#[derive(Debug)]
pub struct Iter<K, V> {
    rx: Receiver<Entry<K, V>>,
}

impl<K, V> Iter<K, V> {
    pub(crate) fn from_snapshot(entries: Vec<Entry<K, V>>) -> Self {
        Self {
            rx: closed_queue(entries),
        }
    }

    pub fn empty() -> Self {
        Self::from_snapshot(Vec::new())
    }

    /// Entries still queued.
    pub fn remaining(&self) -> usize {
        self.rx.len()
    }
}

impl<K, V> Iterator for Iter<K, V> {
    type Item = Entry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        // The sender is gone once the snapshot is queued; recv fails exactly
        // when the queue is drained.
        self.rx.recv().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.rx.len();
        (n, Some(n))
    }
}

impl<K, V> ExactSizeIterator for Iter<K, V> {}

/// Sequence of sequences: one `Iter` per rank tier, highest tier first.
///
/// Tiers never interleave; every entry of a tier is queued in that tier's
/// `Iter` before the next tier is yielded.
#[derive(Debug)]
pub struct Tiers<K, V> {
    rx: Receiver<Iter<K, V>>,
}

impl<K, V> Tiers<K, V> {
    pub(crate) fn from_groups(groups: Vec<Vec<Entry<K, V>>>) -> Self {
        Self {
            rx: closed_queue(groups.into_iter().map(Iter::from_snapshot).collect()),
        }
    }

    pub fn empty() -> Self {
        Self::from_groups(Vec::new())
    }
}

impl<K, V> Iterator for Tiers<K, V> {
    type Item = Iter<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.rx.len();
        (n, Some(n))
    }
}

impl<K, V> ExactSizeIterator for Tiers<K, V> {}
