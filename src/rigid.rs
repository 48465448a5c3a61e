//! Rigid containers: fixed-capacity FIFO buffers that evict their oldest
//! entries on overflow.
//!
//! - `Rigid<T>`: plain bounded buffer.
//! - `RigidSet<T, S>`: bounded buffer that refuses values it already holds.
//!   Evicted values leave the presence index and may be added again.
//! - `SafeRigid` / `SafeRigidSet`: the same behind a reader/writer lock,
//!   returning owned copies.
//!
//! Overflow is not an error: `add` returns what it evicted.

use crate::reentrancy::DebugReentrancy;
use crate::set::PresenceSet;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use parking_lot::RwLock;
use std::collections::hash_map::RandomState;
use std::collections::vec_deque::{self, VecDeque};
use tracing::trace;

#[derive(Clone, Debug)]
pub struct Rigid<T> {
    data: VecDeque<T>,
    capacity: usize,
}

impl<T> Rigid<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append in call order. Returns the oldest entries pushed out, oldest
    /// first; survivors keep their relative order.
    pub fn add<I>(&mut self, values: I) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
    {
        self.data.extend(values);
        let overflow = self.data.len().saturating_sub(self.capacity);
        let evicted: Vec<T> = self.data.drain(..overflow).collect();
        if !evicted.is_empty() {
            trace!(evicted = evicted.len(), capacity = self.capacity, "rigid buffer overflow");
        }
        evicted
    }

    /// Entry at `idx`; an index past the end is clamped to the newest entry.
    /// `None` only when empty.
    pub fn get(&self, idx: usize) -> Option<&T> {
        let last = self.data.len().checked_sub(1)?;
        self.data.get(idx.min(last))
    }

    /// The newest `min(amount, capacity)` entries, oldest first.
    pub fn get_last(&self, amount: usize) -> vec_deque::Iter<'_, T> {
        let take = amount.min(self.capacity).min(self.data.len());
        self.data.range(self.data.len() - take..)
    }

    /// All entries, oldest first.
    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.data.iter()
    }

    pub fn get_all(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.data.iter().cloned().collect()
    }
}

#[derive(Clone)]
pub struct RigidSet<T, S = RandomState> {
    buffer: Rigid<T>,
    present: PresenceSet<T, S>,
}

impl<T: fmt::Debug, S> fmt::Debug for RigidSet<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.buffer.iter()).finish()
    }
}

impl<T> RigidSet<T>
where
    T: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self::with_hasher(capacity, Default::default())
    }
}

impl<T, S> RigidSet<T, S>
where
    T: Eq + Hash + Clone,
    S: BuildHasher,
{
    pub fn with_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            buffer: Rigid::new(capacity),
            present: PresenceSet::with_hasher(hasher),
        }
    }

    /// Append values not already held, including duplicates within this
    /// call, then forget whatever the buffer evicts. Returns the evicted
    /// values.
    pub fn add<I>(&mut self, values: I) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
    {
        let mut fresh = Vec::new();
        for v in values {
            if self.present.insert(v.clone()) {
                fresh.push(v);
            }
        }
        let evicted = self.buffer.add(fresh);
        self.present.remove(evicted.iter());
        evicted
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.present.contains(value)
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.buffer.get(idx)
    }

    pub fn get_last(&self, amount: usize) -> vec_deque::Iter<'_, T> {
        self.buffer.get_last(amount)
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.buffer.iter()
    }

    pub fn get_all(&self) -> Vec<T> {
        self.buffer.get_all()
    }
}

/// Lock-guarded `Rigid`.
#[derive(Debug)]
pub struct SafeRigid<T> {
    inner: RwLock<Rigid<T>>,
    reentrancy: DebugReentrancy,
}

impl<T> SafeRigid<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Rigid::new(capacity)),
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn add<I>(&self, values: I) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
    {
        let _g = self.reentrancy.enter();
        self.inner.write().add(values)
    }

    pub fn capacity(&self) -> usize {
        let _g = self.reentrancy.enter();
        self.inner.read().capacity()
    }

    pub fn len(&self) -> usize {
        let _g = self.reentrancy.enter();
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> SafeRigid<T> {
    pub fn get(&self, idx: usize) -> Option<T> {
        let _g = self.reentrancy.enter();
        self.inner.read().get(idx).cloned()
    }

    pub fn get_last(&self, amount: usize) -> Vec<T> {
        let _g = self.reentrancy.enter();
        self.inner.read().get_last(amount).cloned().collect()
    }

    pub fn get_all(&self) -> Vec<T> {
        let _g = self.reentrancy.enter();
        self.inner.read().get_all()
    }
}

/// Lock-guarded `RigidSet`.
#[derive(Debug)]
pub struct SafeRigidSet<T, S = RandomState> {
    inner: RwLock<RigidSet<T, S>>,
    reentrancy: DebugReentrancy,
}

impl<T> SafeRigidSet<T>
where
    T: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self::with_hasher(capacity, Default::default())
    }
}

impl<T, S> SafeRigidSet<T, S>
where
    T: Eq + Hash + Clone,
    S: BuildHasher,
{
    pub fn with_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            inner: RwLock::new(RigidSet::with_hasher(capacity, hasher)),
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn add<I>(&self, values: I) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
    {
        let _g = self.reentrancy.enter();
        self.inner.write().add(values)
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        self.inner.read().contains(value)
    }

    pub fn capacity(&self) -> usize {
        let _g = self.reentrancy.enter();
        self.inner.read().capacity()
    }

    pub fn len(&self) -> usize {
        let _g = self.reentrancy.enter();
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, idx: usize) -> Option<T> {
        let _g = self.reentrancy.enter();
        self.inner.read().get(idx).cloned()
    }

    pub fn get_last(&self, amount: usize) -> Vec<T> {
        let _g = self.reentrancy.enter();
        self.inner.read().get_last(amount).cloned().collect()
    }

    pub fn get_all(&self) -> Vec<T> {
        let _g = self.reentrancy.enter();
        self.inner.read().get_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_evicts_everything() {
        let mut r = Rigid::new(0);
        assert_eq!(r.add([1, 2]), vec![1, 2]);
        assert!(r.is_empty());
        assert_eq!(r.get(0), None);
        assert_eq!(r.get_last(3).count(), 0);
    }

    #[test]
    fn get_last_never_exceeds_len() {
        let mut r = Rigid::new(5);
        r.add([1, 2]);
        assert_eq!(r.get_last(4).copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn rigid_set_dedups_within_one_call() {
        let mut s = RigidSet::new(4);
        assert!(s.add(["a", "b", "a", "b", "c"]).is_empty());
        assert_eq!(s.get_all(), vec!["a", "b", "c"]);
    }
}
