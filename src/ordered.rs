//! OrderedMap: shared core of `SortedMap` and `WeightedMap`.
//!
//! A `Table` plus a cached key order, a dirty flag and the number of rank
//! tiers in the current order, all behind one `RwLock`.
//!
//! Invariants
//! - `keys` is valid only while `dirty` is clear.
//! - Every mutation sets `dirty` before its write guard is released.
//! - Recomputation happens under the exclusive lock, so two readers that
//!   both find the cache stale never write it concurrently. The second one
//!   re-checks `dirty` after acquiring the lock and reuses the first's work.

use crate::error::{Error, Result};
use crate::iter::Entry;
use crate::reentrancy::DebugReentrancy;
use crate::table::Table;
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::hash::{BuildHasher, Hash};
use core::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace, warn};

/// Order over stored entries. Entries comparing `Equal` form a tier. A
/// relation that is not a total order still yields every entry exactly once,
/// in an unspecified order.
pub(crate) trait KeyOrder<K, V>: Send + Sync {
    fn compare(&self, a: (&K, &V), b: (&K, &V)) -> Ordering;
}

struct OrderedState<K, V, S> {
    table: Table<K, V, S>,
    keys: Vec<K>,
    tiers: usize,
    dirty: bool,
}

pub(crate) struct OrderedMap<K, V, S, O> {
    state: RwLock<OrderedState<K, V, S>>,
    order: O,
    read_only: AtomicBool,
    reentrancy: DebugReentrancy,
}

/// Bottom-up stable merge sort. Takes from the right run only on a strict
/// `Less`, and never indexes past a run, so a comparator that is not a
/// total order yields some permutation instead of a panic.
fn merge_sort<T, F>(items: Vec<T>, mut cmp: F) -> Vec<T>
where
    T: Copy,
    F: FnMut(T, T) -> Ordering,
{
    let n = items.len();
    let mut src = items;
    let mut dst: Vec<T> = Vec::with_capacity(n);
    let mut width = 1;
    while width < n {
        dst.clear();
        let mut start = 0;
        while start < n {
            let mid = n.min(start + width);
            let end = n.min(mid + width);
            let (mut i, mut j) = (start, mid);
            while i < mid && j < end {
                if cmp(src[j], src[i]) == Ordering::Less {
                    dst.push(src[j]);
                    j += 1;
                } else {
                    dst.push(src[i]);
                    i += 1;
                }
            }
            dst.extend_from_slice(&src[i..mid]);
            dst.extend_from_slice(&src[j..end]);
            start = end;
        }
        core::mem::swap(&mut src, &mut dst);
        width = width.saturating_mul(2);
    }
    src
}

/// Sort all keys by `order` (stable over table order) and count tiers.
fn arrange<K, V, S, O>(table: &Table<K, V, S>, order: &O) -> (Vec<K>, usize)
where
    K: Eq + Hash + Clone,
    S: BuildHasher,
    O: KeyOrder<K, V>,
{
    let entries: Vec<(&K, &V)> = table.iter().collect();
    let entries = merge_sort(entries, |a, b| order.compare(a, b));
    let boundaries = entries
        .windows(2)
        .filter(|w| order.compare(w[0], w[1]) != Ordering::Equal)
        .count();
    let tiers = if entries.is_empty() { 0 } else { boundaries + 1 };
    (entries.into_iter().map(|(k, _)| k.clone()).collect(), tiers)
}

impl<K, V, S, O> OrderedMap<K, V, S, O>
where
    K: Eq + Hash + Clone,
    S: BuildHasher,
    O: KeyOrder<K, V>,
{
    pub(crate) fn from_table(table: Table<K, V, S>, order: O) -> Self {
        Self {
            state: RwLock::new(OrderedState {
                table,
                keys: Vec::new(),
                tiers: 0,
                dirty: true,
            }),
            order,
            read_only: AtomicBool::new(false),
            reentrancy: DebugReentrancy::new(),
        }
    }

    /// Shared guard over a state whose key order is current.
    fn ordered(&self) -> RwLockReadGuard<'_, OrderedState<K, V, S>> {
        let state = self.state.read();
        if !state.dirty {
            return state;
        }
        drop(state);
        let mut state = self.state.write();
        if state.dirty {
            let (keys, tiers) = arrange(&state.table, &self.order);
            state.keys = keys;
            state.tiers = tiers;
            state.dirty = false;
            trace!(len = state.keys.len(), tiers, "key order recomputed");
        }
        RwLockWriteGuard::downgrade(state)
    }

    /// Exclusive guard for a mutation, or `None` when read-only.
    fn writable(&self, op: &'static str) -> Option<RwLockWriteGuard<'_, OrderedState<K, V, S>>> {
        let state = self.state.write();
        if self.is_read_only() {
            debug!(op, "mutation ignored: map is read-only");
            return None;
        }
        Some(state)
    }

    pub(crate) fn set_read_only(&self) {
        let _g = self.reentrancy.enter();
        let _w = self.state.write();
        self.read_only.store(true, AtomicOrdering::Release);
    }

    pub(crate) fn is_read_only(&self) -> bool {
        self.read_only.load(AtomicOrdering::Acquire)
    }

    pub(crate) fn len(&self) -> usize {
        let _g = self.reentrancy.enter();
        self.state.read().table.len()
    }

    pub(crate) fn exists<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        self.state.read().table.contains_key(q)
    }

    pub(crate) fn get_with<Q, T, F>(&self, q: &Q, f: F) -> Option<T>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&V) -> T,
    {
        let _g = self.reentrancy.enter();
        self.state.read().table.get(q).map(f)
    }

    pub(crate) fn set(&self, key: K, value: V) {
        let _g = self.reentrancy.enter();
        if let Some(mut state) = self.writable("set") {
            state.table.insert(key, value);
            state.dirty = true;
        }
    }

    pub(crate) fn delete<Q>(&self, q: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        if let Some(mut state) = self.writable("delete") {
            state.table.remove(q);
            state.dirty = true;
        }
    }

    pub(crate) fn commit<F>(&self, f: F)
    where
        F: FnOnce(&mut Table<K, V, S>),
    {
        let _g = self.reentrancy.enter();
        if let Some(mut state) = self.writable("commit") {
            // Dirty first: if `f` unwinds, the guard is still released with
            // a stale-marked cache.
            state.dirty = true;
            f(&mut state.table);
        }
    }

    /// Swap in the table built by `build` from the current one.
    pub(crate) fn replace<F>(&self, build: F) -> Result<()>
    where
        F: FnOnce(&Table<K, V, S>) -> Table<K, V, S>,
    {
        let _g = self.reentrancy.enter();
        let Some(mut state) = self.writable("replace") else {
            warn!("load_json rejected: map is read-only");
            return Err(Error::ReadOnly);
        };
        let table = build(&state.table);
        state.table = table;
        state.dirty = true;
        Ok(())
    }

    /// Run `f` against the table under the shared lock, in no particular order.
    pub(crate) fn with_table<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&Table<K, V, S>) -> R,
    {
        let _g = self.reentrancy.enter();
        f(&self.state.read().table)
    }

    pub(crate) fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        let _g = self.reentrancy.enter();
        let state = self.ordered();
        for k in &state.keys {
            if let Some(v) = state.table.get(k) {
                f(k, v);
            }
        }
    }

    pub(crate) fn keys(&self) -> Vec<K> {
        let _g = self.reentrancy.enter();
        self.ordered().keys.clone()
    }

    pub(crate) fn tier_count(&self) -> usize {
        let _g = self.reentrancy.enter();
        self.ordered().tiers
    }

    /// Ordered snapshot with values mapped through `f`.
    pub(crate) fn project<T, F>(&self, f: F) -> Vec<Entry<K, T>>
    where
        F: Fn(&V) -> T,
    {
        let _g = self.reentrancy.enter();
        let state = self.ordered();
        state
            .keys
            .iter()
            .filter_map(|k| state.table.get(k).map(|v| Entry::new(k.clone(), f(v))))
            .collect()
    }

    /// Ordered snapshot split at tier boundaries.
    pub(crate) fn project_tiers<T, F>(&self, f: F) -> Vec<Vec<Entry<K, T>>>
    where
        F: Fn(&V) -> T,
    {
        let _g = self.reentrancy.enter();
        let state = self.ordered();
        let mut groups: Vec<Vec<Entry<K, T>>> = Vec::with_capacity(state.tiers);
        let mut prev: Option<(&K, &V)> = None;
        for k in &state.keys {
            let Some(v) = state.table.get(k) else {
                continue;
            };
            let starts_tier = match prev {
                Some(p) => self.order.compare(p, (k, v)) != Ordering::Equal,
                None => true,
            };
            if starts_tier {
                groups.push(Vec::new());
            }
            if let Some(group) = groups.last_mut() {
                group.push(Entry::new(k.clone(), f(v)));
            }
            prev = Some((k, v));
        }
        groups
    }
}

impl<K, V, S, O> OrderedMap<K, V, S, O>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
    O: KeyOrder<K, V> + Clone,
{
    /// Independent writable copy. The cached order is not carried over.
    pub(crate) fn copy(&self) -> Self {
        let _g = self.reentrancy.enter();
        let table = self.state.read().table.clone();
        Self::from_table(table, self.order.clone())
    }
}
