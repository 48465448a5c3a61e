//! SafeMap: a `Table` behind a reader/writer lock with a read-only mode.

use crate::error::{Error, Result};
use crate::iter::{Entry, Iter};
use crate::reentrancy::DebugReentrancy;
use crate::table::Table;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::sync::atomic::{AtomicBool, Ordering};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::hash_map::RandomState;
use tracing::{debug, warn};

/// Concurrency-safe map with no defined iteration order.
///
/// Reads share the lock, writes take it exclusively. Once made read-only,
/// `set`/`delete`/`commit` are silently ignored; check `is_read_only()` if
/// the rejection matters.
pub struct SafeMap<K, V, S = RandomState> {
    table: RwLock<Table<K, V, S>>,
    read_only: AtomicBool,
    reentrancy: DebugReentrancy,
}

impl<K, V> SafeMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V, S> Default for SafeMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> From<Table<K, V, S>> for SafeMap<K, V, S> {
    fn from(table: Table<K, V, S>) -> Self {
        Self {
            table: RwLock::new(table),
            read_only: AtomicBool::new(false),
            reentrancy: DebugReentrancy::new(),
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for SafeMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Table<K, V, S>>())
    }
}

impl<K, V, S> SafeMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::from(Table::with_hasher(hasher))
    }

    /// Builder form of `set_read_only`.
    pub fn read_only(self) -> Self {
        self.set_read_only();
        self
    }

    /// Freeze the map. Irreversible.
    pub fn set_read_only(&self) {
        // Flip under the write lock so no in-flight mutation straddles it.
        let _g = self.reentrancy.enter();
        let _w = self.table.write();
        self.read_only.store(true, Ordering::Release);
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        let _g = self.reentrancy.enter();
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn exists<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        self.table.read().contains_key(q)
    }

    /// Value for `q`, or `V::default()` when absent.
    pub fn get<Q>(&self, q: &Q) -> V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone + Default,
    {
        self.get_full(q).unwrap_or_default()
    }

    /// Value for `q` if present.
    pub fn get_full<Q>(&self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        let _g = self.reentrancy.enter();
        self.table.read().get(q).cloned()
    }

    pub fn set(&self, key: K, value: V) {
        let _g = self.reentrancy.enter();
        let mut t = self.table.write();
        if self.is_read_only() {
            debug!("set ignored: map is read-only");
            return;
        }
        t.insert(key, value);
    }

    pub fn delete<Q>(&self, q: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let mut t = self.table.write();
        if self.is_read_only() {
            debug!("delete ignored: map is read-only");
            return;
        }
        t.remove(q);
    }

    /// Run `f` with exclusive access to the backing table.
    pub fn commit<F>(&self, f: F)
    where
        F: FnOnce(&mut Table<K, V, S>),
    {
        let _g = self.reentrancy.enter();
        let mut t = self.table.write();
        if self.is_read_only() {
            debug!("commit ignored: map is read-only");
            return;
        }
        f(&mut t);
    }

    /// Call `f` for every entry under the shared lock. `f` must not call
    /// back into this map.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        let _g = self.reentrancy.enter();
        for (k, v) in self.table.read().iter() {
            f(k, v);
        }
    }
}

impl<K, V, S> SafeMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher,
{
    pub fn keys(&self) -> Vec<K> {
        let _g = self.reentrancy.enter();
        self.table.read().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<V> {
        let _g = self.reentrancy.enter();
        self.table.read().values().cloned().collect()
    }

    /// Snapshot sequence of all entries. The lock is released before this
    /// returns, so partially consumed sequences never block writers.
    pub fn iter(&self) -> Iter<K, V> {
        let _g = self.reentrancy.enter();
        let snapshot: Vec<Entry<K, V>> = {
            let t = self.table.read();
            t.iter()
                .map(|(k, v)| Entry::new(k.clone(), v.clone()))
                .collect()
        };
        Iter::from_snapshot(snapshot)
    }
}

impl<K, V, S> SafeMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Independent, writable deep copy.
    pub fn copy(&self) -> Self {
        let _g = self.reentrancy.enter();
        let table = self.table.read().clone();
        Self::from(table)
    }
}

impl<K, V, S> SafeMap<K, V, S>
where
    K: Eq + Hash + Serialize,
    V: Serialize,
    S: BuildHasher,
{
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<K, V, S> SafeMap<K, V, S>
where
    K: Eq + Hash + DeserializeOwned,
    V: DeserializeOwned,
    S: BuildHasher + Default,
{
    /// Replace the whole contents with the decoded JSON object.
    ///
    /// Fails with `Error::ReadOnly` on a read-only map. The input is decoded
    /// before the lock is taken, so a decode error leaves the map untouched.
    pub fn load_json(&self, json: &str) -> Result<()> {
        if self.is_read_only() {
            warn!("load_json rejected: map is read-only");
            return Err(Error::ReadOnly);
        }
        let decoded: Table<K, V, S> = serde_json::from_str(json)?;
        let _g = self.reentrancy.enter();
        let mut t = self.table.write();
        if self.is_read_only() {
            warn!("load_json rejected: map is read-only");
            return Err(Error::ReadOnly);
        }
        *t = decoded;
        Ok(())
    }
}

impl<K, V, S> Clone for SafeMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl<K, V, S> fmt::Debug for SafeMap<K, V, S>
where
    K: Eq + Hash + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let _g = self.reentrancy.enter();
        f.debug_struct("SafeMap")
            .field("data", &*self.table.read())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

impl<K, V, S> Serialize for SafeMap<K, V, S>
where
    K: Eq + Hash + Serialize,
    V: Serialize,
    S: BuildHasher,
{
    fn serialize<Ser>(&self, serializer: Ser) -> core::result::Result<Ser::Ok, Ser::Error>
    where
        Ser: Serializer,
    {
        let _g = self.reentrancy.enter();
        self.table.read().serialize(serializer)
    }
}

impl<'de, K, V, S> Deserialize<'de> for SafeMap<K, V, S>
where
    K: Eq + Hash + Deserialize<'de>,
    V: Deserialize<'de>,
    S: BuildHasher + Default,
{
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Table::<K, V, S>::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_missing_returns_default() {
        let m: SafeMap<String, i32> = SafeMap::new();
        assert_eq!(m.get("nope"), 0);
        assert_eq!(m.get_full("nope"), None);
        assert!(!m.exists("nope"));
    }

    #[test]
    fn read_only_flag_is_sticky() {
        let m: SafeMap<&str, i32> = SafeMap::new();
        m.set("a", 1);
        m.set_read_only();
        assert!(m.is_read_only());
        m.set("a", 2);
        m.set("b", 3);
        m.delete("a");
        m.commit(|t| t.clear());
        assert_eq!(m.get(&"a"), 1);
        assert_eq!(m.len(), 1);
    }
}
