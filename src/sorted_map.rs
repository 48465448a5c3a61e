//! SortedMap: a SafeMap whose iteration follows a pluggable key comparator.

use crate::error::{Error, Result};
use crate::iter::Iter;
use crate::ordered::{KeyOrder, OrderedMap};
use crate::table::Table;
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::hash_map::RandomState;
use std::sync::Arc;
use tracing::warn;

/// Key comparison used by a `SortedMap`.
pub type Comparator<K> = Arc<dyn Fn(&K, &K) -> Ordering + Send + Sync>;

pub(crate) struct ByKey<K> {
    cmp: Comparator<K>,
}

impl<K> Clone for ByKey<K> {
    fn clone(&self) -> Self {
        Self {
            cmp: Arc::clone(&self.cmp),
        }
    }
}

impl<K, V> KeyOrder<K, V> for ByKey<K> {
    fn compare(&self, a: (&K, &V), b: (&K, &V)) -> Ordering {
        (self.cmp)(a.0, b.0)
    }
}

/// Concurrency-safe map iterated in comparator order.
///
/// `iter`, `for_each`, `keys` and `values` walk a cached key order that is
/// recomputed lazily after any `set`/`delete`/`commit`. Repeated reads
/// between mutations see the same order.
pub struct SortedMap<K, V, S = RandomState> {
    inner: OrderedMap<K, V, S, ByKey<K>>,
}

impl<K, V> SortedMap<K, V>
where
    K: Eq + Hash + Clone + Ord + 'static,
{
    /// Empty map in natural ascending key order.
    pub fn new() -> Self {
        Self::with_comparator(K::cmp)
    }
}

impl<K, V> Default for SortedMap<K, V>
where
    K: Eq + Hash + Clone + Ord + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SortedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn with_comparator<F>(cmp: F) -> Self
    where
        F: Fn(&K, &K) -> Ordering + Send + Sync + 'static,
    {
        Self::with_data(Table::new(), cmp)
    }
}

impl<K, V, S> FromIterator<(K, V)> for SortedMap<K, V, S>
where
    K: Eq + Hash + Clone + Ord + 'static,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::with_data(iter.into_iter().collect(), K::cmp)
    }
}

impl<K, V, S> SortedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher,
{
    /// Map seeded with `data`, ordered by `cmp`.
    pub fn with_data<F>(data: Table<K, V, S>, cmp: F) -> Self
    where
        F: Fn(&K, &K) -> Ordering + Send + Sync + 'static,
    {
        Self {
            inner: OrderedMap::from_table(data, ByKey { cmp: Arc::new(cmp) }),
        }
    }

    pub fn read_only(self) -> Self {
        self.inner.set_read_only();
        self
    }

    pub fn set_read_only(&self) {
        self.inner.set_read_only();
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.is_read_only()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn exists<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.exists(q)
    }

    pub fn get<Q>(&self, q: &Q) -> V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone + Default,
    {
        self.get_full(q).unwrap_or_default()
    }

    pub fn get_full<Q>(&self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.inner.get_with(q, V::clone)
    }

    pub fn set(&self, key: K, value: V) {
        self.inner.set(key, value);
    }

    pub fn delete<Q>(&self, q: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.delete(q);
    }

    pub fn commit<F>(&self, f: F)
    where
        F: FnOnce(&mut Table<K, V, S>),
    {
        self.inner.commit(f);
    }

    /// Call `f` for every entry in key order, under the shared lock.
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V),
    {
        self.inner.for_each(f);
    }

    pub fn keys(&self) -> Vec<K> {
        self.inner.keys()
    }
}

impl<K, V, S> SortedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher,
{
    pub fn values(&self) -> Vec<V> {
        self.inner
            .project(V::clone)
            .into_iter()
            .map(|e| e.value)
            .collect()
    }

    /// Snapshot sequence in key order.
    pub fn iter(&self) -> Iter<K, V> {
        Iter::from_snapshot(self.inner.project(V::clone))
    }
}

impl<K, V, S> SortedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Independent writable copy with the same comparator.
    pub fn copy(&self) -> Self {
        Self {
            inner: self.inner.copy(),
        }
    }
}

impl<K, V, S> SortedMap<K, V, S>
where
    K: Eq + Hash + Clone + Serialize,
    V: Serialize,
    S: BuildHasher,
{
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<K, V, S> SortedMap<K, V, S>
where
    K: Eq + Hash + Clone + DeserializeOwned,
    V: DeserializeOwned,
    S: BuildHasher + Default,
{
    /// Replace the contents with the decoded JSON object, keeping the
    /// comparator.
    pub fn load_json(&self, json: &str) -> Result<()> {
        if self.is_read_only() {
            warn!("load_json rejected: map is read-only");
            return Err(Error::ReadOnly);
        }
        let decoded: Table<K, V, S> = serde_json::from_str(json)?;
        self.inner.replace(move |_| decoded)
    }
}

impl<K, V, S> Clone for SortedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl<K, V, S> fmt::Debug for SortedMap<K, V, S>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut m = f.debug_map();
        self.inner.for_each(|k, v| {
            m.entry(k, v);
        });
        m.finish()
    }
}

impl<K, V, S> Serialize for SortedMap<K, V, S>
where
    K: Eq + Hash + Clone + Serialize,
    V: Serialize,
    S: BuildHasher,
{
    fn serialize<Ser>(&self, serializer: Ser) -> core::result::Result<Ser::Ok, Ser::Error>
    where
        Ser: Serializer,
    {
        self.inner.with_table(|t| t.serialize(serializer))
    }
}

impl<'de, K, V, S> Deserialize<'de> for SortedMap<K, V, S>
where
    K: Eq + Hash + Clone + Ord + Deserialize<'de> + 'static,
    V: Deserialize<'de>,
    S: BuildHasher + Default,
{
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Table::<K, V, S>::deserialize(deserializer).map(|t| Self::with_data(t, K::cmp))
    }
}
