//! WeightedMap: a SafeMap whose values carry a `u8` priority weight.
//!
//! Iteration is by weight, highest first. Keys sharing a weight form a tier;
//! their relative order follows the backing table and is otherwise
//! unspecified. `weight_iter` yields one sequence per tier.
//!
//! On the wire only payloads travel: `{"key": payload}`. Loading JSON keeps
//! the weight already known for each key and gives new keys weight 0.

use crate::error::{Error, Result};
use crate::iter::{Iter, Tiers};
use crate::ordered::{KeyOrder, OrderedMap};
use crate::table::Table;
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::hash_map::RandomState;
use tracing::warn;

/// A payload with its priority weight. Higher weights iterate first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Weighted<V> {
    pub value: V,
    pub weight: u8,
}

impl<V> Weighted<V> {
    pub fn new(value: V, weight: u8) -> Self {
        Self { value, weight }
    }
}

#[derive(Clone, Copy)]
pub(crate) struct ByWeight;

impl<K, V> KeyOrder<K, Weighted<V>> for ByWeight {
    fn compare(&self, a: (&K, &Weighted<V>), b: (&K, &Weighted<V>)) -> Ordering {
        b.1.weight.cmp(&a.1.weight)
    }
}

pub struct WeightedMap<K, V, S = RandomState> {
    inner: OrderedMap<K, Weighted<V>, S, ByWeight>,
}

impl<K, V> WeightedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V, S> Default for WeightedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> From<Table<K, Weighted<V>, S>> for WeightedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher,
{
    fn from(table: Table<K, Weighted<V>, S>) -> Self {
        Self {
            inner: OrderedMap::from_table(table, ByWeight),
        }
    }
}

impl<K, V, S> FromIterator<(K, Weighted<V>)> for WeightedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, Weighted<V>)>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Table<K, Weighted<V>, S>>())
    }
}

impl<K, V, S> WeightedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::from(Table::with_hasher(hasher))
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

    /// Payload for `q`, or `V::default()` when absent.
    pub fn get<Q>(&self, q: &Q) -> V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone + Default,
    {
        self.get_full(q).unwrap_or_default()
    }

    /// Payload for `q` if present; the weight is stripped.
    pub fn get_full<Q>(&self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.inner.get_with(q, |w| w.value.clone())
    }

    pub fn get_weighted<Q>(&self, q: &Q) -> Option<Weighted<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.inner.get_with(q, Weighted::clone)
    }

    pub fn set(&self, key: K, value: Weighted<V>) {
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
        F: FnOnce(&mut Table<K, Weighted<V>, S>),
    {
        self.inner.commit(f);
    }

    /// Call `f` with each key and payload, heaviest first, under the shared
    /// lock.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        self.inner.for_each(|k, w| f(k, &w.value));
    }

    pub fn keys(&self) -> Vec<K> {
        self.inner.keys()
    }

    /// Number of distinct weights currently stored.
    pub fn weight_count(&self) -> usize {
        self.inner.tier_count()
    }
}

impl<K, V, S> WeightedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher,
{
    pub fn values(&self) -> Vec<V> {
        self.inner
            .project(|w| w.value.clone())
            .into_iter()
            .map(|e| e.value)
            .collect()
    }

    /// Snapshot sequence of payloads, heaviest first.
    pub fn iter(&self) -> Iter<K, V> {
        Iter::from_snapshot(self.inner.project(|w| w.value.clone()))
    }

    /// One sequence per weight tier, heaviest tier first.
    pub fn weight_iter(&self) -> Tiers<K, V> {
        Tiers::from_groups(self.inner.project_tiers(|w| w.value.clone()))
    }
}

impl<K, V, S> WeightedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    pub fn copy(&self) -> Self {
        Self {
            inner: self.inner.copy(),
        }
    }
}

impl<K, V, S> WeightedMap<K, V, S>
where
    K: Eq + Hash + Clone + Serialize,
    V: Serialize,
    S: BuildHasher,
{
    /// Payload-only JSON object.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<K, V, S> WeightedMap<K, V, S>
where
    K: Eq + Hash + Clone + DeserializeOwned,
    V: DeserializeOwned,
    S: BuildHasher + Default,
{
    /// Replace the contents with a payload-only JSON object. Keys already
    /// present keep their weight; new keys get weight 0.
    pub fn load_json(&self, json: &str) -> Result<()> {
        if self.is_read_only() {
            warn!("load_json rejected: map is read-only");
            return Err(Error::ReadOnly);
        }
        let decoded: Table<K, V, S> = serde_json::from_str(json)?;
        self.inner.replace(move |prior| {
            decoded
                .into_iter()
                .map(|(k, value)| {
                    let weight = prior.get(&k).map(|w| w.weight).unwrap_or(0);
                    (k, Weighted::new(value, weight))
                })
                .collect()
        })
    }
}

impl<K, V, S> Clone for WeightedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl<K, V, S> fmt::Debug for WeightedMap<K, V, S>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut m = f.debug_map();
        self.inner.for_each(|k, w| {
            m.entry(k, w);
        });
        m.finish()
    }
}

impl<K, V, S> Serialize for WeightedMap<K, V, S>
where
    K: Eq + Hash + Clone + Serialize,
    V: Serialize,
    S: BuildHasher,
{
    fn serialize<Ser>(&self, serializer: Ser) -> core::result::Result<Ser::Ok, Ser::Error>
    where
        Ser: Serializer,
    {
        self.inner.with_table(|t| {
            let mut map = serializer.serialize_map(Some(t.len()))?;
            for (k, w) in t.iter() {
                map.serialize_entry(k, &w.value)?;
            }
            map.end()
        })
    }
}

impl<'de, K, V, S> Deserialize<'de> for WeightedMap<K, V, S>
where
    K: Eq + Hash + Clone + Deserialize<'de>,
    V: Deserialize<'de>,
    S: BuildHasher + Default,
{
    /// Every key gets weight 0: weights never come from the wire.
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let payloads = Table::<K, V, S>::deserialize(deserializer)?;
        Ok(payloads
            .into_iter()
            .map(|(k, v)| (k, Weighted::new(v, 0)))
            .collect())
    }
}
