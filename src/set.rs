//! Presence sets: deduplicated collections of values with no order.
//!
//! `PresenceSet` is the plain single-owner set (a `Table` of unit markers);
//! `SafeSet` puts one behind a reader/writer lock. Both travel as JSON
//! arrays.

use crate::error::Result;
use crate::reentrancy::DebugReentrancy;
use crate::table::Table;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use parking_lot::RwLock;
use serde::de::{DeserializeOwned, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::hash_map::RandomState;

#[derive(Clone)]
pub struct PresenceSet<T, S = RandomState> {
    table: Table<T, (), S>,
}

impl<T> PresenceSet<T>
where
    T: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<T, S> Default for PresenceSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<T, S> PresenceSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: Table::with_hasher(hasher),
        }
    }

    /// Add each value; duplicates are absorbed.
    pub fn add<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        for v in values {
            self.table.insert(v, ());
        }
    }

    /// Add one value. Returns false if it was already present.
    pub fn insert(&mut self, value: T) -> bool {
        self.table.insert(value, ()).is_none()
    }

    pub fn remove<'a, Q, I>(&mut self, values: I)
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq + 'a,
        I: IntoIterator<Item = &'a Q>,
    {
        for v in values {
            self.table.remove(v);
        }
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains_key(value)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.table.keys()
    }

    /// All values, in no particular order.
    pub fn list(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }
}

impl<T, S> Extend<T> for PresenceSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.add(iter);
    }
}

impl<T, S> FromIterator<T> for PresenceSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::default();
        set.add(iter);
        set
    }
}

/// `[a b c]`, in no particular order.
impl<T, S> fmt::Display for PresenceSet<T, S>
where
    T: Eq + Hash + fmt::Display,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str("]")
    }
}

impl<T, S> fmt::Debug for PresenceSet<T, S>
where
    T: Eq + Hash + fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, S> Serialize for PresenceSet<T, S>
where
    T: Eq + Hash + Serialize,
    S: BuildHasher,
{
    fn serialize<Ser>(&self, serializer: Ser) -> core::result::Result<Ser::Ok, Ser::Error>
    where
        Ser: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for v in self.iter() {
            seq.serialize_element(v)?;
        }
        seq.end()
    }
}

struct SetVisitor<T, S> {
    _pd: PhantomData<fn() -> PresenceSet<T, S>>,
}

impl<'de, T, S> Visitor<'de> for SetVisitor<T, S>
where
    T: Eq + Hash + Deserialize<'de>,
    S: BuildHasher + Default,
{
    type Value = PresenceSet<T, S>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut access: A) -> core::result::Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut set = PresenceSet::default();
        while let Some(v) = access.next_element()? {
            set.insert(v);
        }
        Ok(set)
    }
}

impl<'de, T, S> Deserialize<'de> for PresenceSet<T, S>
where
    T: Eq + Hash + Deserialize<'de>,
    S: BuildHasher + Default,
{
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(SetVisitor { _pd: PhantomData })
    }
}

/// Lock-guarded `PresenceSet`.
pub struct SafeSet<T, S = RandomState> {
    set: RwLock<PresenceSet<T, S>>,
    reentrancy: DebugReentrancy,
}

impl<T> SafeSet<T>
where
    T: Eq + Hash,
{
    pub fn new() -> Self {
        Self::from(PresenceSet::new())
    }
}

impl<T, S> Default for SafeSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::from(PresenceSet::default())
    }
}

impl<T, S> From<PresenceSet<T, S>> for SafeSet<T, S> {
    fn from(set: PresenceSet<T, S>) -> Self {
        Self {
            set: RwLock::new(set),
            reentrancy: DebugReentrancy::new(),
        }
    }
}

impl<T, S> FromIterator<T> for SafeSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<PresenceSet<T, S>>())
    }
}

impl<T, S> SafeSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    pub fn add<I>(&self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        let _g = self.reentrancy.enter();
        self.set.write().add(values);
    }

    pub fn remove<'a, Q, I>(&self, values: I)
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq + 'a,
        I: IntoIterator<Item = &'a Q>,
    {
        let _g = self.reentrancy.enter();
        self.set.write().remove(values);
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        self.set.read().contains(value)
    }

    pub fn len(&self) -> usize {
        let _g = self.reentrancy.enter();
        self.set.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list(&self) -> Vec<T>
    where
        T: Clone,
    {
        let _g = self.reentrancy.enter();
        self.set.read().list()
    }

    pub fn to_json(&self) -> Result<String>
    where
        T: Serialize,
    {
        Ok(serde_json::to_string(self)?)
    }

    /// Replace the contents with the decoded JSON array. A decode error
    /// leaves the set untouched.
    pub fn load_json(&self, json: &str) -> Result<()>
    where
        T: DeserializeOwned,
        S: Default,
    {
        let decoded: PresenceSet<T, S> = serde_json::from_str(json)?;
        let _g = self.reentrancy.enter();
        *self.set.write() = decoded;
        Ok(())
    }
}

impl<T, S> fmt::Display for SafeSet<T, S>
where
    T: Eq + Hash + fmt::Display,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let _g = self.reentrancy.enter();
        fmt::Display::fmt(&*self.set.read(), f)
    }
}

impl<T, S> fmt::Debug for SafeSet<T, S>
where
    T: Eq + Hash + fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let _g = self.reentrancy.enter();
        fmt::Debug::fmt(&*self.set.read(), f)
    }
}

impl<T, S> Serialize for SafeSet<T, S>
where
    T: Eq + Hash + Serialize,
    S: BuildHasher,
{
    fn serialize<Ser>(&self, serializer: Ser) -> core::result::Result<Ser::Ok, Ser::Error>
    where
        Ser: Serializer,
    {
        let _g = self.reentrancy.enter();
        self.set.read().serialize(serializer)
    }
}

impl<'de, T, S> Deserialize<'de> for SafeSet<T, S>
where
    T: Eq + Hash + Deserialize<'de>,
    S: BuildHasher + Default,
{
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        PresenceSet::<T, S>::deserialize(deserializer).map(Self::from)
    }
}
