//! peek: lock-guarded generic containers, and a variable watcher built on
//! them.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: maps, sets and bounded buffers that many threads can share,
//!   with deterministic iteration where it matters.
//! - Layers:
//!   - Table<K, V, S>: unsynchronized structural hash table (slot storage
//!     plus a hash index). Every container keeps its data in one.
//!   - SafeMap<K, V, S>: a Table behind a reader/writer lock, with a
//!     read-only mode.
//!   - SortedMap / WeightedMap: a Table plus a cached key order and a dirty
//!     flag, sharing one ordered core. SortedMap orders by a key
//!     comparator; WeightedMap by a `u8` weight, highest first, and can
//!     iterate tier by tier.
//!   - PresenceSet / SafeSet: deduplicated values.
//!   - Rigid / RigidSet (+ Safe variants): fixed-capacity FIFO buffers; the
//!     set variant rejects values it already holds.
//!   - Watcher: the consumer. Two SortedMaps of probes and a log tail,
//!     rendered into text frames.
//!
//! Concurrency
//! - Each container has its own `parking_lot::RwLock`; there is no
//!   cross-container locking. Reads share, writes exclude.
//! - Iteration copies a snapshot under the shared lock, releases it, and
//!   hands out a lazy single-pass sequence. Dropping a sequence early never
//!   leaves a lock held.
//! - The cached order is rebuilt under the exclusive lock, never under a
//!   shared one; concurrent readers that find it stale rebuild it once.
//! - `for_each` and `commit` run the callback under the lock. Calling back
//!   into the same container from there is a bug; debug builds panic on it.
//!
//! Failure policy
//! - Mutations return `()`. On a read-only container they are dropped
//!   silently; callers that care check `is_read_only()` first.
//! - `load_json` is the exception: it returns `Error::ReadOnly`. Decode
//!   errors return `Error::Json`. Either way the target is untouched.
//! - Overflowing a bounded buffer is not an error; `add` returns what it
//!   evicted.
//! - Caller input never causes a panic. The only deliberate panic is the
//!   debug-build reentrancy check above.
//!
//! Notes and non-goals
//! - No persistence beyond JSON, no transactions spanning containers.
//! - Absent keys read as `V::default()` through `get`; `get_full` tells
//!   absence apart.
//! - Copies (`copy()`/`Clone`) are deep and start with a stale order cache.

pub mod error;
pub mod iter;
pub mod map;
mod ordered;
pub mod reentrancy;
pub mod rigid;
pub mod set;
pub mod sorted_map;
pub mod table;
#[cfg(test)]
mod table_proptest;
pub mod watch;
pub mod weighted_map;

// Public surface
pub use error::{Error, Result};
pub use iter::{Entry, Iter, Tiers};
pub use map::SafeMap;
pub use reentrancy::DebugReentrancy;
pub use rigid::{Rigid, RigidSet, SafeRigid, SafeRigidSet};
pub use set::{PresenceSet, SafeSet};
pub use sorted_map::{Comparator, SortedMap};
pub use table::Table;
pub use watch::{Palette, Probe, Watcher, WatcherConfig};
pub use weighted_map::{Weighted, WeightedMap};
