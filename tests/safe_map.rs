use peek::{Error, SafeMap, Table};
use std::collections::BTreeMap;

fn sample() -> SafeMap<String, i32> {
    let m = SafeMap::new();
    m.set("a".to_string(), 1);
    m.set("b".to_string(), 2);
    m.set("c".to_string(), 3);
    m
}

#[test]
fn set_get_delete_basics() {
    let m = sample();
    assert_eq!(m.len(), 3);
    assert_eq!(m.get("b"), 2);
    assert_eq!(m.get_full("b"), Some(2));
    assert!(m.exists("a"));

    m.set("b".to_string(), 20);
    assert_eq!(m.get("b"), 20);
    assert_eq!(m.len(), 3);

    m.delete("b");
    assert!(!m.exists("b"));
    assert_eq!(m.get("b"), 0);
    assert_eq!(m.get_full("b"), None);
    assert_eq!(m.len(), 2);

    // Deleting an absent key is a no-op.
    m.delete("zzz");
    assert_eq!(m.len(), 2);
}

#[test]
fn get_on_empty_map_yields_zero_value() {
    let m: SafeMap<String, String> = SafeMap::default();
    assert!(m.is_empty());
    assert_eq!(m.get("missing"), "");
    assert_eq!(m.iter().count(), 0);
    assert!(m.keys().is_empty());
}

#[test]
fn commit_applies_batch_atomically() {
    let m = sample();
    m.commit(|t| {
        t.remove("a");
        t.insert("d".to_string(), 4);
        if let Some(v) = t.get_mut("c") {
            *v *= 10;
        }
    });
    let got: BTreeMap<String, i32> = m.iter().map(|e| e.into_pair()).collect();
    let want: BTreeMap<String, i32> = [("b", 2), ("c", 30), ("d", 4)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    assert_eq!(got, want);
}

#[test]
fn read_only_drops_mutations_silently() {
    let m = sample().read_only();
    assert!(m.is_read_only());
    m.set("z".to_string(), 26);
    m.delete("a");
    m.commit(|t| t.clear());
    assert_eq!(m.len(), 3);
    assert!(!m.exists("z"));
    assert_eq!(m.get("a"), 1);
}

#[test]
fn load_json_on_read_only_errors_and_keeps_contents() {
    let m = sample();
    m.set_read_only();
    let err = m.load_json(r#"{"x": 9}"#).unwrap_err();
    assert!(matches!(err, Error::ReadOnly));
    assert_eq!(m.len(), 3);
    assert!(!m.exists("x"));
}

#[test]
fn load_json_malformed_keeps_contents() {
    let m = sample();
    let err = m.load_json(r#"{"x": "#).unwrap_err();
    assert!(matches!(err, Error::Json(_)));
    assert_eq!(m.len(), 3);
    assert_eq!(m.get("a"), 1);
}

#[test]
fn json_round_trip_replaces_contents() {
    let m = sample();
    let json = m.to_json().unwrap();

    let other: SafeMap<String, i32> = SafeMap::new();
    other.set("stale".to_string(), 7);
    other.load_json(&json).unwrap();
    assert!(!other.exists("stale"));
    assert_eq!(other.len(), 3);
    assert_eq!(other.get("c"), 3);
}

#[test]
fn to_json_is_an_object() {
    let m: SafeMap<String, i32> = SafeMap::new();
    m.set("k".to_string(), 5);
    assert_eq!(m.to_json().unwrap(), r#"{"k":5}"#);
}

#[test]
fn copy_is_independent_and_writable() {
    let m = sample().read_only();
    let c = m.copy();
    assert!(!c.is_read_only());
    c.set("d".to_string(), 4);
    c.delete("a");
    assert_eq!(m.len(), 3);
    assert!(m.exists("a"));
    assert_eq!(c.len(), 3);
    assert!(c.exists("d"));
}

#[test]
fn partially_drained_iter_does_not_block_writers() {
    let m = sample();
    let mut it = m.iter();
    let first = it.next();
    assert!(first.is_some());

    // The iterator holds no lock: this write must not deadlock.
    m.set("d".to_string(), 4);
    assert_eq!(m.len(), 4);

    // The sequence still reflects the snapshot it was taken from.
    assert_eq!(it.count(), 2);
}

#[test]
fn for_each_visits_every_entry() {
    let m = sample();
    let mut sum = 0;
    m.for_each(|_, v| sum += *v);
    assert_eq!(sum, 6);
}

#[test]
fn keys_and_values_agree_with_iter() {
    let m = sample();
    let mut keys = m.keys();
    keys.sort();
    assert_eq!(keys, vec!["a", "b", "c"]);
    let mut values = m.values();
    values.sort();
    assert_eq!(values, vec![1, 2, 3]);
}

#[test]
fn built_from_table() {
    let t: Table<&str, u8> = [("x", 1), ("y", 2)].into_iter().collect();
    let m = SafeMap::from(t);
    assert_eq!(m.get("y"), 2);
}

#[test]
fn serde_embeds_in_larger_documents() {
    #[derive(serde::Serialize, serde::Deserialize)]
    struct Doc {
        name: String,
        counts: SafeMap<String, u32>,
    }
    let doc: Doc = serde_json::from_str(r#"{"name":"n","counts":{"a":1,"b":2}}"#).unwrap();
    assert_eq!(doc.name, "n");
    assert_eq!(doc.counts.get("b"), 2);
    let back = serde_json::to_value(&doc).unwrap();
    assert_eq!(back["counts"]["a"], 1);
}

/// A hasher builder that cannot be cloned.
#[derive(Default)]
struct FixedState;

impl std::hash::BuildHasher for FixedState {
    type Hasher = std::collections::hash_map::DefaultHasher;

    fn build_hasher(&self) -> Self::Hasher {
        std::collections::hash_map::DefaultHasher::new()
    }
}

#[test]
fn snapshots_do_not_require_a_clonable_hasher() {
    let m: SafeMap<u8, u8, FixedState> = SafeMap::with_hasher(FixedState);
    m.set(1, 10);
    m.set(2, 20);
    let mut keys = m.keys();
    keys.sort_unstable();
    assert_eq!(keys, vec![1, 2]);
    let mut values = m.values();
    values.sort_unstable();
    assert_eq!(values, vec![10, 20]);
    assert_eq!(m.iter().count(), 2);
}
