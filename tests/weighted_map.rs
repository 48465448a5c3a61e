use peek::{Error, Weighted, WeightedMap};
use std::collections::BTreeSet;

fn sample() -> WeightedMap<String, String> {
    let m = WeightedMap::new();
    m.set("k1".to_string(), Weighted::new("v1".to_string(), 5));
    m.set("k2".to_string(), Weighted::new("v2".to_string(), 10));
    m.set("k3".to_string(), Weighted::new("v3".to_string(), 5));
    m
}

#[test]
fn iter_is_heaviest_first() {
    let m = sample();
    let keys: Vec<String> = m.iter().map(|e| e.key).collect();
    assert_eq!(keys[0], "k2");
    let rest: BTreeSet<&str> = keys[1..].iter().map(String::as_str).collect();
    assert_eq!(rest, BTreeSet::from(["k1", "k3"]));
    assert_eq!(m.weight_count(), 2);
}

#[test]
fn weight_iter_groups_equal_weights() {
    let m = sample();
    let tiers: Vec<Vec<String>> = m.weight_iter().map(|t| t.map(|e| e.key).collect()).collect();
    assert_eq!(tiers.len(), 2);
    assert_eq!(tiers[0], vec!["k2"]);
    let second: BTreeSet<&str> = tiers[1].iter().map(String::as_str).collect();
    assert_eq!(second, BTreeSet::from(["k1", "k3"]));
}

#[test]
fn weight_iter_on_empty_map_yields_nothing() {
    let m: WeightedMap<u8, u8> = WeightedMap::default();
    assert_eq!(m.weight_iter().count(), 0);
    assert_eq!(m.weight_count(), 0);
}

#[test]
fn get_strips_weight() {
    let m = sample();
    assert_eq!(m.get("k2"), "v2");
    assert_eq!(m.get_full("k2"), Some("v2".to_string()));
    assert_eq!(m.get("nope"), "");
    assert_eq!(m.get_weighted("k1"), Some(Weighted::new("v1".to_string(), 5)));
}

#[test]
fn reweighting_moves_entry_between_tiers() {
    let m = sample();
    m.set("k1".to_string(), Weighted::new("v1".to_string(), 200));
    assert_eq!(m.keys()[0], "k1");
    assert_eq!(m.weight_count(), 3);
    m.delete("k1");
    assert_eq!(m.keys()[0], "k2");
    assert_eq!(m.weight_count(), 2);
}

#[test]
fn json_carries_payloads_only() {
    let m = sample();
    let value: serde_json::Value = serde_json::from_str(&m.to_json().unwrap()).unwrap();
    assert_eq!(value, serde_json::json!({"k1": "v1", "k2": "v2", "k3": "v3"}));
}

#[test]
fn load_json_keeps_known_weights() {
    let m = sample();
    let json = m.to_json().unwrap();
    m.load_json(&json).unwrap();
    assert_eq!(m.get_weighted("k1").map(|w| w.weight), Some(5));
    assert_eq!(m.get_weighted("k2").map(|w| w.weight), Some(10));
    assert_eq!(m.get_weighted("k3").map(|w| w.weight), Some(5));
    assert_eq!(m.weight_count(), 2);
}

#[test]
fn load_json_into_fresh_map_gives_weight_zero() {
    let json = sample().to_json().unwrap();
    let fresh: WeightedMap<String, String> = WeightedMap::new();
    fresh.load_json(&json).unwrap();
    assert_eq!(fresh.len(), 3);
    for k in ["k1", "k2", "k3"] {
        assert_eq!(fresh.get_weighted(k).map(|w| w.weight), Some(0));
    }
    assert_eq!(fresh.weight_count(), 1);
}

#[test]
fn load_json_drops_keys_missing_from_input() {
    let m = sample();
    m.load_json(r#"{"k2": "new", "k9": "x"}"#).unwrap();
    assert_eq!(m.len(), 2);
    assert!(!m.exists("k1"));
    assert_eq!(m.get_weighted("k2"), Some(Weighted::new("new".to_string(), 10)));
    assert_eq!(m.get_weighted("k9"), Some(Weighted::new("x".to_string(), 0)));
}

#[test]
fn read_only_rejects_load_and_writes() {
    let m = sample().read_only();
    m.set("k4".to_string(), Weighted::new("v4".to_string(), 1));
    m.commit(|t| t.clear());
    assert_eq!(m.len(), 3);
    assert!(matches!(m.load_json("{}"), Err(Error::ReadOnly)));
    assert_eq!(m.len(), 3);
}

#[test]
fn copy_is_deep() {
    let m = sample();
    let c = m.copy();
    c.delete("k2");
    assert_eq!(m.len(), 3);
    assert_eq!(c.len(), 2);
    assert_eq!(c.weight_count(), 1);
}

#[test]
fn for_each_and_values_follow_weight_order() {
    let m: WeightedMap<&str, i32> = [
        ("low", Weighted::new(1, 0)),
        ("high", Weighted::new(3, 255)),
        ("mid", Weighted::new(2, 7)),
    ]
    .into_iter()
    .collect();
    let mut seen = Vec::new();
    m.for_each(|k, v| seen.push((*k, *v)));
    assert_eq!(seen, vec![("high", 3), ("mid", 2), ("low", 1)]);
    assert_eq!(m.values(), vec![3, 2, 1]);
}

#[derive(Default)]
struct FixedState;

impl std::hash::BuildHasher for FixedState {
    type Hasher = std::collections::hash_map::DefaultHasher;

    fn build_hasher(&self) -> Self::Hasher {
        std::collections::hash_map::DefaultHasher::new()
    }
}

#[test]
fn tier_reads_do_not_require_a_clonable_hasher() {
    let m: WeightedMap<u8, &str, FixedState> = WeightedMap::with_hasher(FixedState);
    m.set(1, Weighted::new("low", 1));
    m.set(2, Weighted::new("high", 9));
    assert_eq!(m.values(), vec!["high", "low"]);
    assert_eq!(m.iter().count(), 2);
    assert_eq!(m.weight_iter().count(), 2);
}
