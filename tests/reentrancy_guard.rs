#![cfg(test)]

use peek::{SafeMap, SortedMap};

#[test]
fn sequential_calls_from_callbacks_of_other_maps_are_fine() {
    let a: SafeMap<u8, u8> = [(1, 1), (2, 2)].into_iter().collect();
    let b: SafeMap<u8, u8> = SafeMap::new();
    a.for_each(|k, v| b.set(*k, *v));
    assert_eq!(b.len(), 2);
}

#[cfg(debug_assertions)]
#[test]
fn for_each_calling_back_into_map_panics_in_debug() {
    let m: SafeMap<u8, u8> = [(1, 1)].into_iter().collect();
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        m.for_each(|_, _| {
            let _ = m.len();
        });
    }));
    assert!(res.is_err());
    // The shared lock and the guard were both released by the unwind.
    m.set(2, 2);
    assert_eq!(m.len(), 2);
}

#[cfg(debug_assertions)]
#[test]
fn commit_calling_back_into_sorted_map_panics_in_debug() {
    let m: SortedMap<u8, u8> = SortedMap::new();
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        m.commit(|_| m.set(1, 1));
    }));
    assert!(res.is_err());
    m.set(1, 1);
    assert_eq!(m.keys(), vec![1]);
}

#[cfg(not(debug_assertions))]
#[test]
fn callbacks_are_unchecked_in_release() {
    // Reads from inside a shared-lock callback do not deadlock without a
    // queued writer; release builds let them through.
    let m: SafeMap<u8, u8> = [(1, 1)].into_iter().collect();
    let mut seen = 0;
    m.for_each(|_, _| seen = m.len());
    assert_eq!(seen, 1);
}
