//! Small helpers shared across modules, mostly around turning hash-based
//! collections into a deterministic order for `Debug` output and snapshot
//! tests.
use ahash::AHashMap;

/// Render a hash map's entries as an arbitrary-but-deterministic sorted
/// `Vec`, so `Debug` output (and `insta` snapshots built from it) doesn't
/// depend on hash iteration order.
pub(crate) fn get_deterministic_display_form_from_hash_map<K, V, U: Ord + Clone, Y>(
    map: &AHashMap<K, V>,
    process: impl FnMut((&K, &V)) -> (U, Y),
) -> Vec<(U, Y)> {
    let mut entries: Vec<_> = map.iter().map(process).collect();
    entries.sort_by_cached_key(|(k, _)| k.clone());
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_form_sorts_by_key() {
        let mut map = AHashMap::default();
        map.insert(3u32, "c");
        map.insert(1u32, "a");
        map.insert(2u32, "b");
        let sorted = get_deterministic_display_form_from_hash_map(&map, |(k, v)| (*k, *v));
        assert_eq!(sorted, vec![(1, "a"), (2, "b"), (3, "c")]);
    }
}
