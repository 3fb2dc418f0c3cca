//! Lock-free, insert-once mapper cache.
//!
//! The cache holds an immutable `SortedEntries` table behind a single
//! [`ArcSwap`]. Readers load the current table and search it; writers build a
//! copy with one more entry and publish it with compare-and-swap, restarting
//! from the fresh table whenever another writer got there first.
//!
//! Small tables are scanned linearly. When an ordering function is supplied the
//! table is always kept sorted, and once it grows past [`SIZE_THRESHOLD`]
//! entries lookups switch to binary search.

use core::cmp::Ordering;
use core::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::CacheError;
use crate::{debug, trace};

/// Table size above which lookups use binary search (when an ordering exists).
pub const SIZE_THRESHOLD: usize = 32;

type OrderingFn<K> = Arc<dyn Fn(&K, &K) -> Ordering + Send + Sync>;

/// Immutable snapshot of the cache contents.
struct SortedEntries<K, V> {
    keys: Box<[K]>,
    values: Box<[V]>,
    bsearch: bool,
}

impl<K, V> SortedEntries<K, V> {
    fn empty() -> Self {
        Self {
            keys: Box::new([]),
            values: Box::new([]),
            bsearch: false,
        }
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

impl<K: Clone, V: Clone> SortedEntries<K, V> {
    /// Copy of `self` with `(key, value)` inserted at `at`.
    fn insert_entry(&self, key: &K, value: &V, at: usize, ordered: bool) -> Self {
        let len = self.len() + 1;

        let mut keys = Vec::with_capacity(len);
        keys.extend_from_slice(&self.keys[..at]);
        keys.push(key.clone());
        keys.extend_from_slice(&self.keys[at..]);

        let mut values = Vec::with_capacity(len);
        values.extend_from_slice(&self.values[..at]);
        values.push(value.clone());
        values.extend_from_slice(&self.values[at..]);

        Self {
            keys: keys.into_boxed_slice(),
            values: values.into_boxed_slice(),
            bsearch: ordered && len > SIZE_THRESHOLD,
        }
    }
}

/// Thread-safe map from mapper key to built mapper.
///
/// Values are write-once: after a key has been added, later `add` calls for an
/// equal key are no-ops, so every caller converges on the first published
/// mapper.
pub struct MapperCache<K, V> {
    entries: ArcSwap<SortedEntries<K, V>>,
    ordering: Option<OrderingFn<K>>,
}

impl<K, V> Default for MapperCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MapperCache<K, V> {
    /// Cache without an ordering function; lookups are always linear.
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(SortedEntries::empty()),
            ordering: None,
        }
    }

    /// Cache kept sorted by `ordering`.
    ///
    /// The ordering must be a total order consistent with `==`; `add` reports
    /// [`CacheError::InconsistentOrdering`] when it finds otherwise.
    pub fn with_ordering<F>(ordering: F) -> Self
    where
        F: Fn(&K, &K) -> Ordering + Send + Sync + 'static,
    {
        Self {
            entries: ArcSwap::from_pointee(SortedEntries::empty()),
            ordering: Some(Arc::new(ordering)),
        }
    }

    /// Cache kept sorted by the key's own [`Ord`].
    pub fn ordered() -> Self
    where
        K: Ord + 'static,
    {
        Self::with_ordering(K::cmp)
    }

    /// Number of cached mappers in the current table.
    pub fn size(&self) -> usize {
        self.entries.load().len()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

impl<K: Eq, V> MapperCache<K, V> {
    /// Position of `key` in `table`, using the search mode the table is flagged for.
    fn find_key(&self, table: &SortedEntries<K, V>, key: &K) -> Option<usize> {
        match (&self.ordering, table.bsearch) {
            (Some(ordering), true) => table
                .keys
                .binary_search_by(|probe| ordering(probe, key))
                .ok(),
            _ => table.keys.iter().position(|probe| probe == key),
        }
    }

    /// `Ok(index)` if an equal key is present, `Err(insertion_point)` otherwise.
    fn find_insertion_point(&self, table: &SortedEntries<K, V>, key: &K) -> Result<usize, usize> {
        match &self.ordering {
            Some(ordering) => table.keys.binary_search_by(|probe| ordering(probe, key)),
            None => table
                .keys
                .iter()
                .position(|probe| probe == key)
                .ok_or(table.len()),
        }
    }

    /// The mapper cached for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let table = self.entries.load();
        self.find_key(&table, key).map(|i| table.values[i].clone())
    }

    /// Whether a mapper is cached for `key`.
    pub fn contains(&self, key: &K) -> bool {
        let table = self.entries.load();
        self.find_key(&table, key).is_some()
    }

    /// Snapshot of the cached keys, in table order.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.entries.load().keys.to_vec()
    }
}

impl<K, V> MapperCache<K, V>
where
    K: Eq + Clone + fmt::Debug,
    V: Clone,
{
    /// Make `key` map to `value`, unless it already maps to something.
    ///
    /// Never blocks: a writer that loses the compare-and-swap recomputes its
    /// table from the newly published one and tries again.
    pub fn add(&self, key: K, value: V) -> Result<(), CacheError> {
        loop {
            let current = self.entries.load_full();

            let at = match self.find_insertion_point(&current, &key) {
                Ok(i) => {
                    let existing = &current.keys[i];
                    if *existing != key {
                        return Err(CacheError::InconsistentOrdering {
                            key: format!("{key:?}"),
                            existing: format!("{existing:?}"),
                        });
                    }
                    trace!(?key, "mapper already cached, keeping the published one");
                    return Ok(());
                }
                Err(at) => at,
            };

            let next = Arc::new(current.insert_entry(&key, &value, at, self.ordering.is_some()));
            let previous = self.entries.compare_and_swap(&current, next);
            if Arc::ptr_eq(&previous, &current) {
                debug!(?key, size = current.len() + 1, "mapper cached");
                return Ok(());
            }

            trace!(?key, "cache table changed concurrently, retrying");
        }
    }

    /// Return the cached mapper for `key`, building and publishing one on a miss.
    ///
    /// When several threads miss at once each builds its own mapper, but all of
    /// them return the one that was published first.
    pub fn get_or_try_insert_with<E, F>(&self, key: K, build: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
        E: From<CacheError>,
    {
        if let Some(value) = self.get(&key) {
            trace!(?key, "mapper cache hit");
            return Ok(value);
        }

        debug!(?key, "mapper cache miss");
        let value = build(&key)?;
        self.add(key.clone(), value.clone())?;
        Ok(self.get(&key).unwrap_or(value))
    }
}

impl<K: fmt::Debug, V> fmt::Debug for MapperCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.entries.load();
        f.debug_struct("MapperCache")
            .field("keys", &table.keys)
            .field("bsearch", &table.bsearch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{FieldDescriptor, MapperKey};

    fn key(names: &[&str]) -> MapperKey<FieldDescriptor> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| FieldDescriptor::new(*name, i + 1))
            .collect()
    }

    #[test]
    fn get_after_add_returns_same_mapper() {
        let cache = MapperCache::new();
        let key = key(&["col1", "col2"]);
        assert!(cache.get(&key).is_none());

        let mapper = Arc::new("mapper");
        cache.add(key.clone(), Arc::clone(&mapper)).unwrap();
        assert!(Arc::ptr_eq(&cache.get(&key).unwrap(), &mapper));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn second_add_for_same_key_is_a_no_op() {
        let cache = MapperCache::ordered();
        let key = key(&["id"]);
        cache.add(key.clone(), 1).unwrap();
        cache.add(key.clone(), 2).unwrap();
        assert_eq!(cache.get(&key), Some(1));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn ordered_table_stays_sorted() {
        let cache = MapperCache::ordered();
        for n in [5u32, 1, 4, 2, 3] {
            cache.add(n, n * 10).unwrap();
        }
        assert_eq!(cache.keys(), vec![1, 2, 3, 4, 5]);
    }

    fn ordered_with<K: Ord + Clone + std::fmt::Debug + 'static, V: Clone>(
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> MapperCache<K, V> {
        let cache = MapperCache::ordered();
        for (key, value) in entries {
            cache.add(key, value).unwrap();
        }
        cache
    }

    #[test]
    fn ordered_cache_from_generic_code() {
        let cache = ordered_with((0..40u32).rev().map(|n| (key(&[&n.to_string()]), n)));
        assert_eq!(cache.size(), 40);
        assert_eq!(cache.get(&key(&["7"])), Some(7));
        assert!(cache.keys().is_sorted());
    }

    #[test]
    fn unordered_table_appends() {
        let cache = MapperCache::new();
        for n in [5u32, 1, 4] {
            cache.add(n, ()).unwrap();
        }
        assert_eq!(cache.keys(), vec![5, 1, 4]);
    }

    #[test]
    fn switches_to_binary_search_past_threshold() {
        let cache = MapperCache::ordered();
        for n in 0..SIZE_THRESHOLD as u32 {
            cache.add(n, n).unwrap();
        }
        assert!(!cache.entries.load().bsearch);

        cache.add(1000, 1000).unwrap();
        assert!(cache.entries.load().bsearch);
        assert_eq!(cache.get(&1000), Some(1000));
    }

    #[test]
    fn unordered_cache_never_uses_binary_search() {
        let cache = MapperCache::new();
        for n in 0..(SIZE_THRESHOLD as u32 * 2) {
            cache.add(n, n).unwrap();
        }
        assert!(!cache.entries.load().bsearch);
        assert_eq!(cache.get(&40), Some(40));
    }

    #[test]
    fn inconsistent_ordering_is_reported() {
        // Orders by length only: "ab" and "cd" compare equal without being equal.
        let cache = MapperCache::with_ordering(|a: &String, b: &String| a.len().cmp(&b.len()));
        cache.add("ab".to_string(), 1).unwrap();

        let err = cache.add("cd".to_string(), 2).unwrap_err();
        assert!(matches!(err, CacheError::InconsistentOrdering { .. }));
        assert_eq!(cache.get(&"cd".to_string()), None);
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn get_or_try_insert_with_builds_once() {
        let cache: MapperCache<u32, u32> = MapperCache::ordered();
        let mut builds = 0;
        let first: Result<u32, CacheError> = cache.get_or_try_insert_with(7, |k| {
            builds += 1;
            Ok(k * 2)
        });
        assert_eq!(first.unwrap(), 14);

        let second: Result<u32, CacheError> = cache.get_or_try_insert_with(7, |_| {
            builds += 1;
            Ok(0)
        });
        assert_eq!(second.unwrap(), 14);
        assert_eq!(builds, 1);
    }

    #[test]
    fn debug_lists_keys() {
        let cache = MapperCache::ordered();
        cache.add(2u8, ()).unwrap();
        cache.add(1u8, ()).unwrap();
        assert_eq!(
            format!("{cache:?}"),
            "MapperCache { keys: [1, 2], bsearch: false }"
        );
    }
}
