use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;

use facet_mapper::{FieldDescriptor, MapperCache, MapperKey, SIZE_THRESHOLD};
use facet_testhelpers::test;

fn key(prefix: &str, n: usize) -> MapperKey<FieldDescriptor> {
    MapperKey::new([
        FieldDescriptor::new(format!("{prefix}_id"), 0),
        FieldDescriptor::new(format!("{prefix}_{n}"), 1),
    ])
}

#[test]
fn racing_inserts_of_one_key_leave_one_value() {
    for _ in 0..50 {
        let cache: MapperCache<MapperKey<FieldDescriptor>, Arc<usize>> = MapperCache::ordered();
        let barrier = Barrier::new(2);
        let key = key("row", 0);

        let seen: Vec<Arc<usize>> = thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|thread_id| {
                    let (cache, barrier, key) = (&cache, &barrier, key.clone());
                    s.spawn(move || {
                        barrier.wait();
                        cache.add(key.clone(), Arc::new(thread_id)).unwrap();
                        cache.get(&key).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(cache.size(), 1);
        assert!(Arc::ptr_eq(&seen[0], &seen[1]));
        assert!(Arc::ptr_eq(&seen[0], &cache.get(&key).unwrap()));
    }
}

#[test]
fn disjoint_inserts_lose_nothing() {
    const PER_THREAD: usize = 200;
    let cache: MapperCache<MapperKey<FieldDescriptor>, usize> = MapperCache::ordered();
    let barrier = Barrier::new(4);

    thread::scope(|s| {
        for prefix in ["a", "b", "c", "d"] {
            let (cache, barrier) = (&cache, &barrier);
            s.spawn(move || {
                barrier.wait();
                for n in 0..PER_THREAD {
                    cache.add(key(prefix, n), n).unwrap();
                }
            });
        }
    });

    assert_eq!(cache.size(), 4 * PER_THREAD);
    for prefix in ["a", "b", "c", "d"] {
        for n in 0..PER_THREAD {
            assert_eq!(cache.get(&key(prefix, n)), Some(n), "{prefix}_{n}");
        }
    }

    let keys = cache.keys();
    let sorted: Vec<_> = keys.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
    assert_eq!(keys, sorted);
}

#[test]
fn overlapping_inserts_keep_first_value() {
    let cache: MapperCache<MapperKey<FieldDescriptor>, Arc<str>> = MapperCache::new();

    thread::scope(|s| {
        for name in ["left", "right"] {
            let cache = &cache;
            s.spawn(move || {
                for n in 0..100 {
                    cache.add(key("shared", n), Arc::from(name)).unwrap();
                }
            });
        }
    });

    assert_eq!(cache.size(), 100);
    for n in 0..100 {
        let value = cache.get(&key("shared", n)).unwrap();
        assert!(&*value == "left" || &*value == "right");
    }
}

#[test]
fn never_inserted_key_is_absent() {
    let cache: MapperCache<MapperKey<FieldDescriptor>, ()> = MapperCache::ordered();
    assert!(cache.get(&key("nothing", 0)).is_none());

    for n in 0..(SIZE_THRESHOLD * 2) {
        cache.add(key("present", n), ()).unwrap();
    }
    assert!(cache.get(&key("nothing", 0)).is_none());
    assert!(!cache.contains(&key("present", SIZE_THRESHOLD * 2)));
}

#[test]
fn crossing_the_threshold_keeps_every_entry_visible() {
    let ordered: MapperCache<MapperKey<FieldDescriptor>, usize> = MapperCache::ordered();
    let unordered: MapperCache<MapperKey<FieldDescriptor>, usize> = MapperCache::new();

    // Insert in a scrambled order so the ordered table really has to sort.
    let order: Vec<usize> = (0..(SIZE_THRESHOLD + 10)).map(|i| (i * 17) % (SIZE_THRESHOLD + 10)).collect();
    for (inserted, &n) in order.iter().enumerate() {
        ordered.add(key("col", n), n).unwrap();
        unordered.add(key("col", n), n).unwrap();

        for &m in &order[..=inserted] {
            assert_eq!(ordered.get(&key("col", m)), Some(m));
            assert_eq!(unordered.get(&key("col", m)), Some(m));
        }
    }
    assert_eq!(ordered.size(), SIZE_THRESHOLD + 10);
}
