//! End-to-end scenarios over the paged (on-disk) store.
//!
//! The unit tests cover the tree and stores piecewise; these run the
//! whole stack the way an embedding application would: a real file,
//! real page writes, reopening between sessions.

use pagetree::{BTree, Error, MemoryNodeStore, PagedNodeStore, U64StrCodec};
use tempfile::tempdir;

type DiskTree = BTree<u64, String, PagedNodeStore<U64StrCodec>>;

fn disk_tree(path: &std::path::Path, order: usize) -> DiskTree {
    let store = PagedNodeStore::open_or_create(path, U64StrCodec).unwrap();
    BTree::new(store, order).unwrap()
}

fn keys_of(tree: &DiskTree) -> Vec<u64> {
    tree.iter().unwrap().map(|e| e.unwrap().0).collect()
}

#[test]
fn empty_tree_finds_nothing() {
    let dir = tempdir().unwrap();
    let tree = disk_tree(&dir.path().join("index.db"), 2);

    assert_eq!(tree.get(&1).unwrap(), None);
    assert_eq!(tree.max_depth().unwrap(), 1);
    assert!(keys_of(&tree).is_empty());
}

#[test]
fn five_inserts_split_and_scan_in_order() {
    let dir = tempdir().unwrap();
    let tree = disk_tree(&dir.path().join("index.db"), 2);

    for (k, v) in [(10, "a"), (20, "b"), (5, "c"), (15, "d"), (25, "e")] {
        tree.insert(k, v.to_string()).unwrap();
    }

    assert_eq!(keys_of(&tree), vec![5, 10, 15, 20, 25]);
    assert_eq!(tree.max_depth().unwrap(), 2);
    assert_eq!(tree.get(&15).unwrap().as_deref(), Some("d"));
    tree.check().unwrap();
}

#[test]
fn delete_then_find_is_none() {
    let dir = tempdir().unwrap();
    let tree = disk_tree(&dir.path().join("index.db"), 2);

    for (k, v) in [(10, "a"), (20, "b"), (5, "c"), (15, "d"), (25, "e")] {
        tree.insert(k, v.to_string()).unwrap();
    }

    assert!(tree.remove(&10).unwrap());
    assert_eq!(tree.get(&10).unwrap(), None);
    assert_eq!(keys_of(&tree), vec![5, 15, 20, 25]);
    tree.check().unwrap();
}

#[test]
fn mutation_between_next_calls_is_detected() {
    let dir = tempdir().unwrap();
    let tree = disk_tree(&dir.path().join("index.db"), 2);
    for k in [10u64, 20, 30] {
        tree.insert(k, format!("v{}", k)).unwrap();
    }

    let mut cursor = tree.iter().unwrap();
    assert!(cursor.try_next().unwrap().is_some());

    tree.insert(40, "v40".to_string()).unwrap();

    assert!(matches!(
        cursor.try_next(),
        Err(Error::ConcurrentModification)
    ));
}

#[test]
fn contents_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.db");

    {
        let tree = disk_tree(&path, 2);
        for k in 0..200u64 {
            tree.insert(k, format!("v{}", k)).unwrap();
        }
        for k in (0..200u64).step_by(3) {
            tree.remove(&k).unwrap();
        }
    } // store dropped, file closed

    let tree = disk_tree(&path, 2);
    for k in 0..200u64 {
        let expected = if k % 3 == 0 { None } else { Some(format!("v{}", k)) };
        assert_eq!(tree.get(&k).unwrap(), expected, "key {}", k);
    }
    assert!(keys_of(&tree).windows(2).all(|w| w[0] < w[1]));
    tree.check().unwrap();
}

#[test]
fn seek_positions_at_or_after_key() {
    let dir = tempdir().unwrap();
    let tree = disk_tree(&dir.path().join("index.db"), 2);
    for k in (0..100u64).step_by(10) {
        tree.insert(k, format!("v{}", k)).unwrap();
    }

    let from_exact: Vec<u64> = tree.iter_from(&50).unwrap().map(|e| e.unwrap().0).collect();
    assert_eq!(from_exact, vec![50, 60, 70, 80, 90]);

    let from_gap: Vec<u64> = tree.iter_from(&55).unwrap().map(|e| e.unwrap().0).collect();
    assert_eq!(from_gap, vec![60, 70, 80, 90]);

    let mut past_end = tree.iter_from(&1000).unwrap();
    assert!(!past_end.has_next());
}

#[test]
fn larger_workload_matches_model() {
    use std::collections::BTreeMap;

    let dir = tempdir().unwrap();
    let tree = disk_tree(&dir.path().join("index.db"), 4);
    let mut model: BTreeMap<u64, String> = BTreeMap::new();

    let mut x: u64 = 0xB5AD_4ECE;
    for step in 0..1500u64 {
        x = x
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let k = (x >> 33) % 400;
        match step % 4 {
            3 => {
                assert_eq!(tree.remove(&k).unwrap(), model.remove(&k).is_some());
            }
            _ => {
                let v = format!("s{}", step);
                tree.insert(k, v.clone()).unwrap();
                model.insert(k, v);
            }
        }
    }

    let got: Vec<(u64, String)> = tree.iter().unwrap().map(|e| e.unwrap()).collect();
    let want: Vec<(u64, String)> = model.iter().map(|(k, v)| (*k, v.clone())).collect();
    assert_eq!(got, want);
    tree.check().unwrap();
}

#[test]
fn memory_and_disk_trees_agree() {
    let dir = tempdir().unwrap();
    let disk = disk_tree(&dir.path().join("index.db"), 3);
    let mem = BTree::new(MemoryNodeStore::<u64, String>::new(), 3).unwrap();

    for i in 0..300u64 {
        let k = (i * 197) % 300;
        disk.insert(k, format!("v{}", k)).unwrap();
        mem.insert(k, format!("v{}", k)).unwrap();
    }
    for k in (0..300u64).step_by(7) {
        assert_eq!(disk.remove(&k).unwrap(), mem.remove(&k).unwrap());
    }

    let d: Vec<(u64, String)> = disk.iter().unwrap().map(|e| e.unwrap()).collect();
    let m: Vec<(u64, String)> = mem.iter().unwrap().map(|e| e.unwrap()).collect();
    assert_eq!(d, m);
}
