//! B-tree index implementation.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                        BTree                            │
//! │   whole-tree RwLock latch + modification counter        │
//! │  ┌───────────────┐   ┌───────────────┐                  │
//! │  │ insert/remove │   │  get / iter   │                  │
//! │  │ (write latch) │   │ (read latch)  │                  │
//! │  └───────┬───────┘   └───────┬───────┘                  │
//! │          ▼                   ▼                          │
//! │  ┌─────────────────────────────────────┐                │
//! │  │    Node  (split / merge / search)   │                │
//! │  └──────────────────┬──────────────────┘                │
//! └─────────────────────┼───────────────────────────────────┘
//!                       ▼
//!            NodeStore (read/write/allocate/delete pages)
//! ```
//!
//! A classic B-tree of minimum degree `t` ("order"): every non-root node
//! holds between `t - 1` and `2t - 1` keys, all leaves sit at the same
//! depth, and the root's page address never changes — growth and collapse
//! swap its content with a child's, not its identity.
//!
//! # Components
//! - [`BTree`] - orchestration: insert, get, remove, iteration, checks
//! - [`Node`] - one page's worth of keys, values, and child addresses
//! - [`Cursor`] - explicit-stack ascending traversal, fail-fast against
//!   concurrent structural mutation
//! - [`Comparator`] / [`NaturalOrder`] - the caller-supplied total order

mod cursor;
mod node;

pub use cursor::Cursor;
pub use node::Node;

use std::cmp::Ordering;

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::RwLock;

use crate::common::config::MIN_ORDER;
use crate::common::{Error, NodeAddress, Result};
use crate::store::NodeStore;

/// A total order over keys, supplied by the caller at construction.
///
/// Every ordering decision the tree makes goes through this; it must be
/// stable and total or the tree's structure is undefined.
pub trait Comparator<K> {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Orders keys by their `Ord` implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaturalOrder;

impl<K: Ord> Comparator<K> for NaturalOrder {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Orders keys by their `Ord` implementation, reversed.
///
/// Handy for descending indices without wrapping every key.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReverseOrder;

impl<K: Ord> Comparator<K> for ReverseOrder {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        b.cmp(a)
    }
}

/// A disk-backed B-tree index over a [`NodeStore`].
///
/// # Concurrency
/// One whole-tree reader/writer latch, not per-page locks. `insert` and
/// `remove` hold the write latch for the entire call, including every
/// split/merge page write, so multi-page mutations are never interleaved.
/// `get`, cursor seeding, `check` and `max_depth` hold the read latch for
/// the call's duration only.
///
/// The modification counter is per-tree-instance state: bumped under the
/// write latch on every structural mutation, read lock-free by cursors.
/// A cursor that observes a bump fails with `ConcurrentModification`
/// rather than returning entries from a tree that has shifted under it.
///
/// # Durability
/// Every structurally mutated page is written back through the store
/// before the call returns. There is no WAL at this layer: a crash in the
/// middle of a split or merge leaves an unspecified subset of the touched
/// pages written.
///
/// # Example
/// ```
/// use pagetree::{BTree, MemoryNodeStore};
///
/// let store: MemoryNodeStore<u64, String> = MemoryNodeStore::new();
/// let tree = BTree::new(store, 2).unwrap();
///
/// tree.insert(10, "ten".to_string()).unwrap();
/// assert_eq!(tree.get(&10).unwrap().as_deref(), Some("ten"));
/// ```
pub struct BTree<K, V, S, C = NaturalOrder> {
    /// The page store everything lives in.
    pub(crate) store: S,
    /// The root's address. Permanent: content moves, identity doesn't.
    pub(crate) root: NodeAddress,
    /// Minimum degree `t`.
    pub(crate) order: usize,
    /// Caller-supplied total order over keys.
    pub(crate) cmp: C,
    /// Whole-tree latch.
    pub(crate) latch: RwLock<()>,
    /// Bumped under the write latch on every structural mutation.
    pub(crate) mod_count: AtomicU64,
    _kv: PhantomData<fn(K) -> V>,
}

impl<K, V, S> BTree<K, V, S, NaturalOrder>
where
    K: Clone + Ord,
    V: Clone,
    S: NodeStore<K, V>,
{
    /// Open (or initialize) a tree over `store` with keys in their
    /// natural order.
    ///
    /// # Errors
    /// See [`with_comparator`](Self::with_comparator).
    pub fn new(store: S, order: usize) -> Result<Self> {
        Self::with_comparator(store, order, NaturalOrder)
    }
}

impl<K, V, S, C> BTree<K, V, S, C>
where
    K: Clone,
    V: Clone,
    S: NodeStore<K, V>,
    C: Comparator<K>,
{
    /// Open the tree stored in `store`, or initialize an empty one.
    ///
    /// Reads the root at `store.root_address()`. If that page was never
    /// written (`NodeNotFound`), an empty leaf root is created, written,
    /// and flushed; any other read error propagates.
    ///
    /// # Errors
    /// - `InvalidArgument` if `order < 2`
    /// - storage errors from the root read or initial write
    pub fn with_comparator(store: S, order: usize, cmp: C) -> Result<Self> {
        if order < MIN_ORDER {
            return Err(Error::InvalidArgument(format!(
                "order must be >= {}, got {}",
                MIN_ORDER, order
            )));
        }

        let root = store.root_address()?;
        match store.read_node(root) {
            Ok(_) => {}
            Err(Error::NodeNotFound(_)) => {
                let empty: Node<K, V> = Node::new_leaf(root);
                store.write_node(&empty)?;
                store.flush()?;
            }
            Err(e) => return Err(e),
        }

        Ok(Self {
            store,
            root,
            order,
            cmp,
            latch: RwLock::new(()),
            mod_count: AtomicU64::new(0),
            _kv: PhantomData,
        })
    }

    /// The tree's minimum degree `t`.
    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Bump the modification counter. Callers hold the write latch.
    fn bump(&self) {
        self.mod_count.fetch_add(1, AtomicOrdering::Relaxed);
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Insert `key` → `value`, overwriting any existing value in place.
    ///
    /// An overwrite is not a structural change: no pages move, the
    /// modification counter stays put, and open cursors stay valid. The
    /// call first walks the search path looking for the key; only if the
    /// key is absent does the insertion descent run, splitting full nodes
    /// on the way down (splits happen *before* descending, so there is
    /// always room for a promoted median). If the root itself is full the
    /// tree first grows a level via content hoisting, keeping the root's
    /// address constant.
    pub fn insert(&self, key: K, value: V) -> Result<()> {
        let _latch = self.latch.write();

        // Overwrite pass: a present key is rewritten where it sits,
        // before any split or root growth gets a chance to run.
        let mut node = self.store.read_node(self.root)?;
        loop {
            match node.search(&key, &self.cmp) {
                Ok(i) => {
                    node.replace_value(i, value);
                    self.store.write_node(&node)?;
                    return Ok(());
                }
                Err(_) if node.is_leaf() => break,
                Err(i) => node = self.store.read_node(node.child_address(i))?,
            }
        }

        let mut root = self.store.read_node(self.root)?;
        if root.is_full(self.order) {
            // Copy-swap root growth: old content moves to a fresh page
            // which becomes child 0, then splits into the root.
            let new_address = self.store.allocate_address()?;
            let mut moved = root.hoist(new_address);
            moved.split(self.order, &mut root, 0, &self.store)?;
            self.bump();
        }
        self.insert_rec(root, key, value)
    }

    /// Descend into `node` (guaranteed non-full) and insert `key`, which
    /// the overwrite pass has established is absent from the tree.
    fn insert_rec(&self, mut node: Node<K, V>, key: K, value: V) -> Result<()> {
        let i = match node.search(&key, &self.cmp) {
            Ok(_) => unreachable!("insertion descent only runs for absent keys"),
            Err(i) => i,
        };
        if node.is_leaf() {
            node.insert_entry(i, key, value);
            self.store.write_node(&node)?;
            self.bump();
            return Ok(());
        }

        let mut child = self.store.read_node(node.child_address(i))?;
        if child.is_full(self.order) {
            let sibling = child.split(self.order, &mut node, i, &self.store)?;
            self.bump();
            // The promoted median shifts the slot; re-pick the half to
            // descend into.
            return match node.search(&key, &self.cmp) {
                Ok(_) => unreachable!("promoted median comes from existing keys"),
                Err(j) if j == i => self.insert_rec(child, key, value),
                Err(j) => {
                    debug_assert_eq!(j, i + 1);
                    self.insert_rec(sibling, key, value)
                }
            };
        }
        self.insert_rec(child, key, value)
    }

    // ========================================================================
    // Find
    // ========================================================================

    /// Look up `key`, binary-searching each node on the root-to-leaf path.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let _latch = self.latch.read();

        let mut node = self.store.read_node(self.root)?;
        loop {
            match node.search(key, &self.cmp) {
                Ok(i) => return Ok(Some(node.value(i).clone())),
                Err(_) if node.is_leaf() => return Ok(None),
                Err(i) => node = self.store.read_node(node.child_address(i))?,
            }
        }
    }

    // ========================================================================
    // Remove
    // ========================================================================

    /// Remove `key`. Returns whether it was present.
    ///
    /// Standard single-pass B-tree deletion: every child is brought up to
    /// at least `t` keys (by borrowing from a rich sibling or merging)
    /// *before* descending into it, so no node underflows behind us. If
    /// the root ends up keyless with one remaining child, the tree
    /// shrinks a level: the child's content is pulled up into the root
    /// page and the child page is reclaimed.
    pub fn remove(&self, key: &K) -> Result<bool> {
        let _latch = self.latch.write();

        let root = self.store.read_node(self.root)?;
        let removed = self.remove_rec(root, key)?;

        let mut root = self.store.read_node(self.root)?;
        if root.is_empty() && !root.is_leaf() {
            let child = self.store.read_node(root.child_address(0))?;
            let orphan = root.adopt(child);
            self.store.write_node(&root)?;
            self.store.delete_node(orphan)?;
            self.bump();
        }
        Ok(removed)
    }

    fn remove_rec(&self, node: Node<K, V>, key: &K) -> Result<bool> {
        match node.search(key, &self.cmp) {
            Ok(i) => self.remove_found(node, i, key),
            Err(i) => {
                if node.is_leaf() {
                    // Absent key: nothing to do.
                    return Ok(false);
                }
                let child = self.store.read_node(node.child_address(i))?;
                let child = if child.len() < self.order {
                    self.fix_deficient(node, i, child)?
                } else {
                    child
                };
                self.remove_rec(child, key)
            }
        }
    }

    /// `node` holds `key` at index `i`.
    fn remove_found(&self, mut node: Node<K, V>, i: usize, key: &K) -> Result<bool> {
        if node.is_leaf() {
            node.remove_entry(i);
            debug_assert!(
                node.address() == self.root || !node.is_empty(),
                "delete emptied a non-root leaf"
            );
            self.store.write_node(&node)?;
            self.bump();
            return Ok(true);
        }

        // Internal node: replace with the in-order predecessor or
        // successor if the adjacent child can spare a key, else merge the
        // two children around the key and chase it down.
        let left = self.store.read_node(node.child_address(i))?;
        if left.len() >= self.order {
            let (pk, pv) = self.subtree_max(&left)?;
            node.replace_entry(i, pk.clone(), pv);
            self.store.write_node(&node)?;
            self.remove_rec(left, &pk)?;
            return Ok(true);
        }

        let right = self.store.read_node(node.child_address(i + 1))?;
        if right.len() >= self.order {
            let (sk, sv) = self.subtree_min(&right)?;
            node.replace_entry(i, sk.clone(), sv);
            self.store.write_node(&node)?;
            self.remove_rec(right, &sk)?;
            return Ok(true);
        }

        let (k, v) = node.remove_entry(i);
        node.remove_child(i + 1);
        let mut merged = left;
        merged.merge_from(right, k, v, &self.store)?;
        self.store.write_node(&node)?;
        self.bump();
        self.remove_rec(merged, key)
    }

    /// Largest entry in the subtree rooted at `node`.
    fn subtree_max(&self, node: &Node<K, V>) -> Result<(K, V)> {
        if node.is_leaf() {
            let i = node.len() - 1;
            return Ok((node.key(i).clone(), node.value(i).clone()));
        }
        let mut current = self.store.read_node(node.child_address(node.len()))?;
        loop {
            if current.is_leaf() {
                let i = current.len() - 1;
                return Ok((current.key(i).clone(), current.value(i).clone()));
            }
            current = self.store.read_node(current.child_address(current.len()))?;
        }
    }

    /// Smallest entry in the subtree rooted at `node`.
    fn subtree_min(&self, node: &Node<K, V>) -> Result<(K, V)> {
        if node.is_leaf() {
            return Ok((node.key(0).clone(), node.value(0).clone()));
        }
        let mut current = self.store.read_node(node.child_address(0))?;
        loop {
            if current.is_leaf() {
                return Ok((current.key(0).clone(), current.value(0).clone()));
            }
            current = self.store.read_node(current.child_address(0))?;
        }
    }

    /// Bring child `i` of `parent` up to at least `t` keys before a
    /// descent: borrow from an adjacent sibling with keys to spare
    /// (rotating through the parent), or merge with one (the separator
    /// comes down from the parent). Returns the node to descend into —
    /// after a merge with the left sibling that is a different node.
    fn fix_deficient(
        &self,
        mut parent: Node<K, V>,
        i: usize,
        mut child: Node<K, V>,
    ) -> Result<Node<K, V>> {
        let mut left = if i > 0 {
            Some(self.store.read_node(parent.child_address(i - 1))?)
        } else {
            None
        };

        if let Some(left) = left.as_mut() {
            if left.len() >= self.order {
                // Rotate right: left's max moves up, the separator moves
                // down into the child (with left's last subtree, if any).
                let (lk, lv) = left.pop_entry().expect("rich sibling has entries");
                let (pk, pv) = parent.replace_entry(i - 1, lk, lv);
                child.insert_entry(0, pk, pv);
                if let Some(address) = left.pop_child() {
                    child.insert_child(0, address);
                }
                self.store.write_node(left)?;
                self.store.write_node(&child)?;
                self.store.write_node(&parent)?;
                self.bump();
                return Ok(child);
            }
        }

        if i < parent.len() {
            let mut right = self.store.read_node(parent.child_address(i + 1))?;
            if right.len() >= self.order {
                // Rotate left: mirror image of the above.
                let (rk, rv) = right.remove_entry(0);
                let (pk, pv) = parent.replace_entry(i, rk, rv);
                child.push_entry(pk, pv);
                if !right.is_leaf() {
                    child.push_child(right.remove_child(0));
                }
                self.store.write_node(&right)?;
                self.store.write_node(&child)?;
                self.store.write_node(&parent)?;
                self.bump();
                return Ok(child);
            }
            if left.is_none() {
                // Leftmost child: absorb the right sibling.
                let (k, v) = parent.remove_entry(0);
                parent.remove_child(1);
                child.merge_from(right, k, v, &self.store)?;
                self.store.write_node(&parent)?;
                self.bump();
                return Ok(child);
            }
        }

        // Both siblings poor (or none to the right): fold into the left.
        let mut left = match left {
            Some(left) => left,
            None => unreachable!("a deficient child has at least one sibling"),
        };
        let (k, v) = parent.remove_entry(i - 1);
        parent.remove_child(i);
        left.merge_from(child, k, v, &self.store)?;
        self.store.write_node(&parent)?;
        self.bump();
        Ok(left)
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Ascending cursor over the whole tree.
    pub fn iter(&self) -> Result<Cursor<'_, K, V, S, C>> {
        Cursor::at_start(self)
    }

    /// Ascending cursor positioned at `key`, or at the next larger key if
    /// `key` is absent (exhausted if nothing is larger).
    pub fn iter_from(&self, key: &K) -> Result<Cursor<'_, K, V, S, C>> {
        Cursor::at_key(self, key)
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Height of the tree: 1 for a lone leaf root.
    ///
    /// Walks every subtree rather than trusting the equal-leaf-depth
    /// invariant, so it doubles as a sanity probe in tests.
    pub fn max_depth(&self) -> Result<usize> {
        let _latch = self.latch.read();
        let root = self.store.read_node(self.root)?;
        self.depth_rec(&root)
    }

    fn depth_rec(&self, node: &Node<K, V>) -> Result<usize> {
        if node.is_leaf() {
            return Ok(1);
        }
        let mut deepest = 0;
        for index in 0..=node.len() {
            let child = self.store.read_node(node.child_address(index))?;
            deepest = deepest.max(self.depth_rec(&child)?);
        }
        Ok(1 + deepest)
    }

    /// Debug invariant probe: recursively verifies that every node's max
    /// key sits below its rightmost child's min key.
    ///
    /// Deliberately partial — it catches the separator-ordering mistakes
    /// that split/merge bugs produce, and nothing more.
    ///
    /// # Errors
    /// `InvalidTreeInvariant` naming the offending node.
    pub fn check(&self) -> Result<()> {
        let _latch = self.latch.read();
        let root = self.store.read_node(self.root)?;
        self.check_rec(&root)
    }

    fn check_rec(&self, node: &Node<K, V>) -> Result<()> {
        if node.is_leaf() {
            return Ok(());
        }
        for index in 0..=node.len() {
            let child = self.store.read_node(node.child_address(index))?;
            self.check_rec(&child)?;
        }
        if let Some(max_key) = node.keys().last() {
            let rightmost = self.store.read_node(node.child_address(node.len()))?;
            if let Some(min_key) = rightmost.keys().first() {
                if self.cmp.compare(max_key, min_key) != Ordering::Less {
                    return Err(Error::InvalidTreeInvariant(format!(
                        "{} has a max key >= its rightmost child's min key",
                        node.address()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryNodeStore;

    type TestTree = BTree<u64, String, MemoryNodeStore<u64, String>>;

    fn tree(order: usize) -> TestTree {
        BTree::new(MemoryNodeStore::new(), order).unwrap()
    }

    fn val(k: u64) -> String {
        format!("v{}", k)
    }

    fn keys_in_order(tree: &TestTree) -> Vec<u64> {
        tree.iter()
            .unwrap()
            .map(|entry| entry.unwrap().0)
            .collect()
    }

    /// Full structural verification: key ordering within nodes,
    /// occupancy bounds, child counts, equal leaf depth.
    fn verify(tree: &TestTree) {
        let root = tree.store.read_node(tree.root).unwrap();
        let mut leaf_depths = Vec::new();
        verify_rec(tree, &root, true, 1, &mut leaf_depths);
        assert!(
            leaf_depths.windows(2).all(|w| w[0] == w[1]),
            "leaves at unequal depths: {:?}",
            leaf_depths
        );
        tree.check().unwrap();
    }

    fn verify_rec(
        tree: &TestTree,
        node: &Node<u64, String>,
        is_root: bool,
        depth: usize,
        leaf_depths: &mut Vec<usize>,
    ) {
        let t = tree.order;
        if is_root {
            assert!(node.len() <= 2 * t - 1, "root overfull");
        } else {
            assert!(
                node.len() >= t - 1 && node.len() <= 2 * t - 1,
                "occupancy violation: {} keys with t={}",
                node.len(),
                t
            );
        }
        assert!(
            node.keys().windows(2).all(|w| w[0] < w[1]),
            "keys out of order in {}",
            node.address()
        );
        if node.is_leaf() {
            leaf_depths.push(depth);
            return;
        }
        assert_eq!(node.children().len(), node.len() + 1);
        for index in 0..=node.len() {
            let child = tree.store.read_node(node.child_address(index)).unwrap();
            if index > 0 {
                assert!(child.keys().first().unwrap() > node.key(index - 1));
            }
            if index < node.len() {
                assert!(child.keys().last().unwrap() < node.key(index));
            }
            verify_rec(tree, &child, false, depth + 1, leaf_depths);
        }
    }

    #[test]
    fn test_order_below_minimum_rejected() {
        let store: MemoryNodeStore<u64, String> = MemoryNodeStore::new();
        assert!(matches!(
            BTree::<u64, String, _>::new(store, 1),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_get_on_empty_tree() {
        let t = tree(2);
        assert_eq!(t.get(&42).unwrap(), None);
        assert_eq!(t.max_depth().unwrap(), 1);
    }

    #[test]
    fn test_insert_and_get() {
        let t = tree(2);
        for k in [10u64, 20, 5, 15, 25] {
            t.insert(k, val(k)).unwrap();
        }
        for k in [10u64, 20, 5, 15, 25] {
            assert_eq!(t.get(&k).unwrap(), Some(val(k)));
        }
        assert_eq!(t.get(&99).unwrap(), None);
    }

    #[test]
    fn test_five_inserts_split_once() {
        // t=2: the fourth insert overflows a 3-key root.
        let t = tree(2);
        for k in [10u64, 20, 5, 15, 25] {
            t.insert(k, val(k)).unwrap();
        }
        assert_eq!(keys_in_order(&t), vec![5, 10, 15, 20, 25]);
        assert_eq!(t.max_depth().unwrap(), 2);
        verify(&t);
    }

    #[test]
    fn test_overwrite_is_not_structural() {
        let t = tree(2);
        for k in 0..10u64 {
            t.insert(k, val(k)).unwrap();
        }
        let nodes_before = t.store.node_count();
        let mods_before = t.mod_count.load(AtomicOrdering::Relaxed);

        t.insert(5, "overwritten".to_string()).unwrap();

        assert_eq!(t.store.node_count(), nodes_before);
        assert_eq!(t.mod_count.load(AtomicOrdering::Relaxed), mods_before);
        assert_eq!(t.get(&5).unwrap().as_deref(), Some("overwritten"));
        assert_eq!(keys_in_order(&t).len(), 10);
    }

    #[test]
    fn test_overwrite_into_full_root_does_not_grow_tree() {
        // Three keys fill a t=2 root to the brim; rewriting one of them
        // must not trigger root growth.
        let t = tree(2);
        for k in [10u64, 20, 30] {
            t.insert(k, val(k)).unwrap();
        }
        assert_eq!(t.max_depth().unwrap(), 1);
        let mods_before = t.mod_count.load(AtomicOrdering::Relaxed);

        t.insert(20, "rewritten".to_string()).unwrap();

        assert_eq!(t.max_depth().unwrap(), 1);
        assert_eq!(t.store.node_count(), 1);
        assert_eq!(t.mod_count.load(AtomicOrdering::Relaxed), mods_before);
        assert_eq!(t.get(&20).unwrap().as_deref(), Some("rewritten"));
    }

    #[test]
    fn test_overwrite_below_full_root_does_not_split() {
        // 0..=7 in ascending order leaves a t=2 tree with a full internal
        // root ([1, 3, 5]); key 0 sits in a leaf. Rewriting it must not
        // restructure anything or disturb open cursors.
        let t = tree(2);
        for k in 0..8u64 {
            t.insert(k, val(k)).unwrap();
        }
        let root = t.store.read_node(t.root).unwrap();
        assert!(root.is_full(t.order()));
        assert!(!root.is_leaf());

        let depth_before = t.max_depth().unwrap();
        let nodes_before = t.store.node_count();
        let mods_before = t.mod_count.load(AtomicOrdering::Relaxed);
        let mut cursor = t.iter().unwrap();
        assert!(cursor.try_next().unwrap().is_some());

        t.insert(0, "rewritten".to_string()).unwrap();

        assert_eq!(t.max_depth().unwrap(), depth_before);
        assert_eq!(t.store.node_count(), nodes_before);
        assert_eq!(t.mod_count.load(AtomicOrdering::Relaxed), mods_before);
        assert!(cursor.try_next().unwrap().is_some());
        assert_eq!(t.get(&0).unwrap().as_deref(), Some("rewritten"));
    }

    #[test]
    fn test_get_returns_most_recent_value() {
        let t = tree(2);
        for round in 0..3 {
            for k in 0..20u64 {
                t.insert(k, format!("round{}-{}", round, k)).unwrap();
            }
        }
        for k in 0..20u64 {
            assert_eq!(t.get(&k).unwrap(), Some(format!("round2-{}", k)));
        }
    }

    #[test]
    fn test_root_address_constant_across_growth() {
        let t = tree(2);
        let root_before = t.root;
        for k in 0..100u64 {
            t.insert(k, val(k)).unwrap();
        }
        assert_eq!(t.root, root_before);
        let root = t.store.read_node(t.root).unwrap();
        assert_eq!(root.address(), root_before);
        assert!(t.max_depth().unwrap() > 2);
        verify(&t);
    }

    #[test]
    fn test_height_grows_by_one_per_root_split() {
        let t = tree(2);
        let mut last_depth = t.max_depth().unwrap();
        for k in 0..200u64 {
            t.insert(k, val(k)).unwrap();
            let depth = t.max_depth().unwrap();
            assert!(
                depth == last_depth || depth == last_depth + 1,
                "height jumped from {} to {}",
                last_depth,
                depth
            );
            last_depth = depth;
        }
        assert!(last_depth >= 4);
    }

    #[test]
    fn test_remove_absent_key_is_noop() {
        let t = tree(2);
        for k in [10u64, 20, 30] {
            t.insert(k, val(k)).unwrap();
        }
        let mods_before = t.mod_count.load(AtomicOrdering::Relaxed);
        assert!(!t.remove(&99).unwrap());
        assert_eq!(t.mod_count.load(AtomicOrdering::Relaxed), mods_before);
        assert_eq!(keys_in_order(&t), vec![10, 20, 30]);
    }

    #[test]
    fn test_remove_then_get() {
        let t = tree(2);
        for k in [10u64, 20, 5, 15, 25] {
            t.insert(k, val(k)).unwrap();
        }
        assert!(t.remove(&10).unwrap());
        assert_eq!(t.get(&10).unwrap(), None);
        assert_eq!(keys_in_order(&t), vec![5, 15, 20, 25]);
        verify(&t);
    }

    #[test]
    fn test_remove_everything_ascending() {
        let t = tree(2);
        for k in 0..64u64 {
            t.insert(k, val(k)).unwrap();
        }
        for k in 0..64u64 {
            assert!(t.remove(&k).unwrap(), "key {} missing", k);
            assert_eq!(t.get(&k).unwrap(), None);
            verify(&t);
        }
        assert_eq!(t.max_depth().unwrap(), 1);
        assert!(keys_in_order(&t).is_empty());
    }

    #[test]
    fn test_remove_everything_descending() {
        let t = tree(3);
        for k in 0..64u64 {
            t.insert(k, val(k)).unwrap();
        }
        for k in (0..64u64).rev() {
            assert!(t.remove(&k).unwrap());
            verify(&t);
        }
        assert_eq!(t.max_depth().unwrap(), 1);
    }

    #[test]
    fn test_remove_scattered() {
        // Deterministic scatter: multiply by an odd constant mod 2^7.
        let t = tree(2);
        let keys: Vec<u64> = (0..128u64).map(|i| (i * 37) % 128).collect();
        for &k in &keys {
            t.insert(k, val(k)).unwrap();
        }
        for &k in &keys {
            assert!(t.remove(&k).unwrap(), "key {} missing", k);
            assert_eq!(t.get(&k).unwrap(), None);
            verify(&t);
        }
    }

    #[test]
    fn test_shrink_reclaims_pages() {
        let t = tree(2);
        for k in 0..64u64 {
            t.insert(k, val(k)).unwrap();
        }
        for k in 0..64u64 {
            t.remove(&k).unwrap();
        }
        // Only the (empty) root page should remain live.
        assert_eq!(t.store.node_count(), 1);
    }

    #[test]
    fn test_matches_std_btreemap() {
        use std::collections::BTreeMap;

        let t = tree(2);
        let mut model: BTreeMap<u64, String> = BTreeMap::new();

        // Interleaved inserts, overwrites and removes, deterministic.
        let mut x: u64 = 0x2545_F491;
        for step in 0..2000u64 {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let k = (x >> 33) % 256;
            if step % 3 == 2 {
                assert_eq!(t.remove(&k).unwrap(), model.remove(&k).is_some());
            } else {
                let v = format!("s{}", step);
                t.insert(k, v.clone()).unwrap();
                model.insert(k, v);
            }
        }

        verify(&t);
        let got: Vec<(u64, String)> = t.iter().unwrap().map(|e| e.unwrap()).collect();
        let want: Vec<(u64, String)> =
            model.iter().map(|(k, v)| (*k, v.clone())).collect();
        assert_eq!(got, want);
        for k in 0..256u64 {
            assert_eq!(t.get(&k).unwrap(), model.get(&k).cloned());
        }
    }

    #[test]
    fn test_custom_comparator_reverses_order() {
        let store: MemoryNodeStore<u64, String> = MemoryNodeStore::new();
        let tree = BTree::with_comparator(store, 2, ReverseOrder).unwrap();
        for k in [10u64, 20, 5, 15, 25] {
            tree.insert(k, val(k)).unwrap();
        }
        let keys: Vec<u64> = tree.iter().unwrap().map(|e| e.unwrap().0).collect();
        assert_eq!(keys, vec![25, 20, 15, 10, 5]);
        tree.check().unwrap();
    }

    #[test]
    fn test_check_flags_misordered_separator() {
        let t = tree(2);
        for k in 0..16u64 {
            t.insert(k, val(k)).unwrap();
        }
        t.check().unwrap();

        // Sabotage: rewrite the root with its separator pushed above the
        // rightmost child's range.
        let root = t.store.read_node(t.root).unwrap();
        assert!(!root.is_leaf());
        let doctored = Node::from_parts(
            root.address(),
            root.keys().iter().map(|_| u64::MAX).collect(),
            root.values().to_vec(),
            root.children().to_vec(),
        );
        t.store.write_node(&doctored).unwrap();

        assert!(matches!(
            t.check(),
            Err(Error::InvalidTreeInvariant(_))
        ));
    }

    #[test]
    fn test_reopen_existing_tree() {
        let store: MemoryNodeStore<u64, String> = MemoryNodeStore::new();
        {
            let t = BTree::new(&store, 2).unwrap();
            for k in 0..32u64 {
                t.insert(k, val(k)).unwrap();
            }
        }
        let t = BTree::new(&store, 2).unwrap();
        for k in 0..32u64 {
            assert_eq!(t.get(&k).unwrap(), Some(val(k)));
        }
    }
}
