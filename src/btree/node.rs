//! Node - the in-memory representation of one tree page.
//!
//! A [`Node`] holds an ordered run of keys, the parallel run of values,
//! and (for internal nodes) the addresses of its children. Nodes are
//! plain owned values: the store hands out a fresh copy on every read and
//! the tree writes mutated copies back. Child access is a lookup through
//! the store, never an ownership edge.

use crate::common::config::MIN_ORDER;
use crate::common::{Error, NodeAddress, Result};
use crate::store::NodeStore;

use super::Comparator;

/// One page of the tree.
///
/// # Shape invariants
/// - `keys.len() == values.len()` always.
/// - A leaf has no children; an internal node with `n` keys has exactly
///   `n + 1` children.
/// - Keys are strictly increasing under the tree's comparator.
/// - Every non-root node holds between `t - 1` and `2t - 1` keys.
///
/// The tree maintains these; `Node` itself only `debug_assert!`s them at
/// the seams where a violation would silently corrupt structure.
#[derive(Debug, Clone)]
pub struct Node<K, V> {
    /// Where this node lives in the store. Stable once allocated.
    address: NodeAddress,
    /// Ordered keys (length n).
    keys: Vec<K>,
    /// Values parallel to `keys`.
    values: Vec<V>,
    /// Child addresses: empty for a leaf, n+1 entries for internal.
    children: Vec<NodeAddress>,
}

impl<K, V> Node<K, V> {
    /// Create an empty leaf at `address`.
    pub fn new_leaf(address: NodeAddress) -> Self {
        Self {
            address,
            keys: Vec::new(),
            values: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Reassemble a node from its stored parts.
    ///
    /// Used by store implementations when decoding a page.
    pub fn from_parts(
        address: NodeAddress,
        keys: Vec<K>,
        values: Vec<V>,
        children: Vec<NodeAddress>,
    ) -> Self {
        debug_assert_eq!(keys.len(), values.len(), "keys and values must be parallel");
        debug_assert!(
            children.is_empty() || children.len() == keys.len() + 1,
            "internal node must have n+1 children"
        );
        Self {
            address,
            keys,
            values,
            children,
        }
    }

    #[inline]
    pub fn address(&self) -> NodeAddress {
        self.address
    }

    /// Number of keys in this node.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// A node is full when it holds `2t - 1` keys.
    #[inline]
    pub fn is_full(&self, order: usize) -> bool {
        self.keys.len() == 2 * order - 1
    }

    #[inline]
    pub fn key(&self, index: usize) -> &K {
        &self.keys[index]
    }

    #[inline]
    pub fn value(&self, index: usize) -> &V {
        &self.values[index]
    }

    #[inline]
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    #[inline]
    pub fn values(&self) -> &[V] {
        &self.values
    }

    #[inline]
    pub fn children(&self) -> &[NodeAddress] {
        &self.children
    }

    /// Address of child `index`. Loading it is the caller's business.
    #[inline]
    pub fn child_address(&self, index: usize) -> NodeAddress {
        self.children[index]
    }

    /// Binary-search for `key` under `cmp`.
    ///
    /// `Ok(i)` if `keys[i]` equals `key`; `Err(i)` with the insertion
    /// point otherwise (same contract as `slice::binary_search`).
    pub fn search<C: Comparator<K>>(&self, key: &K, cmp: &C) -> std::result::Result<usize, usize> {
        self.keys.binary_search_by(|probe| cmp.compare(probe, key))
    }

    /// Overwrite-or-insert in this node alone.
    ///
    /// Returns the previous value if the key was already present. The
    /// caller persists the node afterwards.
    pub fn upsert<C: Comparator<K>>(&mut self, key: K, value: V, cmp: &C) -> Option<V> {
        match self.search(&key, cmp) {
            Ok(i) => Some(std::mem::replace(&mut self.values[i], value)),
            Err(i) => {
                self.keys.insert(i, key);
                self.values.insert(i, value);
                None
            }
        }
    }

    // ========================================================================
    // Entry/child surgery used by the tree's rebalancing
    // ========================================================================

    pub(crate) fn insert_entry(&mut self, index: usize, key: K, value: V) {
        self.keys.insert(index, key);
        self.values.insert(index, value);
    }

    pub(crate) fn remove_entry(&mut self, index: usize) -> (K, V) {
        (self.keys.remove(index), self.values.remove(index))
    }

    /// Replace the entry at `index`, returning the old one.
    pub(crate) fn replace_entry(&mut self, index: usize, key: K, value: V) -> (K, V) {
        (
            std::mem::replace(&mut self.keys[index], key),
            std::mem::replace(&mut self.values[index], value),
        )
    }

    pub(crate) fn replace_value(&mut self, index: usize, value: V) -> V {
        std::mem::replace(&mut self.values[index], value)
    }

    pub(crate) fn push_entry(&mut self, key: K, value: V) {
        self.keys.push(key);
        self.values.push(value);
    }

    pub(crate) fn pop_entry(&mut self) -> Option<(K, V)> {
        match (self.keys.pop(), self.values.pop()) {
            (Some(k), Some(v)) => Some((k, v)),
            _ => None,
        }
    }

    pub(crate) fn insert_child(&mut self, index: usize, address: NodeAddress) {
        self.children.insert(index, address);
    }

    pub(crate) fn remove_child(&mut self, index: usize) -> NodeAddress {
        self.children.remove(index)
    }

    pub(crate) fn push_child(&mut self, address: NodeAddress) {
        self.children.push(address);
    }

    pub(crate) fn pop_child(&mut self) -> Option<NodeAddress> {
        self.children.pop()
    }

    // ========================================================================
    // Structural operations
    // ========================================================================

    /// Split this full node around its median.
    ///
    /// `self` is child `index_in_parent` of `parent` and holds `2t - 1`
    /// keys. The upper `t - 1` keys/values (and upper `t` children, if
    /// internal) move into a freshly allocated sibling; the median is
    /// promoted into `parent` at `index_in_parent`; the sibling's address
    /// lands at `index_in_parent + 1` in the parent's child list.
    ///
    /// Persists parent, self, and the new sibling, in that order, and
    /// returns the sibling so the caller can keep descending without a
    /// re-read.
    ///
    /// # Errors
    /// `InvalidArgument` if `order < 2`; storage errors from allocation
    /// or the three writes. A failure between writes leaves the pages
    /// partially updated — there is no rollback at this layer.
    pub(crate) fn split<S: NodeStore<K, V>>(
        &mut self,
        order: usize,
        parent: &mut Node<K, V>,
        index_in_parent: usize,
        store: &S,
    ) -> Result<Node<K, V>> {
        if order < MIN_ORDER {
            return Err(Error::InvalidArgument(format!(
                "order must be >= {}, got {}",
                MIN_ORDER, order
            )));
        }
        debug_assert!(self.is_full(order), "split requires a full node");
        debug_assert_eq!(parent.children[index_in_parent], self.address);

        let sibling_address = store.allocate_address()?;

        // Upper t-1 entries (and upper t children) move to the sibling.
        let upper_keys = self.keys.split_off(order);
        let upper_values = self.values.split_off(order);
        let upper_children = if self.is_leaf() {
            Vec::new()
        } else {
            self.children.split_off(order)
        };
        let sibling = Node {
            address: sibling_address,
            keys: upper_keys,
            values: upper_values,
            children: upper_children,
        };

        // The median (index t-1) goes up into the parent.
        let median_key = self.keys.pop().expect("full node has a median");
        let median_value = self.values.pop().expect("full node has a median");
        parent.keys.insert(index_in_parent, median_key);
        parent.values.insert(index_in_parent, median_value);
        parent.children.insert(index_in_parent + 1, sibling_address);

        store.write_node(parent)?;
        store.write_node(self)?;
        store.write_node(&sibling)?;

        Ok(sibling)
    }

    /// Absorb `other` (strictly greater keys) around the separator entry.
    ///
    /// Appends `(key, value)` and then all of `other`'s entries and
    /// children onto `self`, deletes `other`'s page, and persists `self`.
    /// The caller is responsible for removing the separator and `other`'s
    /// address from the parent and persisting it.
    pub(crate) fn merge_from<S: NodeStore<K, V>>(
        &mut self,
        other: Node<K, V>,
        key: K,
        value: V,
        store: &S,
    ) -> Result<()> {
        debug_assert_eq!(
            self.is_leaf(),
            other.is_leaf(),
            "merge requires nodes of the same shape"
        );
        let other_address = other.address;

        self.keys.push(key);
        self.values.push(value);
        self.keys.extend(other.keys);
        self.values.extend(other.values);
        self.children.extend(other.children);

        store.delete_node(other_address)?;
        store.write_node(self)?;
        Ok(())
    }

    /// Move this root's entire content to a new node at `new_address`,
    /// leaving the root as an internal node with that single child.
    ///
    /// This is the copy-swap half of a root split: the root's address
    /// stays the entry point while its old content becomes child 0,
    /// ready to be split. Nothing is persisted here; the follow-up
    /// `split` writes all three pages.
    pub(crate) fn hoist(&mut self, new_address: NodeAddress) -> Node<K, V> {
        Node {
            address: new_address,
            keys: std::mem::take(&mut self.keys),
            values: std::mem::take(&mut self.values),
            children: std::mem::replace(&mut self.children, vec![new_address]),
        }
    }

    /// Replace this root's content with `child`'s, keeping the root
    /// address. Returns the child's (now orphaned) address for deletion.
    ///
    /// This is the inverse of [`hoist`](Self::hoist): when the root is
    /// left keyless with a single child, the tree shrinks a level by
    /// pulling that child's content up.
    pub(crate) fn adopt(&mut self, child: Node<K, V>) -> NodeAddress {
        let child_address = child.address;
        self.keys = child.keys;
        self.values = child.values;
        self.children = child.children;
        child_address
    }
}
