//! Ascending cursor with fail-fast concurrent-modification detection.
//!
//! Traversal is an explicit stack of `(node, next_index)` frames — no
//! recursion, no parent pointers. A frame says "the next thing to emit
//! from this node is the key at `next_index`"; everything below and to
//! the left of that position has already been emitted.

use std::sync::atomic::Ordering as AtomicOrdering;

use crate::common::{Error, NodeAddress, Result};
use crate::store::NodeStore;

use super::node::Node;
use super::{BTree, Comparator, NaturalOrder};

/// One suspended position inside a node.
struct Frame<K, V> {
    node: Node<K, V>,
    next_index: usize,
}

/// An ascending cursor over a [`BTree`].
///
/// # Fail-fast semantics
/// The cursor snapshots the tree's modification counter when it is
/// created. Every `try_next` call re-reads the live counter first; if the
/// tree was structurally mutated in between (any split, merge, key
/// insertion or removal — value overwrites don't count), the call fails
/// with [`Error::ConcurrentModification`] instead of returning an entry
/// that may no longer reflect the tree.
///
/// # Locking
/// Each `try_next` acquires the tree's read latch for that call only.
/// Mutating the tree *between* calls is therefore legal — it is detected,
/// not prevented.
///
/// The cursor also implements [`Iterator`] over `Result<(K, V)>`:
///
/// ```
/// use pagetree::{BTree, MemoryNodeStore};
///
/// let tree = BTree::new(MemoryNodeStore::new(), 2).unwrap();
/// tree.insert(2u64, "b".to_string()).unwrap();
/// tree.insert(1u64, "a".to_string()).unwrap();
///
/// let keys: Vec<u64> = tree.iter().unwrap().map(|e| e.unwrap().0).collect();
/// assert_eq!(keys, vec![1, 2]);
/// ```
pub struct Cursor<'t, K, V, S, C = NaturalOrder> {
    tree: &'t BTree<K, V, S, C>,
    stack: Vec<Frame<K, V>>,
    /// The tree's modification counter at cursor creation.
    expected_mod_count: u64,
}

impl<'t, K, V, S, C> Cursor<'t, K, V, S, C>
where
    K: Clone,
    V: Clone,
    S: NodeStore<K, V>,
    C: Comparator<K>,
{
    /// Cursor positioned before the smallest key.
    pub(crate) fn at_start(tree: &'t BTree<K, V, S, C>) -> Result<Self> {
        let _latch = tree.latch.read();
        let expected_mod_count = tree.mod_count.load(AtomicOrdering::Relaxed);

        let mut stack = Vec::new();
        push_leftmost_path(tree, &mut stack, tree.root)?;

        Ok(Self {
            tree,
            stack,
            expected_mod_count,
        })
    }

    /// Cursor positioned at `key`, or at the next larger key if `key` is
    /// absent. Exhausted if nothing is `>= key`.
    pub(crate) fn at_key(tree: &'t BTree<K, V, S, C>, key: &K) -> Result<Self> {
        let _latch = tree.latch.read();
        let expected_mod_count = tree.mod_count.load(AtomicOrdering::Relaxed);

        let mut stack = Vec::new();
        let mut node = tree.store.read_node(tree.root)?;
        loop {
            match node.search(key, &tree.cmp) {
                Ok(i) => {
                    stack.push(Frame {
                        node,
                        next_index: i,
                    });
                    break;
                }
                Err(i) => {
                    if node.is_leaf() {
                        if i < node.len() {
                            stack.push(Frame {
                                node,
                                next_index: i,
                            });
                        }
                        break;
                    }
                    // Keys at i.. are still pending for this node; the
                    // target range continues in child i.
                    let child = node.child_address(i);
                    if i < node.len() {
                        stack.push(Frame {
                            node,
                            next_index: i,
                        });
                    }
                    node = tree.store.read_node(child)?;
                }
            }
        }

        Ok(Self {
            tree,
            stack,
            expected_mod_count,
        })
    }

    /// Advance and return the next entry, or `Ok(None)` when exhausted.
    ///
    /// # Errors
    /// [`Error::ConcurrentModification`] if the tree was structurally
    /// mutated since the cursor was created; storage errors from child
    /// page reads.
    pub fn try_next(&mut self) -> Result<Option<(K, V)>> {
        let _latch = self.tree.latch.read();
        if self.tree.mod_count.load(AtomicOrdering::Relaxed) != self.expected_mod_count {
            return Err(Error::ConcurrentModification);
        }

        let Some(mut frame) = self.stack.pop() else {
            return Ok(None);
        };
        let index = frame.next_index;
        let entry = (
            frame.node.key(index).clone(),
            frame.node.value(index).clone(),
        );

        if frame.node.is_leaf() {
            if index + 1 < frame.node.len() {
                frame.next_index = index + 1;
                self.stack.push(frame);
            }
        } else {
            // The subtree between this key and the next comes first;
            // re-suspend the node (if keys remain) and dive.
            let child = frame.node.child_address(index + 1);
            if index + 1 < frame.node.len() {
                frame.next_index = index + 1;
                self.stack.push(frame);
            }
            push_leftmost_path(self.tree, &mut self.stack, child)?;
        }

        Ok(Some(entry))
    }

    /// Whether another `try_next` would yield an entry (assuming no
    /// concurrent mutation).
    pub fn has_next(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Removal through a cursor is not supported; delete through
    /// [`BTree::remove`] instead.
    ///
    /// # Errors
    /// Always [`Error::Unsupported`].
    pub fn remove(&mut self) -> Result<()> {
        Err(Error::Unsupported("Cursor::remove"))
    }
}

impl<K, V, S, C> Iterator for Cursor<'_, K, V, S, C>
where
    K: Clone,
    V: Clone,
    S: NodeStore<K, V>,
    C: Comparator<K>,
{
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.try_next().transpose()
    }
}

/// Descend from `address` to its leftmost leaf, suspending every node on
/// the way at index 0. An empty leaf (only the empty root qualifies)
/// contributes no frame.
fn push_leftmost_path<K, V, S, C>(
    tree: &BTree<K, V, S, C>,
    stack: &mut Vec<Frame<K, V>>,
    address: NodeAddress,
) -> Result<()>
where
    K: Clone,
    V: Clone,
    S: NodeStore<K, V>,
    C: Comparator<K>,
{
    let mut node = tree.store.read_node(address)?;
    loop {
        if node.is_leaf() {
            if !node.is_empty() {
                stack.push(Frame {
                    node,
                    next_index: 0,
                });
            }
            return Ok(());
        }
        let child = node.child_address(0);
        stack.push(Frame {
            node,
            next_index: 0,
        });
        node = tree.store.read_node(child)?;
    }
}
