//! Page stores - where nodes live when they are not in memory.
//!
//! The tree never touches bytes or files itself. Everything it needs from
//! storage is expressed by the [`NodeStore`] trait: read, write, allocate,
//! delete, flush. Two implementations ship with the crate:
//! - [`MemoryNodeStore`] - HashMap-backed, for tests and benchmarks
//! - [`PagedNodeStore`] - a single file of checksummed 4KB pages
//!
//! Durability and crash-atomicity are entirely the store's problem; the
//! tree performs multi-page mutations (splits, merges) with no rollback.

mod memory;
mod paged;

pub mod codec;

pub use memory::MemoryNodeStore;
pub use paged::PagedNodeStore;

use crate::btree::Node;
use crate::common::{NodeAddress, Result};

/// The storage capability a [`BTree`](crate::btree::BTree) is built over.
///
/// All methods take `&self`; implementations use interior mutability
/// (a `Mutex` around file or map state) so the tree can serialize access
/// with its own whole-tree latch without double-locking headaches.
///
/// # Contract
/// - `read_node` must fail with [`Error::NodeNotFound`] for an address
///   that was never allocated or has been deleted.
/// - `write_node` persists the page before returning. The tree calls it
///   after every structural mutation of that node.
/// - Addresses returned by `allocate_address` are unique among live
///   nodes. Recycling freed addresses is allowed.
/// - `root_address` is fixed for the lifetime of the store: the tree
///   relies on the root's identity never changing.
///
/// [`Error::NodeNotFound`]: crate::common::Error::NodeNotFound
pub trait NodeStore<K, V> {
    /// The address the root node lives at (or will live at, for a store
    /// that has never held a tree).
    fn root_address(&self) -> Result<NodeAddress>;

    /// Read the node at `address`.
    ///
    /// # Errors
    /// [`Error::NodeNotFound`] if the address was never allocated;
    /// storage or codec errors otherwise.
    ///
    /// [`Error::NodeNotFound`]: crate::common::Error::NodeNotFound
    fn read_node(&self, address: NodeAddress) -> Result<Node<K, V>>;

    /// Persist `node` at its own address.
    fn write_node(&self, node: &Node<K, V>) -> Result<()>;

    /// Reclaim the page at `address`. Reading it afterwards fails with
    /// `NodeNotFound` until the address is handed out again.
    fn delete_node(&self, address: NodeAddress) -> Result<()>;

    /// Hand out a fresh (or recycled) address for a new node.
    fn allocate_address(&self) -> Result<NodeAddress>;

    /// Force pending modifications to durable storage.
    fn flush(&self) -> Result<()>;
}

/// A shared reference to a store is itself a store.
///
/// Lets several trees (or a tree and a test harness) share one store
/// without wrapping it in `Arc` first.
impl<K, V, T: NodeStore<K, V>> NodeStore<K, V> for &T {
    fn root_address(&self) -> Result<NodeAddress> {
        (**self).root_address()
    }

    fn read_node(&self, address: NodeAddress) -> Result<Node<K, V>> {
        (**self).read_node(address)
    }

    fn write_node(&self, node: &Node<K, V>) -> Result<()> {
        (**self).write_node(node)
    }

    fn delete_node(&self, address: NodeAddress) -> Result<()> {
        (**self).delete_node(address)
    }

    fn allocate_address(&self) -> Result<NodeAddress> {
        (**self).allocate_address()
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}
