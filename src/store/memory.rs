//! In-memory node store.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::btree::Node;
use crate::common::{Error, NodeAddress, Result};

use super::NodeStore;

/// Address the root always lives at.
const ROOT_ADDRESS: u64 = 0;

/// A [`NodeStore`] that keeps every node in a `HashMap`.
///
/// No durability, no pages, no codec — nodes are stored as owned values
/// and cloned out on read. This is the store the crate's own unit tests,
/// property tests, and benchmarks run against; it is also handy as a
/// scratch index that never touches disk.
///
/// Addresses are a bump counter starting after the reserved root slot.
/// Freed addresses are not recycled; a map doesn't care about
/// fragmentation.
pub struct MemoryNodeStore<K, V> {
    inner: Mutex<Inner<K, V>>,
}

struct Inner<K, V> {
    nodes: HashMap<u64, Node<K, V>>,
    next_address: u64,
}

impl<K, V> MemoryNodeStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                nodes: HashMap::new(),
                next_address: ROOT_ADDRESS + 1,
            }),
        }
    }

    /// Number of live nodes. Useful for asserting that structural
    /// operations allocate and reclaim pages as expected.
    pub fn node_count(&self) -> usize {
        self.inner.lock().nodes.len()
    }
}

impl<K, V> Default for MemoryNodeStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> NodeStore<K, V> for MemoryNodeStore<K, V>
where
    K: Clone,
    V: Clone,
{
    fn root_address(&self) -> Result<NodeAddress> {
        Ok(NodeAddress::new(ROOT_ADDRESS))
    }

    fn read_node(&self, address: NodeAddress) -> Result<Node<K, V>> {
        self.inner
            .lock()
            .nodes
            .get(&address.0)
            .cloned()
            .ok_or(Error::NodeNotFound(address))
    }

    fn write_node(&self, node: &Node<K, V>) -> Result<()> {
        self.inner.lock().nodes.insert(node.address().0, node.clone());
        Ok(())
    }

    fn delete_node(&self, address: NodeAddress) -> Result<()> {
        match self.inner.lock().nodes.remove(&address.0) {
            Some(_) => Ok(()),
            None => Err(Error::NodeNotFound(address)),
        }
    }

    fn allocate_address(&self) -> Result<NodeAddress> {
        let mut inner = self.inner.lock();
        let address = inner.next_address;
        inner.next_address += 1;
        Ok(NodeAddress::new(address))
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(addr: u64, keys: &[u64]) -> Node<u64, u64> {
        let values = keys.to_vec();
        Node::from_parts(NodeAddress::new(addr), keys.to_vec(), values, Vec::new())
    }

    #[test]
    fn test_read_unallocated_fails() {
        let store: MemoryNodeStore<u64, u64> = MemoryNodeStore::new();
        assert!(matches!(
            store.read_node(NodeAddress::new(99)),
            Err(Error::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_write_then_read() {
        let store: MemoryNodeStore<u64, u64> = MemoryNodeStore::new();
        let addr = store.allocate_address().unwrap();
        store.write_node(&leaf(addr.0, &[1, 2, 3])).unwrap();

        let node = store.read_node(addr).unwrap();
        assert_eq!(node.keys(), &[1, 2, 3]);
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_delete() {
        let store: MemoryNodeStore<u64, u64> = MemoryNodeStore::new();
        let addr = store.allocate_address().unwrap();
        store.write_node(&leaf(addr.0, &[1])).unwrap();

        store.delete_node(addr).unwrap();
        assert!(matches!(
            store.read_node(addr),
            Err(Error::NodeNotFound(_))
        ));
        assert!(store.delete_node(addr).is_err());
    }

    #[test]
    fn test_allocations_are_unique() {
        let store: MemoryNodeStore<u64, u64> = MemoryNodeStore::new();
        let a = store.allocate_address().unwrap();
        let b = store.allocate_address().unwrap();
        assert_ne!(a, b);
        assert_ne!(a, store.root_address().unwrap());
    }
}
