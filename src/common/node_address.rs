//! Node address type.

use std::fmt;

/// Identifies a node page in a [`NodeStore`](crate::store::NodeStore).
///
/// Addresses are opaque to the tree: it receives them from
/// `allocate_address()` and hands them back to `read_node()` /
/// `write_node()` / `delete_node()` without interpreting them. The paged
/// store uses them as page numbers; other stores may use them however
/// they like.
///
/// An address is stable for the lifetime of the node it names. The root's
/// address in particular never changes — root growth and collapse swap
/// *content*, not identity.
///
/// # Example
/// ```
/// use pagetree::NodeAddress;
///
/// let addr = NodeAddress::new(42);
/// assert_eq!(addr.0, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddress(pub u64);

impl NodeAddress {
    /// Create a new NodeAddress.
    #[inline]
    pub fn new(id: u64) -> Self {
        NodeAddress(id)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}
