//! Configuration constants for pagetree.

/// Size of a page in bytes (4KB).
///
/// This value is chosen to match:
/// - OS page size on most systems (4096 bytes)
/// - Common database page sizes (PostgreSQL uses 8KB, but 4KB is also standard)
///
/// Only [`PagedNodeStore`](crate::store::PagedNodeStore) interprets pages as
/// raw bytes; the tree itself never sees this constant.
pub const PAGE_SIZE: usize = 4096;

/// Smallest legal minimum degree for a B-tree.
///
/// With `t = 2` every node holds between 1 and 3 keys (a 2-3-4 tree).
/// Anything below that degenerates: a full node could not be split into
/// two non-empty halves around a median.
pub const MIN_ORDER: usize = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_min_order() {
        assert_eq!(MIN_ORDER, 2);
    }
}
