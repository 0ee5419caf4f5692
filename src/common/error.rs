//! Error types for pagetree.

use thiserror::Error;

use crate::common::NodeAddress;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
/// This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in pagetree.
///
/// One error type for the whole crate keeps handling consistent at the
/// seams: the store boundary, the tree, and the cursor all speak it.
///
/// Expected conditions (absent key, concurrent modification) are modeled
/// as ordinary values (`Ok(None)`, `Ok(false)`) or as the dedicated
/// variants below. "Impossible" states — invariants the tree maintains by
/// construction — are `debug_assert!`s, not variants; a recoverable branch
/// for a state that cannot occur would only hide bugs.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying page store.
    ///
    /// Propagated unchanged. A failure in the middle of a split or merge
    /// can leave some but not all touched pages written; there is no
    /// rollback at this layer.
    #[error("storage failure: {0}")]
    Storage(#[from] std::io::Error),

    /// The address names a page that was never allocated (or was freed).
    ///
    /// The tree maps this to "build a fresh empty root" when it occurs at
    /// the root address during construction, and treats it as a hard
    /// failure anywhere else.
    #[error("{0} not found in store")]
    NodeNotFound(NodeAddress),

    /// A page read back from disk failed its CRC32 check.
    #[error("checksum mismatch reading {0}")]
    ChecksumMismatch(NodeAddress),

    /// A key or value could not be encoded/decoded, or a node does not
    /// fit in a page.
    #[error("codec error: {0}")]
    Codec(String),

    /// A caller-supplied argument is out of range (e.g. order < 2).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An ordering invariant was found violated by [`BTree::check`].
    ///
    /// [`BTree::check`]: crate::btree::BTree::check
    #[error("tree invariant violated: {0}")]
    InvalidTreeInvariant(String),

    /// The tree was structurally modified while a cursor was open.
    ///
    /// Raised by `Cursor::try_next` instead of returning an entry that may
    /// no longer reflect the tree.
    #[error("tree modified during iteration")]
    ConcurrentModification,

    /// The operation is not supported (e.g. `Cursor::remove`).
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NodeNotFound(NodeAddress::new(42));
        assert_eq!(format!("{}", err), "Node(42) not found in store");

        let err = Error::ConcurrentModification;
        assert_eq!(format!("{}", err), "tree modified during iteration");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Storage(_) => {}
            _ => panic!("Expected Storage error"),
        }
    }

    #[test]
    fn test_storage_error_has_source() {
        use std::error::Error as _;

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err: Error = io_err.into();
        assert!(err.source().is_some());

        assert!(Error::ConcurrentModification.source().is_none());
    }
}
