//! pagetree - a disk-backed B-tree index over pluggable page stores.
//!
//! # Architecture
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        pagetree                           │
//! ├───────────────────────────────────────────────────────────┤
//! │  ┌───────────────────────────────────────────────────┐   │
//! │  │               Index Layer (btree/)                 │   │
//! │  │   BTree (insert/get/remove, whole-tree latch)      │   │
//! │  │   Node (split/merge)   Cursor (fail-fast scan)     │   │
//! │  └───────────────────────────────────────────────────┘   │
//! │                           ↓                               │
//! │  ┌───────────────────────────────────────────────────┐   │
//! │  │            Store Boundary (store/)                 │   │
//! │  │   NodeStore trait  +  KeyValueCodec                │   │
//! │  │  ┌──────────────────┐  ┌───────────────────────┐  │   │
//! │  │  │ MemoryNodeStore  │  │    PagedNodeStore      │  │   │
//! │  │  │ (HashMap, tests) │  │ (4KB pages, CRC32)     │  │   │
//! │  │  └──────────────────┘  └───────────────────────┘  │   │
//! │  └───────────────────────────────────────────────────┘   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (NodeAddress, Error, config)
//! - [`btree`] - The index: tree orchestration, nodes, cursors
//! - [`store`] - The page-store boundary and its two implementations
//!
//! # Quick Start
//! ```no_run
//! use pagetree::{BTree, PagedNodeStore, U64StrCodec};
//!
//! let store = PagedNodeStore::open_or_create("index.db", U64StrCodec).unwrap();
//! let tree = BTree::new(store, 16).unwrap();
//!
//! tree.insert(42, "answer".to_string()).unwrap();
//! assert_eq!(tree.get(&42).unwrap().as_deref(), Some("answer"));
//!
//! for entry in tree.iter().unwrap() {
//!     let (key, value) = entry.unwrap();
//!     println!("{key} => {value}");
//! }
//! ```

pub mod btree;
pub mod common;
pub mod store;

// Re-export commonly used items at crate root for convenience
pub use common::config::{MIN_ORDER, PAGE_SIZE};
pub use common::{Error, NodeAddress, Result};

pub use btree::{BTree, Comparator, Cursor, NaturalOrder, Node, ReverseOrder};
pub use store::codec::{KeyValueCodec, U64StrCodec};
pub use store::{MemoryNodeStore, NodeStore, PagedNodeStore};
