//! Common types and utilities shared across pagetree.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants
//! - Error types
//! - The [`NodeAddress`] page handle

pub mod config;
pub mod error;
mod node_address;

pub use error::{Error, Result};
pub use node_address::NodeAddress;
