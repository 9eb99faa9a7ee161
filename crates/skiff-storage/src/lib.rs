//! Content-addressed object storage for Skiff.
//!
//! This crate provides the canonical object encoding, a loose-object
//! filesystem store, tree serialization, and reference management.

mod error;
mod object;
mod refs;
mod store;
mod tree;
mod worktree;

pub use error::StorageError;
pub use object::{GitObject, ObjectId, ObjectType};
pub use refs::{RefStore, Reference};
pub use store::{ObjectStore, Repository, DEFAULT_BRANCH, GIT_DIR};
pub use tree::{TreeEntry, MODE_DIR, MODE_FILE};
pub use worktree::TreeBuilder;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
