//! Git protocol error types.

use thiserror::Error;

/// Errors that can occur during git protocol operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Invalid pack file format.
    #[error("invalid pack file: {0}")]
    InvalidPack(String),

    /// Pack trailer checksum disagrees with the pack contents.
    #[error("pack checksum mismatch")]
    ChecksumMismatch,

    /// Invalid pkt-line framing.
    #[error("invalid pkt-line: {0}")]
    InvalidPktLine(String),

    /// Protocol error (malformed advertisement, unsupported response
    /// encoding, unresolvable delta chain).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Network-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] skiff_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
