//! Git wire protocol for Skiff.
//!
//! This crate implements the pack file container (including delta
//! resolution), pkt-line framing, and the client side of the smart HTTP
//! protocol, composed into a `clone` operation.

mod client;
mod clone;
mod delta;
mod error;
mod pack;
mod pktline;

pub use client::{build_fetch_request, parse_ref_advertisement, HttpClient, RemoteRef};
pub use clone::clone;
pub use delta::apply_delta;
pub use error::GitError;
pub use pack::{PackBuilder, PackParser};
pub use pktline::{PktLine, PktLineReader, PktLineWriter, MAX_DATA_LEN};

/// Result type for git protocol operations.
pub type Result<T> = std::result::Result<T, GitError>;
