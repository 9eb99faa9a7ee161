//! Fuzz target for pack file parsing.
//!
//! Tests that the pack parser handles arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use skiff_storage::ObjectStore;

fuzz_target!(|data: &[u8]| {
    let dir = tempfile::TempDir::new().unwrap();
    let store = ObjectStore::init(&dir.path().join(".git")).unwrap();

    let mut parser = skiff_git::PackParser::new(data);
    let _ = parser.parse(&store);
});
