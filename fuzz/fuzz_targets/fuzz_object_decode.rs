//! Fuzz target for canonical object decoding.

#![no_main]

use libfuzzer_sys::fuzz_target;
use skiff_storage::GitObject;

fuzz_target!(|data: &[u8]| {
    let _ = GitObject::decode(data);
});
