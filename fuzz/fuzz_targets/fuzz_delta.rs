//! Fuzz target for delta instruction stream application.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the split between base and delta stream
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let (base, delta) = rest.split_at((split as usize).min(rest.len()));
    let _ = skiff_git::apply_delta(base, delta);
});
