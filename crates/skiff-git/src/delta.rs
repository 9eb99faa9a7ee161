//! Delta instruction stream application.
//!
//! A delta payload carries two little-endian base-128 varints (expected
//! base size, result size) followed by copy and insert instructions.
//! Applying the stream against the base's bytes yields the resolved
//! object's bytes.

use crate::{GitError, Result};

/// Reads a little-endian base-128 varint.
fn read_varint(data: &[u8], pos: &mut usize) -> Result<usize> {
    let mut value: usize = 0;
    let mut shift: u32 = 0;

    loop {
        let byte = *data
            .get(*pos)
            .ok_or_else(|| GitError::InvalidPack("truncated varint".to_string()))?;
        *pos += 1;

        if shift >= usize::BITS {
            return Err(GitError::InvalidPack("varint overflow".to_string()));
        }
        value |= ((byte & 0x7f) as usize) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
}

/// Applies a delta instruction stream to a base object's bytes.
///
/// A copy instruction (`cmd & 0x80`) selects a range of the base; an
/// insert instruction (`cmd` in 1..=127) carries that many literal bytes.
/// Instruction outputs are concatenated in stream order. Opcode 0 is
/// reserved and rejected, as are out-of-bounds copies and streams whose
/// output disagrees with the declared result size.
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let mut pos = 0;

    let base_size = read_varint(delta, &mut pos)?;
    if base_size != base.len() {
        return Err(GitError::InvalidPack(format!(
            "delta expects base of {} bytes, got {}",
            base_size,
            base.len()
        )));
    }
    let result_size = read_varint(delta, &mut pos)?;

    let mut out = Vec::with_capacity(result_size);
    while pos < delta.len() {
        let cmd = delta[pos];
        pos += 1;

        if cmd & 0x80 != 0 {
            // Copy: offset from up to 4 bytes, size from up to 3,
            // selected by the low bits of the command byte.
            let mut offset: usize = 0;
            for i in 0..4 {
                if cmd & (1 << i) != 0 {
                    let byte = *delta.get(pos).ok_or_else(|| {
                        GitError::InvalidPack("truncated copy offset".to_string())
                    })?;
                    pos += 1;
                    offset |= (byte as usize) << (8 * i);
                }
            }

            let mut size: usize = 0;
            for i in 0..3 {
                if cmd & (0x10 << i) != 0 {
                    let byte = *delta.get(pos).ok_or_else(|| {
                        GitError::InvalidPack("truncated copy size".to_string())
                    })?;
                    pos += 1;
                    size |= (byte as usize) << (8 * i);
                }
            }
            if size == 0 {
                size = 0x10000;
            }

            let end = offset
                .checked_add(size)
                .filter(|&end| end <= base.len())
                .ok_or_else(|| {
                    GitError::InvalidPack(format!(
                        "copy of {} bytes at {} exceeds base of {}",
                        size,
                        offset,
                        base.len()
                    ))
                })?;
            out.extend_from_slice(&base[offset..end]);
        } else if cmd != 0 {
            // Insert: the command byte is the literal length.
            let len = cmd as usize;
            let end = pos + len;
            if end > delta.len() {
                return Err(GitError::InvalidPack("truncated insert data".to_string()));
            }
            out.extend_from_slice(&delta[pos..end]);
            pos = end;
        } else {
            return Err(GitError::InvalidPack("reserved delta opcode 0".to_string()));
        }
    }

    if out.len() != result_size {
        return Err(GitError::InvalidPack(format!(
            "delta produced {} bytes, declared {}",
            out.len(),
            result_size
        )));
    }
    Ok(out)
}



#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: arbitrary delta bytes never panic the applier.
        #[test]
        fn prop_apply_no_panic(
            base in prop::collection::vec(any::<u8>(), 0..256),
            delta in prop::collection::vec(any::<u8>(), 0..256),
        ) {
            let _ = apply_delta(&base, &delta);
        }
    }
}
