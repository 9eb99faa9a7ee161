//! Pack file container parsing and building.
//!
//! A pack is `"PACK"`, a big-endian u32 version and object count, a run of
//! object records (varint header, zlib payload, delta records additionally
//! carrying a base offset or base id), and a 20-byte SHA-1 trailer over
//! everything preceding it.

use crate::delta::apply_delta;
use crate::{GitError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};
use skiff_storage::{GitObject, ObjectId, ObjectStore, ObjectType};
use std::collections::HashMap;
use std::io::{Read, Write};

/// Magic bytes at the start of a pack file.
const PACK_SIGNATURE: &[u8; 4] = b"PACK";
/// Pack file version we support.
const PACK_VERSION: u32 = 2;

/// Pack record type code for an offset delta.
const OFS_DELTA: u8 = 6;
/// Pack record type code for a reference delta.
const REF_DELTA: u8 = 7;

/// Builds a pack file from a set of objects (no delta compression).
pub struct PackBuilder {
    objects: Vec<GitObject>,
}

impl PackBuilder {
    /// Creates a new pack builder.
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    /// Adds an object to the pack.
    pub fn add(&mut self, object: GitObject) {
        self.objects.push(object);
    }

    /// Builds the pack file bytes.
    pub fn build(self) -> Result<Vec<u8>> {
        let mut pack = Vec::new();

        pack.extend_from_slice(PACK_SIGNATURE);
        pack.extend_from_slice(&PACK_VERSION.to_be_bytes());
        pack.extend_from_slice(&(self.objects.len() as u32).to_be_bytes());

        for object in &self.objects {
            Self::write_object(&mut pack, object)?;
        }

        let mut hasher = Sha1::new();
        hasher.update(&pack);
        let checksum = hasher.finalize();
        pack.extend_from_slice(&checksum);

        Ok(pack)
    }

    /// Writes a single object record: varint header, then zlib payload.
    fn write_object(pack: &mut Vec<u8>, object: &GitObject) -> Result<()> {
        let code = object.object_type.pack_type();
        let size = object.data.len();

        // First byte: (MSB=more) (3 bits type) (4 bits size)
        let mut first = (code << 4) | ((size & 0x0f) as u8);
        let mut remaining = size >> 4;
        if remaining > 0 {
            first |= 0x80;
        }
        pack.push(first);

        while remaining > 0 {
            let mut byte = (remaining & 0x7f) as u8;
            remaining >>= 7;
            if remaining > 0 {
                byte |= 0x80;
            }
            pack.push(byte);
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&object.data)
            .map_err(|e| GitError::InvalidPack(e.to_string()))?;
        let compressed = encoder
            .finish()
            .map_err(|e| GitError::InvalidPack(e.to_string()))?;
        pack.extend_from_slice(&compressed);

        Ok(())
    }
}

impl Default for PackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A delta record whose base was not available when it was decoded.
struct PendingDelta {
    /// Start offset of the delta's own record.
    offset: usize,
    base: BaseRef,
    payload: Vec<u8>,
}

enum BaseRef {
    /// Base starts at this offset within the same pack.
    Offset(usize),
    /// Base identified by object id; may live later in the pack or only
    /// in the local store.
    Id(ObjectId),
}

/// Parses a pack file, resolving deltas and persisting every object.
pub struct PackParser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PackParser<'a> {
    /// Creates a new pack parser over a fully buffered pack.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Parses the pack and stores all objects, returning their ids in
    /// resolution order.
    pub fn parse(&mut self, store: &ObjectStore) -> Result<Vec<ObjectId>> {
        // Header (12) plus trailer (20) is the minimum well-formed pack.
        if self.data.len() < 32 {
            return Err(GitError::InvalidPack("pack too small".to_string()));
        }

        if &self.data[0..4] != PACK_SIGNATURE {
            return Err(GitError::InvalidPack("invalid signature".to_string()));
        }

        let version = u32::from_be_bytes([self.data[4], self.data[5], self.data[6], self.data[7]]);
        if version != PACK_VERSION {
            return Err(GitError::InvalidPack(format!(
                "unsupported version: {}",
                version
            )));
        }

        let object_count =
            u32::from_be_bytes([self.data[8], self.data[9], self.data[10], self.data[11]]) as usize;

        let trailer_start = self.data.len() - 20;
        let mut hasher = Sha1::new();
        hasher.update(&self.data[..trailer_start]);
        if hasher.finalize().as_slice() != &self.data[trailer_start..] {
            return Err(GitError::ChecksumMismatch);
        }

        self.pos = 12;

        let mut ids = Vec::with_capacity(object_count);
        let mut by_offset: HashMap<usize, ObjectId> = HashMap::new();
        let mut pending: Vec<PendingDelta> = Vec::new();

        for _ in 0..object_count {
            let offset = self.pos;
            let (code, size) = self.read_object_header()?;

            match code {
                1..=4 => {
                    let object_type = ObjectType::from_pack_type(code)?;
                    let data = self.inflate(size)?;
                    let object = GitObject::new(object_type, data);
                    store.put(&object)?;
                    by_offset.insert(offset, object.id);
                    ids.push(object.id);
                }
                OFS_DELTA => {
                    let distance = self.read_base_distance()?;
                    let base_offset = offset.checked_sub(distance).ok_or_else(|| {
                        GitError::InvalidPack(format!(
                            "base offset {} before start of pack",
                            distance
                        ))
                    })?;
                    let payload = self.inflate(size)?;
                    pending.push(PendingDelta {
                        offset,
                        base: BaseRef::Offset(base_offset),
                        payload,
                    });
                }
                REF_DELTA => {
                    let id = self.read_base_id()?;
                    let payload = self.inflate(size)?;
                    pending.push(PendingDelta {
                        offset,
                        base: BaseRef::Id(id),
                        payload,
                    });
                }
                other => {
                    return Err(GitError::InvalidPack(format!(
                        "unknown object type: {}",
                        other
                    )));
                }
            }
        }

        if self.pos != trailer_start {
            return Err(GitError::InvalidPack(format!(
                "{} unconsumed bytes before trailer",
                trailer_start - self.pos
            )));
        }

        self.resolve_pending(store, pending, &mut by_offset, &mut ids)?;

        tracing::debug!(objects = ids.len(), "parsed pack");
        Ok(ids)
    }

    /// Resolves deferred deltas in passes.
    ///
    /// OFS bases always precede their delta, so they resolve in the first
    /// pass unless the base is itself a deferred delta. REF bases may
    /// appear later in the pack or only in the local store; each pass
    /// retries whatever became resolvable. A pass without progress means a
    /// cyclic or missing-base chain.
    fn resolve_pending(
        &self,
        store: &ObjectStore,
        mut pending: Vec<PendingDelta>,
        by_offset: &mut HashMap<usize, ObjectId>,
        ids: &mut Vec<ObjectId>,
    ) -> Result<()> {
        while !pending.is_empty() {
            let unresolved = std::mem::take(&mut pending);
            let before = unresolved.len();

            for delta in unresolved {
                let base_id = match &delta.base {
                    BaseRef::Offset(off) => by_offset.get(off).copied(),
                    BaseRef::Id(id) if store.contains(id) => Some(*id),
                    BaseRef::Id(_) => None,
                };

                match base_id {
                    Some(base_id) => {
                        let base = store.get(&base_id)?;
                        let bytes = apply_delta(&base.data, &delta.payload)?;
                        // Kind is inherited from the non-delta ancestor.
                        let object = GitObject::new(base.object_type, bytes);
                        store.put(&object)?;
                        by_offset.insert(delta.offset, object.id);
                        ids.push(object.id);
                    }
                    None => pending.push(delta),
                }
            }

            if pending.len() == before {
                return Err(GitError::Protocol(
                    "unresolvable delta chain in pack".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn byte(&mut self) -> Result<u8> {
        // Object records never extend into the 20-byte trailer.
        if self.pos >= self.data.len() - 20 {
            return Err(GitError::InvalidPack("unexpected end of pack".to_string()));
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Reads a record header: 3 type bits and a little-endian base-128
    /// size whose first 4 bits ride in the first byte.
    fn read_object_header(&mut self) -> Result<(u8, usize)> {
        let first = self.byte()?;
        let code = (first >> 4) & 0x07;
        let mut size = (first & 0x0f) as usize;
        let mut shift: u32 = 4;

        let mut byte = first;
        while byte & 0x80 != 0 {
            byte = self.byte()?;
            if shift >= usize::BITS {
                return Err(GitError::InvalidPack("object size overflow".to_string()));
            }
            size |= ((byte & 0x7f) as usize) << shift;
            shift += 7;
        }

        Ok((code, size))
    }

    /// Reads an OFS_DELTA base distance: big-endian base-128 with the
    /// pack format's +1 bias on each continuation.
    fn read_base_distance(&mut self) -> Result<usize> {
        let mut byte = self.byte()?;
        let mut distance = (byte & 0x7f) as usize;

        while byte & 0x80 != 0 {
            byte = self.byte()?;
            distance = distance
                .checked_add(1)
                .and_then(|d| d.checked_mul(128))
                .ok_or_else(|| GitError::InvalidPack("base offset overflow".to_string()))?
                + (byte & 0x7f) as usize;
        }

        Ok(distance)
    }

    /// Reads a REF_DELTA base id (20 raw bytes).
    fn read_base_id(&mut self) -> Result<ObjectId> {
        let end = self.pos + 20;
        if end > self.data.len() - 20 {
            return Err(GitError::InvalidPack("truncated base id".to_string()));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(ObjectId::from_bytes(bytes))
    }

    /// Inflates a payload that must expand to exactly `size` bytes,
    /// advancing past the compressed stream.
    fn inflate(&mut self, size: usize) -> Result<Vec<u8>> {
        let end = self.data.len() - 20;
        if self.pos > end {
            return Err(GitError::InvalidPack("unexpected end of pack".to_string()));
        }

        let mut decoder = ZlibDecoder::new(&self.data[self.pos..end]);
        let mut out = vec![0u8; size];
        decoder
            .read_exact(&mut out)
            .map_err(|e| GitError::InvalidPack(format!("decompression failed: {}", e)))?;

        // Drive the decoder to stream end so total_in covers the zlib
        // trailer, and reject payloads longer than declared.
        let mut probe = [0u8; 1];
        let extra = decoder
            .read(&mut probe)
            .map_err(|e| GitError::InvalidPack(format!("decompression failed: {}", e)))?;
        if extra != 0 {
            return Err(GitError::InvalidPack(
                "payload exceeds declared size".to_string(),
            ));
        }

        self.pos += decoder.total_in() as usize;
        Ok(out)
    }
}
