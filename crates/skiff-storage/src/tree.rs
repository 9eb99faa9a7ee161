//! Tree object serialization.
//!
//! A tree's content is the concatenation of entries encoded as
//! `"<octal-mode> <name>\0<20 raw hash bytes>"`, sorted byte-wise by name.

use crate::{ObjectId, Result, StorageError};

/// Mode for regular files.
pub const MODE_FILE: u32 = 0o100644;
/// Mode for directories.
pub const MODE_DIR: u32 = 0o040000;

/// A single entry in a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// File mode (100644 for files, 40000 for directories).
    pub mode: u32,
    /// Entry name (a single path component).
    pub name: String,
    /// Object the entry points to.
    pub id: ObjectId,
}

impl TreeEntry {
    /// Creates a new tree entry.
    pub fn new(mode: u32, name: impl Into<String>, id: ObjectId) -> Self {
        Self {
            mode,
            name: name.into(),
            id,
        }
    }

    /// Returns true if this entry refers to a directory.
    pub fn is_dir(&self) -> bool {
        self.mode == MODE_DIR
    }

    /// Encodes a list of entries into tree object content.
    ///
    /// Entries are sorted byte-wise by name; the canonical form admits no
    /// other ordering, so the encoder sorts unconditionally.
    pub fn encode_all(entries: &[TreeEntry]) -> Vec<u8> {
        let mut sorted: Vec<&TreeEntry> = entries.iter().collect();
        sorted.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

        let mut out = Vec::new();
        for entry in sorted {
            out.extend_from_slice(format!("{:o} {}\0", entry.mode, entry.name).as_bytes());
            out.extend_from_slice(entry.id.as_bytes());
        }
        out
    }

    /// Parses tree object content into entries.
    pub fn parse_all(mut content: &[u8]) -> Result<Vec<TreeEntry>> {
        let mut entries = Vec::new();

        while !content.is_empty() {
            let space = content
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| StorageError::InvalidObject("tree entry missing mode".into()))?;
            let mode_str = std::str::from_utf8(&content[..space])
                .map_err(|_| StorageError::InvalidObject("non-utf8 tree mode".into()))?;
            let mode = u32::from_str_radix(mode_str, 8)
                .map_err(|_| StorageError::InvalidObject(format!("invalid mode: {}", mode_str)))?;
            content = &content[space + 1..];

            let null = content
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| StorageError::InvalidObject("tree entry missing name".into()))?;
            let name = std::str::from_utf8(&content[..null])
                .map_err(|_| StorageError::InvalidObject("non-utf8 tree name".into()))?
                .to_string();
            content = &content[null + 1..];

            if content.len() < 20 {
                return Err(StorageError::InvalidObject(
                    "tree entry truncated hash".into(),
                ));
            }
            let mut hash = [0u8; 20];
            hash.copy_from_slice(&content[..20]);
            content = &content[20..];

            entries.push(TreeEntry::new(mode, name, ObjectId::from_bytes(hash)));
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(mode: u32, name: &str, fill: u8) -> TreeEntry {
        TreeEntry::new(mode, name, ObjectId::from_bytes([fill; 20]))
    }

    #[test]
    fn test_encode_parse_roundtrip() {
        let entries = vec![
            entry(MODE_FILE, "README.md", 1),
            entry(MODE_DIR, "src", 2),
            entry(MODE_FILE, "zzz.txt", 3),
        ];

        let encoded = TreeEntry::encode_all(&entries);
        let parsed = TreeEntry::parse_all(&encoded).unwrap();
        assert_eq!(parsed, entries);
    }

    #[test]
    fn test_encode_sorts_by_name() {
        let entries = vec![
            entry(MODE_FILE, "beta", 1),
            entry(MODE_FILE, "alpha", 2),
        ];

        let encoded = TreeEntry::encode_all(&entries);
        let parsed = TreeEntry::parse_all(&encoded).unwrap();
        assert_eq!(parsed[0].name, "alpha");
        assert_eq!(parsed[1].name, "beta");
    }

    #[test]
    fn test_encode_wire_format() {
        let id = ObjectId::from_bytes([0xaa; 20]);
        let encoded = TreeEntry::encode_all(&[TreeEntry::new(MODE_FILE, "f", id)]);

        let mut expected = b"100644 f\0".to_vec();
        expected.extend_from_slice(&[0xaa; 20]);
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_dir_mode_has_no_leading_zero() {
        let id = ObjectId::from_bytes([0; 20]);
        let encoded = TreeEntry::encode_all(&[TreeEntry::new(MODE_DIR, "d", id)]);
        assert!(encoded.starts_with(b"40000 d\0"));
    }

    #[test]
    fn test_parse_empty_tree() {
        assert!(TreeEntry::parse_all(b"").unwrap().is_empty());
    }

    #[test]
    fn test_parse_truncated() {
        let entries = vec![entry(MODE_FILE, "file", 7)];
        let encoded = TreeEntry::encode_all(&entries);

        assert!(TreeEntry::parse_all(&encoded[..encoded.len() - 1]).is_err());
        assert!(TreeEntry::parse_all(b"100644 noterm").is_err());
        assert!(TreeEntry::parse_all(b"nomode").is_err());
    }

    #[test]
    fn test_is_dir() {
        assert!(entry(MODE_DIR, "d", 0).is_dir());
        assert!(!entry(MODE_FILE, "f", 0).is_dir());
    }
}
