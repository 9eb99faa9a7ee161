//! Building tree objects from a working directory.

use crate::{GitObject, ObjectId, ObjectStore, ObjectType, Result, StorageError, TreeEntry, GIT_DIR};
use crate::{MODE_DIR, MODE_FILE};
use std::fs;
use std::path::Path;

/// Serializes a directory into tree objects, bottom-up.
///
/// Each level returns an owned id; no buffer is shared across recursion.
/// Identical directory content always produces the identical tree id.
pub struct TreeBuilder<'a> {
    store: &'a ObjectStore,
}

impl<'a> TreeBuilder<'a> {
    /// Creates a builder writing into `store`.
    pub fn new(store: &'a ObjectStore) -> Self {
        Self { store }
    }

    /// Recursively writes blobs and trees for `dir`, returning the root
    /// tree id. The repository metadata directory is excluded.
    pub fn build(&self, dir: &Path) -> Result<ObjectId> {
        let mut entries = Vec::new();

        for dirent in fs::read_dir(dir)? {
            let dirent = dirent?;
            let name = dirent.file_name().into_string().map_err(|raw| {
                StorageError::InvalidObject(format!("non-utf8 file name: {:?}", raw))
            })?;
            if name == GIT_DIR {
                continue;
            }

            let path = dirent.path();
            if dirent.file_type()?.is_dir() {
                let id = self.build(&path)?;
                entries.push(TreeEntry::new(MODE_DIR, name, id));
            } else {
                let id = self.store.put_blob(fs::read(&path)?)?;
                entries.push(TreeEntry::new(MODE_FILE, name, id));
            }
        }

        let content = TreeEntry::encode_all(&entries);
        self.store.put(&GitObject::new(ObjectType::Tree, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup(populate: impl Fn(&Path)) -> (TempDir, ObjectStore, ObjectId) {
        let dir = TempDir::new().unwrap();
        populate(dir.path());
        let store = ObjectStore::init(&dir.path().join(GIT_DIR)).unwrap();
        let root = TreeBuilder::new(&store).build(dir.path()).unwrap();
        (dir, store, root)
    }

    #[test]
    fn test_build_flat_directory() {
        let (_dir, store, root) = setup(|p| {
            fs::write(p.join("a.txt"), b"aaa").unwrap();
            fs::write(p.join("b.txt"), b"bbb").unwrap();
        });

        let tree = store.get(&root).unwrap();
        assert_eq!(tree.object_type, ObjectType::Tree);

        let entries = TreeEntry::parse_all(&tree.data).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[0].mode, MODE_FILE);
        assert_eq!(entries[1].name, "b.txt");

        // Blobs are retrievable through the recorded ids
        assert_eq!(store.get(&entries[0].id).unwrap().data.as_ref(), b"aaa");
    }

    #[test]
    fn test_build_nested_directory() {
        let (_dir, store, root) = setup(|p| {
            fs::create_dir(p.join("src")).unwrap();
            fs::write(p.join("src").join("main.rs"), b"fn main() {}").unwrap();
            fs::write(p.join("README"), b"hi").unwrap();
        });

        let entries = TreeEntry::parse_all(&store.get(&root).unwrap().data).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "README");
        assert_eq!(entries[1].name, "src");
        assert_eq!(entries[1].mode, MODE_DIR);

        let sub = TreeEntry::parse_all(&store.get(&entries[1].id).unwrap().data).unwrap();
        assert_eq!(sub.len(), 1);
        assert_eq!(sub[0].name, "main.rs");
    }

    #[test]
    fn test_build_skips_git_dir() {
        let (_dir, store, root) = setup(|p| {
            fs::write(p.join("tracked"), b"yes").unwrap();
        });

        // The .git directory created for the store itself must not appear
        let entries = TreeEntry::parse_all(&store.get(&root).unwrap().data).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "tracked");
    }

    #[test]
    fn test_build_deterministic() {
        let populate = |p: &Path| {
            fs::create_dir(p.join("d")).unwrap();
            fs::write(p.join("d").join("x"), b"1").unwrap();
            fs::write(p.join("y"), b"2").unwrap();
        };
        let (_d1, _s1, root1) = setup(populate);
        let (_d2, _s2, root2) = setup(populate);
        assert_eq!(root1, root2);
    }

    #[cfg(unix)]
    #[test]
    fn test_build_rejects_non_utf8_name() {
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let name = std::ffi::OsStr::from_bytes(b"bad\xff\xfe");
        fs::write(dir.path().join(name), b"x").unwrap();

        let store = ObjectStore::init(&dir.path().join(GIT_DIR)).unwrap();
        assert!(matches!(
            TreeBuilder::new(&store).build(dir.path()),
            Err(StorageError::InvalidObject(_))
        ));
    }

    #[test]
    fn test_build_empty_directory() {
        let (_dir, store, root) = setup(|_| {});
        let tree = store.get(&root).unwrap();
        assert!(tree.data.is_empty());
    }
}
