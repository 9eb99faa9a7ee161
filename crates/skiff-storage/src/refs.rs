//! Reference management over loose ref files.

use crate::{ObjectId, Result, StorageError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A git reference (branch, tag, or symbolic ref).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Direct reference to an object.
    Direct(ObjectId),
    /// Symbolic reference (e.g., HEAD -> refs/heads/master).
    Symbolic(String),
}

impl Reference {
    /// Returns the object ID if this is a direct reference.
    pub fn as_direct(&self) -> Option<ObjectId> {
        match self {
            Self::Direct(id) => Some(*id),
            Self::Symbolic(_) => None,
        }
    }
}

/// Reference store backed by loose files under the git directory.
///
/// A direct ref file holds `"<40-hex>\n"`, a symbolic one
/// `"ref: <target>\n"`. Ref names are paths relative to the git dir
/// (`HEAD`, `refs/heads/master`, ...).
#[derive(Debug, Clone)]
pub struct RefStore {
    git_dir: PathBuf,
}

impl RefStore {
    /// Opens the ref store of an existing git directory.
    pub fn open(git_dir: &Path) -> Self {
        Self {
            git_dir: git_dir.to_path_buf(),
        }
    }

    /// Creates the refs directory and opens the store.
    pub fn init(git_dir: &Path) -> Result<Self> {
        fs::create_dir_all(git_dir.join("refs"))?;
        Ok(Self::open(git_dir))
    }

    fn ref_path(&self, name: &str) -> Result<PathBuf> {
        // Names come from remote advertisements too; every component must
        // stay below the git dir.
        let safe = !name.is_empty()
            && name
                .split('/')
                .all(|c| !c.is_empty() && c != "." && c != ".." && !c.contains('\\'));
        if !safe {
            return Err(StorageError::InvalidRef(format!(
                "unsafe ref name: {:?}",
                name
            )));
        }
        Ok(self.git_dir.join(name))
    }

    /// Gets a reference by name.
    pub fn get(&self, name: &str) -> Result<Reference> {
        let raw = match fs::read_to_string(self.ref_path(name)?) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::RefNotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let line = raw.trim_end();
        if let Some(target) = line.strip_prefix("ref: ") {
            Ok(Reference::Symbolic(target.to_string()))
        } else {
            let id = ObjectId::from_hex(line)
                .map_err(|_| StorageError::InvalidRef(format!("{}: {:?}", name, line)))?;
            Ok(Reference::Direct(id))
        }
    }

    /// Sets a reference to point to an object.
    pub fn set(&self, name: &str, target: ObjectId) -> Result<()> {
        self.write(name, &format!("{}\n", target.to_hex()))
    }

    /// Sets a symbolic reference.
    pub fn set_symbolic(&self, name: &str, target: &str) -> Result<()> {
        self.write(name, &format!("ref: {}\n", target))
    }

    fn write(&self, name: &str, content: &str) -> Result<()> {
        let path = self.ref_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        tracing::trace!(name, "wrote ref");
        Ok(())
    }

    /// Resolves a ref to an object id, following one level of symbolic
    /// indirection (deeper nesting is not supported).
    pub fn resolve(&self, name: &str) -> Result<ObjectId> {
        match self.get(name)? {
            Reference::Direct(id) => Ok(id),
            Reference::Symbolic(target) => match self.get(&target)? {
                Reference::Direct(id) => Ok(id),
                Reference::Symbolic(_) => Err(StorageError::InvalidRef(
                    "deeply nested symbolic refs not supported".to_string(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_refs() -> (TempDir, RefStore) {
        let dir = TempDir::new().unwrap();
        let refs = RefStore::init(dir.path()).unwrap();
        (dir, refs)
    }

    #[test]
    fn test_set_get_direct() {
        let (_dir, refs) = temp_refs();
        let id = ObjectId::from_bytes([7u8; 20]);

        refs.set("refs/heads/master", id).unwrap();
        assert_eq!(
            refs.get("refs/heads/master").unwrap(),
            Reference::Direct(id)
        );
    }

    #[test]
    fn test_set_get_symbolic() {
        let (_dir, refs) = temp_refs();

        refs.set_symbolic("HEAD", "refs/heads/master").unwrap();
        assert_eq!(
            refs.get("HEAD").unwrap(),
            Reference::Symbolic("refs/heads/master".to_string())
        );
    }

    #[test]
    fn test_resolve_through_head() {
        let (_dir, refs) = temp_refs();
        let id = ObjectId::from_bytes([9u8; 20]);

        refs.set_symbolic("HEAD", "refs/heads/master").unwrap();
        refs.set("refs/heads/master", id).unwrap();
        assert_eq!(refs.resolve("HEAD").unwrap(), id);
    }

    #[test]
    fn test_resolve_unborn_head() {
        let (_dir, refs) = temp_refs();
        refs.set_symbolic("HEAD", "refs/heads/master").unwrap();

        assert!(matches!(
            refs.resolve("HEAD"),
            Err(StorageError::RefNotFound(_))
        ));
    }

    #[test]
    fn test_get_missing() {
        let (_dir, refs) = temp_refs();
        assert!(matches!(
            refs.get("refs/heads/nope"),
            Err(StorageError::RefNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_ref_content() {
        let (dir, refs) = temp_refs();
        std::fs::write(dir.path().join("HEAD"), "gibberish\n").unwrap();

        assert!(matches!(
            refs.get("HEAD"),
            Err(StorageError::InvalidRef(_))
        ));
    }

    #[test]
    fn test_unsafe_names_rejected() {
        let (dir, refs) = temp_refs();
        let id = ObjectId::from_bytes([3u8; 20]);

        for name in [
            "../../outside/pwned",
            "refs/../../outside/pwned",
            "/etc/pwned",
            "refs//x",
            "refs/./x",
            "",
        ] {
            assert!(
                matches!(refs.set(name, id), Err(StorageError::InvalidRef(_))),
                "accepted {:?}",
                name
            );
            assert!(matches!(
                refs.get(name),
                Err(StorageError::InvalidRef(_))
            ));
        }

        // No rejected write left anything behind
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("refs")]);
    }

    #[test]
    fn test_overwrite_ref() {
        let (_dir, refs) = temp_refs();
        let a = ObjectId::from_bytes([1u8; 20]);
        let b = ObjectId::from_bytes([2u8; 20]);

        refs.set("refs/heads/master", a).unwrap();
        refs.set("refs/heads/master", b).unwrap();
        assert_eq!(refs.resolve("refs/heads/master").unwrap(), b);
    }
}
