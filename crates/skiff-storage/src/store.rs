//! Loose-object store and repository management.

use crate::{GitObject, ObjectId, RefStore, Result, StorageError};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Name of the repository metadata directory.
pub const GIT_DIR: &str = ".git";

/// The default branch ref written at init time.
pub const DEFAULT_BRANCH: &str = "refs/heads/master";

/// Content-addressed loose-object store.
///
/// Objects live at `objects/<first 2 hex chars>/<remaining 38>` under the
/// git directory, zlib-compressed in their canonical encoding.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    objects_dir: PathBuf,
}

impl ObjectStore {
    /// Opens the object store of an existing git directory.
    pub fn open(git_dir: &Path) -> Self {
        Self {
            objects_dir: git_dir.join("objects"),
        }
    }

    /// Creates the object directory and opens the store.
    pub fn init(git_dir: &Path) -> Result<Self> {
        let store = Self::open(git_dir);
        fs::create_dir_all(&store.objects_dir)?;
        Ok(store)
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.objects_dir.join(&hex[..2]).join(&hex[2..])
    }

    /// Checks if an object exists.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.object_path(id).exists()
    }

    /// Stores an object and returns its ID.
    ///
    /// Writes are idempotent: if an object with this id already exists the
    /// call returns without touching the file. Identity is content-derived,
    /// so an existing file is by construction the same object.
    pub fn put(&self, object: &GitObject) -> Result<ObjectId> {
        let path = self.object_path(&object.id);
        if path.exists() {
            return Ok(object.id);
        }

        // A concurrent writer creating the same fan-out directory is fine.
        if let Some(parent) = path.parent() {
            match fs::create_dir_all(parent) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&object.encode())?;
        let compressed = encoder.finish()?;

        fs::write(&path, compressed)?;
        tracing::trace!(id = %object.id, kind = object.object_type.as_str(), "stored object");
        Ok(object.id)
    }

    /// Retrieves an object by ID.
    pub fn get(&self, id: &ObjectId) -> Result<GitObject> {
        let compressed = match fs::read(self.object_path(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id.to_hex()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut decoder = ZlibDecoder::new(compressed.as_slice());
        let mut encoded = Vec::new();
        decoder
            .read_to_end(&mut encoded)
            .map_err(|e| StorageError::InvalidObject(format!("inflate failed: {}", e)))?;

        let object = GitObject::decode(&encoded)?;
        if object.id != *id {
            return Err(StorageError::InvalidObject(format!(
                "object {} hashes to {}",
                id, object.id
            )));
        }
        Ok(object)
    }

    /// Stores a blob and returns its ID.
    pub fn put_blob(&self, content: impl Into<bytes::Bytes>) -> Result<ObjectId> {
        self.put(&GitObject::blob(content))
    }
}

/// A git repository: a git directory holding objects and references.
#[derive(Debug)]
pub struct Repository {
    /// Path to the git directory.
    pub git_dir: PathBuf,
    /// Object store.
    pub objects: ObjectStore,
    /// Reference store.
    pub refs: RefStore,
}

impl Repository {
    /// Initializes a fresh repository at `work_dir`.
    ///
    /// Creates `.git/{objects,refs}` and points HEAD at the default branch.
    pub fn init(work_dir: &Path) -> Result<Self> {
        fs::create_dir_all(work_dir)?;
        let git_dir = work_dir.join(GIT_DIR);

        let objects = ObjectStore::init(&git_dir)?;
        let refs = RefStore::init(&git_dir)?;
        refs.set_symbolic("HEAD", DEFAULT_BRANCH)?;

        tracing::debug!(path = %git_dir.display(), "initialized repository");
        Ok(Self {
            git_dir,
            objects,
            refs,
        })
    }

    /// Opens an existing repository whose working directory is `work_dir`.
    pub fn open(work_dir: &Path) -> Result<Self> {
        let git_dir = work_dir.join(GIT_DIR);
        if !git_dir.is_dir() {
            return Err(StorageError::NotFound(format!(
                "no {} directory under {}",
                GIT_DIR,
                work_dir.display()
            )));
        }
        Ok(Self {
            objects: ObjectStore::open(&git_dir),
            refs: RefStore::open(&git_dir),
            git_dir,
        })
    }

    /// Resolves HEAD to a commit id.
    pub fn head(&self) -> Result<ObjectId> {
        self.refs.resolve("HEAD")
    }
}
