//! CLI command implementations.

use skiff_storage::{
    GitObject, ObjectId, ObjectType, Repository, TreeBuilder, TreeEntry, MODE_DIR,
};
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] skiff_storage::StorageError),

    #[error("git error: {0}")]
    Git(#[from] skiff_git::GitError),

    #[error("{0}")]
    Usage(String),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Initialize a new repository.
pub fn init(path: &Path) -> Result<()> {
    tracing::info!(path = %path.display(), "initializing repository");

    let repo = Repository::init(path)?;
    println!(
        "Initialized empty Skiff repository in {}",
        repo.git_dir.display()
    );
    Ok(())
}

/// Print an object's content.
pub fn cat_file(path: &Path, id: &str, pretty: bool) -> Result<()> {
    if !pretty {
        return Err(CliError::Usage("cat-file requires -p".to_string()));
    }

    let repo = Repository::open(path)?;
    let object = repo.objects.get(&parse_id(id)?)?;

    std::io::stdout().write_all(&object.data)?;
    Ok(())
}

/// Hash a file into a blob, optionally writing it to the store.
pub fn hash_object(path: &Path, file: &Path, write: bool) -> Result<()> {
    let blob = GitObject::blob(std::fs::read(file)?);

    if write {
        let repo = Repository::open(path)?;
        repo.objects.put(&blob)?;
    }

    println!("{}", blob.id);
    Ok(())
}

/// List a tree object's entries.
pub fn ls_tree(path: &Path, id: &str, name_only: bool) -> Result<()> {
    let repo = Repository::open(path)?;
    let object = repo.objects.get(&parse_id(id)?)?;
    if object.object_type != ObjectType::Tree {
        return Err(CliError::Usage(format!(
            "{} is a {}, not a tree",
            id,
            object.object_type.as_str()
        )));
    }

    for entry in TreeEntry::parse_all(&object.data)? {
        if name_only {
            println!("{}", entry.name);
        } else {
            let kind = if entry.mode == MODE_DIR { "tree" } else { "blob" };
            println!("{:06o} {} {}\t{}", entry.mode, kind, entry.id, entry.name);
        }
    }
    Ok(())
}

/// Write the working directory as a tree object.
pub fn write_tree(path: &Path) -> Result<()> {
    let repo = Repository::open(path)?;
    let root = TreeBuilder::new(&repo.objects).build(path)?;
    println!("{}", root);
    Ok(())
}

/// Create a commit object from a tree.
pub fn commit_tree(path: &Path, tree: &str, parents: &[String], message: &str) -> Result<()> {
    let repo = Repository::open(path)?;

    let tree_id = parse_id(tree)?;
    let parent_ids = parents
        .iter()
        .map(|p| parse_id(p))
        .collect::<Result<Vec<_>>>()?;

    let identity = identity_line();
    let commit = GitObject::commit(&tree_id, &parent_ids, &identity, &identity, message);
    repo.objects.put(&commit)?;

    println!("{}", commit.id);
    Ok(())
}

/// Clone a remote repository.
pub fn clone(url: &str, dir: &Path) -> Result<()> {
    tracing::info!(url = %url, dir = %dir.display(), "cloning repository");

    skiff_git::clone(url, dir)?;
    println!("Cloned {} into {}", url, dir.display());
    Ok(())
}

fn parse_id(hex: &str) -> Result<ObjectId> {
    ObjectId::from_hex(hex).map_err(|_| CliError::Usage(format!("invalid object id: {}", hex)))
}

fn identity_line() -> String {
    let author = std::env::var("SKIFF_AUTHOR").unwrap_or_else(|_| "skiff <skiff@localhost>".into());
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{} {} +0000", author, epoch)
}
