//! The clone operation: discovery, negotiation, unpacking, ref update.

use crate::client::{HttpClient, RemoteRef};
use crate::pack::PackParser;
use crate::Result;
use skiff_storage::Repository;
use std::path::Path;

/// Clones a remote repository into `target`.
///
/// Initializes the repository, discovers the remote's refs, fetches a pack
/// covering all of them, unpacks every object into the store, then writes
/// the advertised refs and points HEAD at the first advertised branch.
/// The first error at any stage aborts the whole operation; partially
/// written loose objects may remain on disk.
pub fn clone(remote_url: &str, target: &Path) -> Result<()> {
    let repo = Repository::init(target)?;
    let client = HttpClient::new(remote_url);

    let refs = client.discover_refs()?;
    tracing::info!(remote = remote_url, refs = refs.len(), "discovered refs");
    if refs.is_empty() {
        // Nothing to negotiate for; the empty repository stands.
        return Ok(());
    }

    let wants = want_ids(&refs);
    let pack = client.fetch_pack(&wants)?;

    let ids = PackParser::new(&pack).parse(&repo.objects)?;
    tracing::info!(objects = ids.len(), "unpacked objects");

    update_refs(&repo, &refs)
}

/// Writes the advertised refs into the repository and points HEAD at the
/// first advertised branch.
///
/// Peeled tag lines and names outside the `refs/` hierarchy (such as the
/// remote's own HEAD line) are skipped. The ref store rejects names that
/// would resolve outside the git dir.
fn update_refs(repo: &Repository, refs: &[RemoteRef]) -> Result<()> {
    for remote_ref in refs {
        if is_peeled(&remote_ref.name) || !remote_ref.name.starts_with("refs/") {
            continue;
        }
        repo.refs.set(&remote_ref.name, remote_ref.id)?;
    }

    if let Some(branch) = refs
        .iter()
        .find(|r| r.name.starts_with("refs/heads/") && !is_peeled(&r.name))
    {
        repo.refs.set_symbolic("HEAD", &branch.name)?;
    }

    Ok(())
}

/// A peeled tag advertisement (`refs/tags/v1^{}`); points at the tag's
/// target rather than a ref of its own.
fn is_peeled(name: &str) -> bool {
    name.ends_with("^{}")
}

/// Ids to request: every advertised id once, in advertisement order.
fn want_ids(refs: &[RemoteRef]) -> Vec<skiff_storage::ObjectId> {
    let mut wants = Vec::new();
    for remote_ref in refs {
        if !wants.contains(&remote_ref.id) {
            wants.push(remote_ref.id);
        }
    }
    wants
}
