//! Git source - a single tag checked out into a throwaway directory.

use std::path::Path;

use anyhow::{Context, Result};
use git2::build::CheckoutBuilder;
use git2::{FetchOptions, Repository};
use tempfile::TempDir;

use crate::util::errors::FetchError;

/// A checkout of one tag that is deleted when dropped.
#[derive(Debug)]
pub struct TemporaryClone {
    dir: TempDir,
    url: String,
    tag: String,
}

impl TemporaryClone {
    /// Root of the working tree.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Hand the directory over to another owner; it is still removed when
    /// the returned guard drops.
    pub fn into_temp_dir(self) -> TempDir {
        self.dir
    }
}

/// Fetch `tag` from `url` into a fresh temporary directory.
///
/// With `shallow`, only the tagged commit is transferred. Fails if the remote
/// is unreachable or has no such tag; the directory is removed on failure.
pub async fn clone_tag(url: &str, tag: &str, shallow: bool) -> Result<TemporaryClone> {
    tracing::info!("Cloning {} at {}", url, tag);

    let (url_owned, tag_owned) = (url.to_string(), tag.to_string());
    let dir = tokio::task::spawn_blocking(move || -> Result<TempDir> {
        let dir = tempfile::Builder::new()
            .prefix("sdist-git-")
            .tempdir()
            .context("failed to create temporary clone directory")?;
        fetch_tag(&url_owned, &tag_owned, shallow, dir.path())?;
        Ok(dir)
    })
    .await
    .context("git clone task failed")??;

    Ok(TemporaryClone {
        dir,
        url: url.to_string(),
        tag: tag.to_string(),
    })
}

fn fetch_tag(url: &str, tag: &str, shallow: bool, dest: &Path) -> Result<()> {
    let repo = Repository::init(dest)
        .with_context(|| format!("failed to init repository at {}", dest.display()))?;

    let refname = format!("refs/tags/{}", tag);
    let refspec = format!("+{0}:{0}", refname);

    let mut opts = FetchOptions::new();
    if shallow {
        opts.depth(1);
    }

    let mut remote = repo
        .remote_anonymous(url)
        .with_context(|| format!("invalid git remote {}", url))?;
    remote
        .fetch(&[refspec.as_str()], Some(&mut opts), None)
        .with_context(|| format!("failed to fetch {} from {}", tag, url))?;

    let reference = repo
        .find_reference(&refname)
        .map_err(|_| FetchError::MissingRef {
            url: url.to_string(),
            reference: tag.to_string(),
        })?;
    let commit = reference
        .peel_to_commit()
        .with_context(|| format!("tag {} does not point at a commit", tag))?;

    repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))
        .with_context(|| format!("failed to check out {}", tag))?;
    repo.set_head_detached(commit.id())?;

    tracing::debug!("Checked out {} ({}) into {}", tag, commit.id(), dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;

    fn upstream_with_tag(root: &Path, tag: &str) {
        let repo = Repository::init(root).unwrap();
        std::fs::write(root.join("args.hxx"), "#pragma once\n").unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new("args.hxx")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

        let sig = Signature::now("Upstream", "upstream@example.com").unwrap();
        let oid = repo
            .commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
        let obj = repo.find_object(oid, None).unwrap();
        repo.tag_lightweight(tag, &obj, false).unwrap();
    }

    #[tokio::test]
    async fn test_clone_tag_checks_out_files() {
        let upstream = TempDir::new().unwrap();
        upstream_with_tag(upstream.path(), "6.2.7");

        let url = upstream.path().to_str().unwrap();
        let clone = clone_tag(url, "6.2.7", false).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(clone.path().join("args.hxx")).unwrap(),
            "#pragma once\n"
        );
        assert_eq!(clone.tag(), "6.2.7");

        let path = clone.path().to_path_buf();
        drop(clone);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_tag_fails() {
        let upstream = TempDir::new().unwrap();
        upstream_with_tag(upstream.path(), "6.2.7");

        let url = upstream.path().to_str().unwrap();
        assert!(clone_tag(url, "9.9.9", false).await.is_err());
    }
}
