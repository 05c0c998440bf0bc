//! Taywee's `args` header-only argument parser.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;

use crate::core::{LibraryManifest, PackageId, PackageManifest};
use crate::ports::{Port, PreparedSdist};
use crate::sources::git;
use crate::util::errors::VersionError;
use crate::util::fs::{
    filter_file_contents, glob_files, map_lines, move_files, prune_root, remove_files,
    remove_tree, rename,
};
use crate::util::{FsExecutor, PortContext};

pub const GIT_URL: &str = "https://github.com/taywee/args";

const NAMESPACE: &str = "taywee";

/// Upstream tags are bare version numbers.
const VERSIONS: &[&str] = &["6.2.7"];

#[derive(Debug, Clone)]
pub struct TayweeArgsPort {
    package_id: PackageId,
    tag: String,
    url: String,
}

impl TayweeArgsPort {
    pub fn new(version: &str) -> Result<Self, VersionError> {
        Ok(TayweeArgsPort {
            package_id: PackageId::parse("taywee-args", version)?,
            tag: version.to_string(),
            url: GIT_URL.to_string(),
        })
    }

    /// Fetch from a mirror instead of GitHub.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Turn an upstream checkout at `root` into the sdist layout, in place.
    pub async fn reshape(&self, exec: &FsExecutor, root: &Path) -> Result<()> {
        // Upstream's own tests need its vendored Catch; they are not carried over.
        remove_tree(exec, &root.join("test")).await?;
        remove_files(exec, vec![root.join("catch.hpp")]).await?;

        move_files(exec, &root.join("include"), vec![root.join("args.hxx")], root).await?;
        move_files(exec, &root.join("src"), vec![root.join("test.cxx")], root).await?;
        rename(
            exec,
            &root.join("src").join("test.cxx"),
            &root.join("src").join("args.test.cxx"),
        )
        .await?;

        prune_root(exec, root, &["include", "src"]).await?;

        PackageManifest::new(&self.package_id, NAMESPACE)
            .write(exec, root)
            .await?;
        LibraryManifest::new("args").write(exec, root).await?;

        rewrite_includes(exec, root).await
    }
}

/// Point Catch includes at `catch2/` and drop the self-provided `main`.
async fn rewrite_includes(exec: &FsExecutor, root: &Path) -> Result<()> {
    let catch_include = Regex::new(r#"^(#include\s+["<])(catch.hpp[>"])"#)?;
    let files = glob_files(exec, root, "src/*.cxx").await?;

    filter_file_contents(
        exec,
        files,
        map_lines(move |line| {
            if line.starts_with("#define CATCH_CONFIG_MAIN") {
                return None;
            }
            Some(catch_include.replace(line, "${1}catch2/${2}"))
        }),
    )
    .await
}

#[async_trait]
impl Port for TayweeArgsPort {
    fn package_id(&self) -> &PackageId {
        &self.package_id
    }

    async fn prepare_sdist(&self, ctx: &PortContext) -> Result<PreparedSdist> {
        let clone = git::clone_tag(&self.url, &self.tag, ctx.config().git.shallow).await?;
        self.reshape(ctx.executor(), clone.path())
            .await
            .with_context(|| format!("failed to prepare {}", self.package_id))?;

        tracing::info!("Prepared {} from {} at {}", self.package_id, clone.url(), clone.tag());
        Ok(PreparedSdist::new(
            self.package_id.clone(),
            clone.into_temp_dir(),
        ))
    }
}

pub fn all_ports() -> Result<Vec<TayweeArgsPort>, VersionError> {
    VERSIONS.iter().map(|v| TayweeArgsPort::new(v)).collect()
}
