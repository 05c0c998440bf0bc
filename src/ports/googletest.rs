//! GoogleTest / GoogleMock, packaged from release tags.
//!
//! Upstream ships two trees (`googletest/` and `googlemock/`); they become
//! four libraries: `gtest`, `gtest-main`, `gmock` and `gmock-main`.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;

use crate::core::{LibraryManifest, PackageId, PackageManifest};
use crate::ports::{Port, PreparedSdist};
use crate::sources::git;
use crate::util::errors::VersionError;
use crate::util::fs::{
    exists, filter_file_contents, glob_files, map_lines, move_files, prune_root,
    remove_files, remove_tree,
};
use crate::util::{FsExecutor, PortContext};

pub const GIT_URL: &str = "https://github.com/google/googletest";

const NAMESPACE: &str = "googletest";

/// (tag, version) pairs that are known to package cleanly.
const TAGS: &[(&str, &str)] = &[
    ("release-1.11.0", "1.11.0"),
    ("release-1.10.0", "1.10.0"),
];

const DEPENDS: &[&str] = &["abseil@2021.3.24"];

const LIBRARIES: &[(&str, &[&str])] = &[
    ("gtest", &["abseil/abseil"]),
    ("gtest-main", &["abseil/abseil", "googletest/gtest"]),
    ("gmock", &["abseil/abseil", "googletest/gtest"]),
    ("gmock-main", &["abseil/abseil", "googletest/gmock"]),
];

#[derive(Debug, Clone)]
pub struct GoogleTestPort {
    package_id: PackageId,
    tag: String,
    url: String,
}

impl GoogleTestPort {
    pub fn new(tag: &str, version: &str) -> Result<Self, VersionError> {
        Ok(GoogleTestPort {
            package_id: PackageId::parse("googletest", version)?,
            tag: tag.to_string(),
            url: GIT_URL.to_string(),
        })
    }

    /// Fetch from a mirror instead of GitHub.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Turn an upstream checkout at `root` into the sdist layout, in place.
    pub async fn reshape(&self, exec: &FsExecutor, root: &Path) -> Result<()> {
        munge_files_into_libs(exec, root).await?;
        prune_root(exec, root, &["libs", "package.json"]).await?;
        self.write_manifests(exec, root).await?;
        rewrite_includes(exec, root).await?;
        Ok(())
    }

    async fn write_manifests(&self, exec: &FsExecutor, root: &Path) -> Result<()> {
        PackageManifest::new(&self.package_id, NAMESPACE)
            .with_depends(DEPENDS.iter().copied())
            .write(exec, root)
            .await?;

        for (library, uses) in LIBRARIES {
            LibraryManifest::new(*library)
                .with_uses(uses.iter().copied())
                .write(exec, &root.join("libs").join(library))
                .await?;
        }
        Ok(())
    }
}

async fn munge_files_into_libs(exec: &FsExecutor, root: &Path) -> Result<()> {
    for (upstream, library) in [("googlemock", "gmock"), ("googletest", "gtest")] {
        let whence = root.join(upstream);
        let into = root.join("libs").join(library);
        for subdir in ["include", "src"] {
            let pattern = format!("{}/{}/**/*", upstream, subdir);
            let files = glob_files(exec, root, &pattern).await?;
            move_files(exec, &into, files, &whence).await?;
        }
    }

    let root_library = root.join("library.json");
    if exists(exec, &root_library).await {
        remove_files(exec, vec![root_library]).await?;
    }

    if exists(exec, &root.join("docs")).await {
        remove_tree(exec, &root.join("docs")).await?;
    }
    for dir in ["ci", "googletest", "googlemock"] {
        remove_tree(exec, &root.join(dir)).await?;
    }

    // The main helpers move only after the bulk moves have finished.
    for library in ["gmock", "gtest"] {
        let lib_root = root.join("libs").join(library);
        let main_file = lib_root.join("src").join(format!("{}_main.cc", library));
        move_files(
            exec,
            &root.join("libs").join(format!("{}-main", library)).join("src"),
            vec![main_file.clone()],
            &lib_root.join("src"),
        )
        .await
        .with_context(|| format!("expected {} in this release", main_file.display()))?;
    }

    Ok(())
}

async fn rewrite_includes(exec: &FsExecutor, root: &Path) -> Result<()> {
    let src_include = Regex::new(r#"^(\s*#include\s+")src/"#)?;
    let files = glob_files(exec, root, "**/*.cc").await?;

    filter_file_contents(
        exec,
        files,
        map_lines(move |line| Some(src_include.replace(line, "${1}"))),
    )
    .await
}

#[async_trait]
impl Port for GoogleTestPort {
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

pub fn all_ports() -> Result<Vec<GoogleTestPort>, VersionError> {
    TAGS.iter()
        .map(|(tag, version)| GoogleTestPort::new(tag, version))
        .collect()
}
