//! `package.json` and `library.json` manifests written into every sdist.
//!
//! Only the fields the package index reads are modelled. `name`, `version`
//! and `namespace` are always present in `package.json`; dependency lists
//! are omitted when empty.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::PackageId;
use crate::util::fs::write_string;
use crate::util::FsExecutor;

/// File name of the package manifest at the sdist root.
pub const PACKAGE_MANIFEST: &str = "package.json";

/// File name of a library manifest.
pub const LIBRARY_MANIFEST: &str = "library.json";

/// Root `package.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    pub version: String,
    pub namespace: String,

    /// `namespace/name@version` or bare `name@version` requirements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

impl PackageManifest {
    /// Manifest for `id` in `namespace`.
    pub fn new(id: &PackageId, namespace: impl Into<String>) -> Self {
        PackageManifest {
            name: id.name().to_string(),
            version: id.version().to_string(),
            namespace: namespace.into(),
            depends: Vec::new(),
        }
    }

    pub fn with_depends<I, S>(mut self, depends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends = depends.into_iter().map(Into::into).collect();
        self
    }

    /// Write `package.json` into `root`.
    pub async fn write(&self, exec: &FsExecutor, root: &Path) -> Result<PathBuf> {
        write_json(exec, root.join(PACKAGE_MANIFEST), self).await
    }
}

/// A `library.json`, either at the root or under `libs/<name>/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryManifest {
    pub name: String,

    /// `namespace/library` references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uses: Vec<String>,
}

impl LibraryManifest {
    pub fn new(name: impl Into<String>) -> Self {
        LibraryManifest {
            name: name.into(),
            uses: Vec::new(),
        }
    }

    pub fn with_uses<I, S>(mut self, uses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uses = uses.into_iter().map(Into::into).collect();
        self
    }

    /// Write the manifest as `<dir>/library.json`.
    pub async fn write(&self, exec: &FsExecutor, dir: &Path) -> Result<PathBuf> {
        write_json(exec, dir.join(LIBRARY_MANIFEST), self).await
    }
}

async fn write_json<T: Serialize>(exec: &FsExecutor, path: PathBuf, value: &T) -> Result<PathBuf> {
    let mut contents = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    contents.push('\n');

    exec.run(move || {
        tracing::debug!("Write [{}]", path.display());
        write_string(&path, &contents).map(|()| path)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_package_manifest_fields() {
        let tmp = TempDir::new().unwrap();
        let id = PackageId::new("googletest", Version::new(1, 11, 0));
        PackageManifest::new(&id, "googletest")
            .with_depends(["abseil@2021.3.24"])
            .write(&FsExecutor::default(), tmp.path())
            .await
            .unwrap();

        let raw = std::fs::read_to_string(tmp.path().join("package.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["name"], "googletest");
        assert_eq!(json["version"], "1.11.0");
        assert_eq!(json["namespace"], "googletest");
        assert_eq!(json["depends"][0], "abseil@2021.3.24");
    }

    #[tokio::test]
    async fn test_empty_lists_are_omitted() {
        let tmp = TempDir::new().unwrap();
        let exec = FsExecutor::default();
        let id = PackageId::new("sqlite3", Version::new(3, 35, 0));

        PackageManifest::new(&id, "sqlite3")
            .write(&exec, tmp.path())
            .await
            .unwrap();
        let lib_dir = tmp.path().join("libs/sqlite3");
        LibraryManifest::new("sqlite3")
            .write(&exec, &lib_dir)
            .await
            .unwrap();

        let pkg: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join("package.json")).unwrap())
                .unwrap();
        assert!(pkg.get("depends").is_none());

        let lib: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(lib_dir.join("library.json")).unwrap())
                .unwrap();
        assert_eq!(lib, serde_json::json!({"name": "sqlite3"}));
    }
}
