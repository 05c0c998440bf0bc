//! SQLite, packaged from the official amalgamation zips.
//!
//! sqlite.org files each release under the year it shipped, so a version
//! alone is not enough to build the download URL; the table below groups
//! patch releases by (year, major, minor).

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use semver::Version;
use url::Url;

use crate::core::{LibraryManifest, PackageId, PackageManifest};
use crate::ports::{Port, PreparedSdist};
use crate::sources::archive;
use crate::util::fs::scratch_dir;
use crate::util::{FsExecutor, PortContext};

pub const DOWNLOAD_BASE: &str = "https://sqlite.org";

/// Releases sharing a year, major and minor version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionGroup {
    pub year: u16,
    pub major: u64,
    pub minor: u64,
    pub patches: &'static [u64],
}

const fn group(year: u16, major: u64, minor: u64, patches: &'static [u64]) -> VersionGroup {
    VersionGroup {
        year,
        major,
        minor,
        patches,
    }
}

pub const VERSION_GROUPS: &[VersionGroup] = &[
    group(2021, 3, 35, &[0, 1, 2, 3, 4]),
    group(2021, 3, 34, &[1]),
    group(2020, 3, 34, &[0]),
    group(2020, 3, 33, &[0]),
    group(2020, 3, 32, &[0, 1, 2, 3]),
    group(2020, 3, 31, &[0, 1]),
    group(2019, 3, 30, &[0, 1]),
    group(2019, 3, 29, &[0]),
    group(2019, 3, 28, &[0]),
    group(2019, 3, 27, &[0, 1, 2]),
    group(2018, 3, 26, &[0]),
    group(2018, 3, 25, &[0]),
    group(2018, 3, 24, &[0]),
    group(2018, 3, 23, &[0, 1]),
    group(2018, 3, 22, &[0]),
    group(2017, 3, 21, &[0]),
    group(2017, 3, 20, &[0, 1]),
    group(2017, 3, 19, &[0, 1, 2, 3]),
];

/// Compile-time defaults injected ahead of the amalgamation sources.
const CONFIG_DEFAULTS: &[(&str, u32)] = &[
    ("SQLITE_THREADSAFE", 2),
    ("SQLITE_OMIT_LOAD_EXTENSION", 1),
    ("SQLITE_OMIT_DEPRECATED", 1),
    ("SQLITE_DEFAULT_MEMSTATUS", 0),
    ("SQLITE_DQS", 0),
];

const MEMBERS: &[&str] = &["sqlite3.h", "sqlite3.c", "sqlite3ext.h"];

/// Text written ahead of every extracted member.
pub fn source_preamble() -> String {
    let mut out = String::from(
        r#"
/**
 * The contents of this preamble are not part of the main sqlite3 distribution,
 * and are inserted as part of the sdist port for sqlite3.
 */

#if defined(__has_include)
#  if __has_include(<sqlite3.tweaks.h>)
#    include <sqlite3.tweaks.h>
#  endif
#endif

"#,
    );

    for (macro_name, default) in CONFIG_DEFAULTS {
        out.push_str(&format!(
            "\n#ifndef {m}\n#define {m} {d}\n#endif\n",
            m = macro_name,
            d = default
        ));
    }

    out.push_str("\n\n/** End of inserted configuration preamble */\n\n");
    out
}

#[derive(Debug, Clone)]
pub struct Sqlite3Port {
    year: u16,
    package_id: PackageId,
    base_url: String,
}

impl Sqlite3Port {
    pub fn new(year: u16, version: Version) -> Self {
        Sqlite3Port {
            year,
            package_id: PackageId::new("sqlite3", version),
            base_url: DOWNLOAD_BASE.to_string(),
        }
    }

    /// Download from a mirror laid out like sqlite.org.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `<base>/<year>/sqlite-amalgamation-<major><minor:02><patch:02>00.zip`
    pub fn download_url(&self) -> String {
        let v = self.package_id.version();
        format!(
            "{}/{}/sqlite-amalgamation-{}{:02}{:02}00.zip",
            self.base_url.trim_end_matches('/'),
            self.year,
            v.major,
            v.minor,
            v.patch
        )
    }

    /// The directory inside the zip, which is the archive's file stem.
    pub fn archive_top_dir(&self) -> Result<String> {
        let url = self.download_url();
        let parsed = Url::parse(&url).with_context(|| format!("invalid download URL {}", url))?;
        let file_name = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .with_context(|| format!("download URL has no file name: {}", url))?;

        Ok(file_name
            .strip_suffix(".zip")
            .unwrap_or(file_name)
            .to_string())
    }

    /// Populate `root` from an already downloaded amalgamation archive.
    pub async fn populate(&self, exec: &FsExecutor, archive_path: &Path, root: &Path) -> Result<()> {
        let top_dir = self.archive_top_dir()?;
        archive::extract_members(
            exec,
            archive_path,
            &top_dir,
            MEMBERS,
            &root.join("src").join("sqlite3"),
            &source_preamble(),
        )
        .await?;

        PackageManifest::new(&self.package_id, "sqlite3")
            .write(exec, root)
            .await?;
        LibraryManifest::new("sqlite3").write(exec, root).await?;
        Ok(())
    }
}

#[async_trait]
impl Port for Sqlite3Port {
    fn package_id(&self) -> &PackageId {
        &self.package_id
    }

    async fn prepare_sdist(&self, ctx: &PortContext) -> Result<PreparedSdist> {
        let root = scratch_dir(ctx.executor(), "sdist-sqlite3-").await?;

        let url = self.download_url();
        let downloaded = archive::download(
            ctx.http(),
            ctx.executor(),
            &url,
            ctx.config().archive.chunk_size,
        )
        .await?;

        self.populate(ctx.executor(), downloaded.path(), root.path())
            .await
            .with_context(|| format!("failed to prepare {} from {}", self.package_id, url))?;
        tracing::info!(
            "Prepared {} from {} (sha256 {})",
            self.package_id,
            url,
            downloaded.sha256()
        );
        ctx.executor().run(move || drop(downloaded)).await;

        Ok(PreparedSdist::new(self.package_id.clone(), root))
    }
}

/// One port per (year, major, minor, patch) in `groups`, in table order.
pub fn expand_groups(groups: &[VersionGroup]) -> Vec<Sqlite3Port> {
    groups
        .iter()
        .flat_map(|g| {
            g.patches
                .iter()
                .map(move |&patch| Sqlite3Port::new(g.year, Version::new(g.major, g.minor, patch)))
        })
        .collect()
}

pub fn all_ports() -> Vec<Sqlite3Port> {
    expand_groups(VERSION_GROUPS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::archive::tests::write_zip;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_single_group_expansion() {
        let ports = expand_groups(&[group(2021, 3, 35, &[0, 1, 2, 3, 4])]);
        let ids: Vec<String> = ports.iter().map(|p| p.package_id().to_string()).collect();
        assert_eq!(
            ids,
            vec![
                "sqlite3@3.35.0",
                "sqlite3@3.35.1",
                "sqlite3@3.35.2",
                "sqlite3@3.35.3",
                "sqlite3@3.35.4"
            ]
        );
        assert!(ports.iter().all(|p| p.year == 2021));
    }

    #[test]
    fn test_full_table_is_distinct() {
        let ports = all_ports();
        let expected: usize = VERSION_GROUPS.iter().map(|g| g.patches.len()).sum();
        assert_eq!(ports.len(), expected);

        let unique: HashSet<_> = ports.iter().map(|p| p.package_id().clone()).collect();
        assert_eq!(unique.len(), expected);
    }

    #[test]
    fn test_download_url_padding() {
        let port = Sqlite3Port::new(2021, Version::new(3, 35, 2));
        assert_eq!(
            port.download_url(),
            "https://sqlite.org/2021/sqlite-amalgamation-3350200.zip"
        );
        assert_eq!(port.archive_top_dir().unwrap(), "sqlite-amalgamation-3350200");

        let port = Sqlite3Port::new(2017, Version::new(3, 9, 12));
        assert_eq!(
            port.download_url(),
            "https://sqlite.org/2017/sqlite-amalgamation-3091200.zip"
        );
    }

    #[test]
    fn test_preamble_defines_defaults() {
        let preamble = source_preamble();
        assert!(preamble.contains("__has_include(<sqlite3.tweaks.h>)"));
        assert!(preamble.contains("#ifndef SQLITE_THREADSAFE\n#define SQLITE_THREADSAFE 2\n#endif"));
        assert!(preamble.contains("#define SQLITE_DQS 0"));
    }

    #[tokio::test]
    async fn test_populate_from_archive() {
        let tmp = TempDir::new().unwrap();
        let port = Sqlite3Port::new(2021, Version::new(3, 35, 4));
        let archive = tmp.path().join("archive.zip");
        write_zip(
            &archive,
            &port.archive_top_dir().unwrap(),
            &[
                ("sqlite3.h", "#define SQLITE_VERSION \"3.35.4\"\n"),
                ("sqlite3.c", "int sqlite3_initialize(void);\n"),
                ("sqlite3ext.h", "\n"),
                ("shell.c", "int main(void);\n"),
            ],
        );

        let root = tmp.path().join("sdist");
        fs::create_dir_all(&root).unwrap();
        port.populate(&FsExecutor::new(2), &archive, &root)
            .await
            .unwrap();

        let header = fs::read_to_string(root.join("src/sqlite3/sqlite3.h")).unwrap();
        assert!(header.starts_with(&source_preamble()));
        assert!(header.ends_with("#define SQLITE_VERSION \"3.35.4\"\n"));
        assert!(root.join("src/sqlite3/sqlite3.c").is_file());
        assert!(root.join("src/sqlite3/sqlite3ext.h").is_file());
        assert!(!root.join("src/sqlite3/shell.c").exists());

        let pkg: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(root.join("package.json")).unwrap()).unwrap();
        assert_eq!(
            pkg,
            serde_json::json!({"name": "sqlite3", "version": "3.35.4", "namespace": "sqlite3"})
        );
        let lib: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(root.join("library.json")).unwrap()).unwrap();
        assert_eq!(lib, serde_json::json!({"name": "sqlite3"}));
    }

    #[tokio::test]
    async fn test_unreachable_mirror_fails() {
        let ctx = PortContext::new(Default::default()).unwrap();
        let port = Sqlite3Port::new(2021, Version::new(3, 35, 4))
            .with_base_url("http://127.0.0.1:9");
        assert!(port.prepare_sdist(&ctx).await.is_err());
    }
}
