//! Error types for filesystem mutation, fetching and version parsing.
//!
//! Most of the crate returns `anyhow::Result`; these types are what ends up
//! inside it, so callers can `downcast_ref` to tell failure kinds apart.

use std::path::PathBuf;

use thiserror::Error;

/// The kind of relocation that was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocateOp {
    Move,
    Copy,
}

impl std::fmt::Display for RelocateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelocateOp::Move => f.write_str("move"),
            RelocateOp::Copy => f.write_str("copy"),
        }
    }
}

/// Failure of a filesystem operation.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("cannot {op} file [{}] relative to non-parent directory at [{}]", path.display(), whence.display())]
    Containment {
        op: RelocateOp,
        path: PathBuf,
        whence: PathBuf,
    },

    #[error("refusing to remove directory [{}] as a file", path.display())]
    IsDirectory { path: PathBuf },

    #[error("file to remove does not exist: [{}]", path.display())]
    NotFound { path: PathBuf },
}

/// Failure to obtain upstream sources.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download of {url} failed: HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("archive {} has no member `{member}`", archive.display())]
    MissingMember { archive: PathBuf, member: String },

    #[error("git ref `{reference}` not found in {url}")]
    MissingRef { url: String, reference: String },
}

/// A version string that is not a semantic version.
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("malformed version `{input}`")]
    Malformed {
        input: String,
        #[source]
        source: semver::Error,
    },
}
