//! Upstream sources.
//!
//! Both sources hand back a guard owning a temporary directory; dropping it
//! removes everything that was fetched.

pub mod archive;
pub mod git;

pub use archive::DownloadedArchive;
pub use git::TemporaryClone;
