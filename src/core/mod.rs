//! Core data structures.
//!
//! - Package identity (PackageId)
//! - Manifests written into every sdist

pub mod manifest;
pub mod package_id;

pub use manifest::{LibraryManifest, PackageManifest, LIBRARY_MANIFEST, PACKAGE_MANIFEST};
pub use package_id::PackageId;
