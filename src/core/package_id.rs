//! Package identification - WHICH package (name + version).
//!
//! A PackageId is fixed when a port is constructed. Equality and ordering
//! come from the name first, then the semantic version.

use std::fmt;

use semver::Version;
use serde::Serialize;

use crate::util::errors::VersionError;

/// Identity of one packaged release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PackageId {
    name: String,
    version: Version,
}

impl PackageId {
    /// Create a new package ID.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        PackageId {
            name: name.into(),
            version,
        }
    }

    /// Create a package ID from a version string.
    pub fn parse(name: impl Into<String>, version: &str) -> Result<Self, VersionError> {
        let parsed = Version::parse(version).map_err(|source| VersionError::Malformed {
            input: version.to_string(),
            source,
        })?;
        Ok(PackageId::new(name, parsed))
    }

    /// Get the package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the package version.
    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}
