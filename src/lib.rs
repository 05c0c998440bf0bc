//! sdist-ports - upstream C and C++ releases as normalized source distributions
//!
//! Each supported upstream library has a [`Port`] that fetches a release,
//! moves its files into the canonical `include/`, `src/` and `libs/<name>/`
//! layout, rewrites include paths to match, and writes `package.json` and
//! `library.json` manifests.

pub mod core;
pub mod ops;
pub mod ports;
pub mod sources;
pub mod util;

pub use crate::core::{LibraryManifest, PackageId, PackageManifest};
pub use ports::{all_ports, Port, PreparedSdist};
pub use util::{Config, FsExecutor, PortContext};
