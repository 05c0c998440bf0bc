//! Ports - adapters that turn one upstream release into an sdist.
//!
//! Every adapter implements [`Port`]: it names the package it produces and,
//! when asked, fetches upstream sources into a scratch directory, reshapes
//! them into the canonical layout and writes the manifests. The result is a
//! [`PreparedSdist`], which owns the scratch directory and removes it when
//! dropped.
//!
//! Each adapter family also exposes `all_ports()`, expanding its static
//! version table into port instances without touching disk or network.

pub mod googletest;
pub mod sqlite3;
pub mod taywee_args;

use std::fmt;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use crate::core::PackageId;
use crate::util::PortContext;

pub use googletest::GoogleTestPort;
pub use sqlite3::Sqlite3Port;
pub use taywee_args::TayweeArgsPort;

/// An adapter that knows how to package one version of one upstream library.
#[async_trait]
pub trait Port: Send + Sync + fmt::Debug {
    /// Identity of the package this port produces.
    fn package_id(&self) -> &PackageId;

    /// Fetch, reshape and describe the upstream sources.
    ///
    /// The returned directory is valid until the [`PreparedSdist`] is dropped.
    async fn prepare_sdist(&self, ctx: &PortContext) -> Result<PreparedSdist>;
}

/// A finished sdist living in a scratch directory.
#[derive(Debug)]
pub struct PreparedSdist {
    package_id: PackageId,
    dir: TempDir,
}

impl PreparedSdist {
    pub fn new(package_id: PackageId, dir: TempDir) -> Self {
        PreparedSdist { package_id, dir }
    }

    pub fn package_id(&self) -> &PackageId {
        &self.package_id
    }

    /// Root of the sdist. Only valid while `self` is alive.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Every port of every known family, in a stable order.
pub fn all_ports() -> Result<Vec<Box<dyn Port>>> {
    let mut ports: Vec<Box<dyn Port>> = Vec::new();

    for port in googletest::all_ports()? {
        ports.push(Box::new(port));
    }
    for port in sqlite3::all_ports() {
        ports.push(Box::new(port));
    }
    for port in taywee_args::all_ports()? {
        ports.push(Box::new(port));
    }

    Ok(ports)
}

/// Narrow a set of ports by package name substring and exact version.
pub fn select_ports(
    ports: Vec<Box<dyn Port>>,
    name: Option<&str>,
    version: Option<&semver::Version>,
) -> Vec<Box<dyn Port>> {
    ports
        .into_iter()
        .filter(|p| name.map_or(true, |n| p.package_id().name().contains(n)))
        .filter(|p| version.map_or(true, |v| p.package_id().version() == v))
        .collect()
}
