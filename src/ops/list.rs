//! Enumerate known ports.

use anyhow::Result;

use crate::core::PackageId;
use crate::ports::{all_ports, select_ports};

/// Package IDs of every known port whose name contains `name`, in family
/// then table order.
pub fn list_ports(name: Option<&str>) -> Result<Vec<PackageId>> {
    let ports = select_ports(all_ports()?, name, None);
    Ok(ports.iter().map(|p| p.package_id().clone()).collect())
}
