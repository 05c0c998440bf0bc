//! High-level operations.
//!
//! This module contains the implementation of the CLI commands.

pub mod list;
pub mod prepare;

pub use list::list_ports;
pub use prepare::{prepare, PrepareResult};
