//! Shared utilities

pub mod config;
pub mod context;
pub mod errors;
pub mod executor;
pub mod fs;
pub mod hash;

pub use config::Config;
pub use context::PortContext;
pub use executor::FsExecutor;
