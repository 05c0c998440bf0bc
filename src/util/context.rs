//! Shared collaborators handed to every port.
//!
//! One [`PortContext`] is built per run and lent to each `prepare_sdist`
//! call, so all ports share a single bounded executor and HTTP client.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::util::config::Config;
use crate::util::executor::FsExecutor;

/// Executor, HTTP client and settings used while preparing ports.
#[derive(Debug, Clone)]
pub struct PortContext {
    executor: FsExecutor,
    http: reqwest::Client,
    config: Config,
}

impl PortContext {
    /// Build a context from configuration.
    pub fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.net.user_agent.clone())
            .timeout(Duration::from_secs(config.net.timeout_secs))
            .build()
            .context("failed to create HTTP client")?;

        Ok(PortContext {
            executor: FsExecutor::new(config.fs.workers),
            http,
            config,
        })
    }

    /// Build a context from the global and project config files.
    pub fn discover(project_root: &Path) -> Result<Self> {
        Self::new(Config::discover(project_root))
    }

    /// Replace the executor, e.g. to honour a `--jobs` override.
    pub fn with_executor(mut self, executor: FsExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn executor(&self) -> &FsExecutor {
        &self.executor
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
