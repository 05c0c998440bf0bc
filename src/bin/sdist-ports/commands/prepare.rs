//! `sdist-ports prepare` command

use anyhow::{bail, Context, Result};
use semver::Version;

use crate::cli::PrepareArgs;
use sdist_ports::ops::prepare;
use sdist_ports::ports::{all_ports, select_ports};
use sdist_ports::{FsExecutor, PortContext};

pub fn execute(args: PrepareArgs) -> Result<()> {
    let version = args
        .version
        .as_deref()
        .map(Version::parse)
        .transpose()
        .context("invalid --version")?;

    let ports = select_ports(all_ports()?, args.name.as_deref(), version.as_ref());
    if ports.is_empty() {
        bail!("no ports match the given --name/--version");
    }

    let cwd = std::env::current_dir()?;
    let mut ctx = PortContext::discover(&cwd)?;
    if let Some(jobs) = args.jobs {
        ctx = ctx.with_executor(FsExecutor::new(jobs));
    }

    tracing::info!(
        "Preparing {} port(s) with {} fs workers",
        ports.len(),
        ctx.executor().workers()
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let result = runtime.block_on(prepare(&ctx, &ports, &args.out))?;
    for (id, dest) in &result.prepared {
        eprintln!("    Prepared {} -> {}", id, dest.display());
    }

    Ok(())
}
