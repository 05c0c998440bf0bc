//! `sdist-ports prepare` - run ports and keep their output.
//!
//! All selected ports run concurrently on one scheduler and share the
//! context's executor, so the filesystem bound applies across the whole run.
//! Each finished sdist is copied to `<out>/<name>@<version>/` before its
//! scratch directory is released.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use futures_util::future::join_all;
use walkdir::WalkDir;

use crate::core::PackageId;
use crate::ports::Port;
use crate::util::fs::{copy_files, create_dir_all, ensure_dir, exists, remove_tree};
use crate::util::PortContext;

/// Where each prepared port was written.
#[derive(Debug, Default)]
pub struct PrepareResult {
    pub prepared: Vec<(PackageId, PathBuf)>,
}

/// Prepare every port in `ports` into `out_dir`.
///
/// Every port is attempted; if any fail, the error lists all of them.
pub async fn prepare(ctx: &PortContext, ports: &[Box<dyn Port>], out_dir: &Path) -> Result<PrepareResult> {
    create_dir_all(ctx.executor(), out_dir).await?;

    let results = join_all(
        ports
            .iter()
            .map(|port| prepare_one(ctx, port.as_ref(), out_dir)),
    )
    .await;

    let mut result = PrepareResult::default();
    let mut failures = Vec::new();
    for (port, outcome) in ports.iter().zip(results) {
        let id = port.package_id().clone();
        match outcome {
            Ok(dest) => {
                tracing::info!("Wrote {} to {}", id, dest.display());
                result.prepared.push((id, dest));
            }
            Err(e) => {
                tracing::error!("{}: {:#}", id, e);
                failures.push(format!("{}: {:#}", id, e));
            }
        }
    }

    if !failures.is_empty() {
        bail!(
            "failed to prepare {} of {} ports:\n  {}",
            failures.len(),
            ports.len(),
            failures.join("\n  ")
        );
    }

    Ok(result)
}

async fn prepare_one(ctx: &PortContext, port: &dyn Port, out_dir: &Path) -> Result<PathBuf> {
    let exec = ctx.executor();
    let sdist = port.prepare_sdist(ctx).await?;

    let dest = out_dir.join(port.package_id().to_string());
    if exists(exec, &dest).await {
        remove_tree(exec, &dest).await?;
    }

    let (root, empty_dest) = (sdist.path().to_path_buf(), dest.clone());
    let files = exec
        .run(move || -> Result<Vec<PathBuf>> {
            // An sdist with no files still gets its output directory.
            ensure_dir(&empty_dest)?;
            collect_tree(&root)
        })
        .await?;
    copy_files(exec, &dest, files, sdist.path()).await?;
    exec.run(move || drop(sdist)).await;

    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PackageManifest;
    use crate::ports::PreparedSdist;
    use crate::util::{Config, FsExecutor};
    use async_trait::async_trait;
    use semver::Version;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Debug, Default)]
    struct Gauge {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    /// A port that writes a few files through the executor, recording how
    /// many of its operations overlap with those of other ports.
    #[derive(Debug)]
    struct FakePort {
        id: PackageId,
        gauge: Arc<Gauge>,
        fail: bool,
    }

    #[async_trait]
    impl Port for FakePort {
        fn package_id(&self) -> &PackageId {
            &self.id
        }

        async fn prepare_sdist(&self, ctx: &PortContext) -> Result<PreparedSdist> {
            if self.fail {
                bail!("upstream tag missing");
            }

            let dir = TempDir::new()?;
            for i in 0..3 {
                let gauge = self.gauge.clone();
                let path = dir.path().join("src").join(format!("f{}.c", i));
                ctx.executor()
                    .run(move || -> Result<()> {
                        let now = gauge.running.fetch_add(1, Ordering::SeqCst) + 1;
                        gauge.peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(15));
                        std::fs::create_dir_all(path.parent().unwrap())?;
                        std::fs::write(&path, "int x;\n")?;
                        gauge.running.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await?;
            }

            PackageManifest::new(&self.id, "fake")
                .write(ctx.executor(), dir.path())
                .await?;
            Ok(PreparedSdist::new(self.id.clone(), dir))
        }
    }

    fn fake_ports(count: u64, gauge: &Arc<Gauge>) -> Vec<Box<dyn Port>> {
        (0..count)
            .map(|i| {
                Box::new(FakePort {
                    id: PackageId::new("fake", Version::new(1, i, 0)),
                    gauge: gauge.clone(),
                    fail: false,
                }) as Box<dyn Port>
            })
            .collect()
    }

    #[tokio::test]
    async fn test_bound_holds_across_ports() {
        let out = TempDir::new().unwrap();
        let gauge = Arc::new(Gauge::default());
        let ctx = PortContext::new(Config::default())
            .unwrap()
            .with_executor(FsExecutor::new(2));

        let ports = fake_ports(6, &gauge);
        let result = prepare(&ctx, &ports, out.path()).await.unwrap();

        assert_eq!(result.prepared.len(), 6);
        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak concurrency was {peak}");

        for (id, dest) in &result.prepared {
            assert_eq!(dest, &out.path().join(id.to_string()));
            let pkg: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(dest.join("package.json")).unwrap())
                    .unwrap();
            assert_eq!(pkg["version"], id.version().to_string());
            assert!(!pkg["namespace"].as_str().unwrap().is_empty());
            assert!(dest.join("src/f2.c").is_file());
        }
    }

    #[tokio::test]
    async fn test_replaces_existing_output() {
        let out = TempDir::new().unwrap();
        let gauge = Arc::new(Gauge::default());
        let ctx = PortContext::new(Config::default()).unwrap();

        let stale = out.path().join("fake@1.0.0/stale.txt");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, "old").unwrap();

        prepare(&ctx, &fake_ports(1, &gauge), out.path()).await.unwrap();
        assert!(!stale.exists());
        assert!(out.path().join("fake@1.0.0/package.json").is_file());
    }

    #[tokio::test]
    async fn test_failures_are_collected() {
        let out = TempDir::new().unwrap();
        let gauge = Arc::new(Gauge::default());
        let ctx = PortContext::new(Config::default()).unwrap();

        let mut ports = fake_ports(1, &gauge);
        ports.push(Box::new(FakePort {
            id: PackageId::new("broken", Version::new(0, 1, 0)),
            gauge: gauge.clone(),
            fail: true,
        }));

        let err = prepare(&ctx, &ports, out.path()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("1 of 2"));
        assert!(msg.contains("broken@0.1.0: upstream tag missing"));
        assert!(out.path().join("fake@1.0.0/package.json").is_file());
    }

    #[tokio::test]
    async fn test_output_dir_waits_for_executor() {
        let out = TempDir::new().unwrap();
        let ctx = PortContext::new(Config::default())
            .unwrap()
            .with_executor(FsExecutor::new(1));
        let nested = out.path().join("nested/out");
        let ports: Vec<Box<dyn Port>> = Vec::new();

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let holder = ctx.executor().clone();
        let hold = tokio::spawn(async move {
            holder
                .run(move || {
                    let _ = started_tx.send(());
                    let _ = release_rx.recv();
                })
                .await
        });
        started_rx.await.unwrap();

        let check = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let created_while_held = nested.exists();
            release_tx.send(()).unwrap();
            created_while_held
        };
        let (result, created_while_held) = tokio::join!(prepare(&ctx, &ports, &nested), check);
        hold.await.unwrap();

        assert!(!created_while_held);
        assert!(result.unwrap().prepared.is_empty());
        assert!(nested.is_dir());
    }
}
