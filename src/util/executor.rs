//! Bounded executor for blocking filesystem work.
//!
//! Async tasks hand synchronous closures to an [`FsExecutor`], which runs them
//! on tokio's blocking pool while holding one of a fixed number of permits.
//! Waiters are admitted in submission order (tokio's semaphore is fair).

use std::sync::Arc;

use tokio::sync::Semaphore;

/// Default number of concurrently running operations.
pub const DEFAULT_WORKERS: usize = 8;

/// A cloneable handle to a bounded pool of blocking workers.
///
/// Clones share the same permits, so one executor can be handed to every port
/// being prepared and the bound holds across all of them.
#[derive(Debug, Clone)]
pub struct FsExecutor {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl FsExecutor {
    /// Create an executor that runs at most `workers` operations at once.
    ///
    /// A bound of zero would deadlock every caller, so it is raised to one.
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        FsExecutor {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// Maximum number of concurrently running operations.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `op` on a background worker and return its result.
    ///
    /// The closure's return value comes back untouched; if it panics, the
    /// panic resumes on the awaiting task. The permit travels with the
    /// closure, so a caller that stops waiting does not free its slot until
    /// the operation has actually finished.
    ///
    /// # Panics
    ///
    /// Only if the runtime shuts down while the operation is queued on the
    /// blocking pool. The semaphore is private and never closed.
    pub async fn run<T, F>(&self, op: F) -> T
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("executor semaphore is never closed"),
        };

        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            op()
        });
        match task.await {
            Ok(value) => value,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => panic!("runtime shut down before blocking fs task ran: {err}"),
        }
    }
}

impl Default for FsExecutor {
    fn default() -> Self {
        FsExecutor::new(DEFAULT_WORKERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_returns_closure_result() {
        let exec = FsExecutor::new(2);
        let value = exec.run(|| 40 + 2).await;
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_errors_pass_through_unchanged() {
        let exec = FsExecutor::default();
        let result: std::io::Result<()> = exec
            .run(|| Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope")))
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::PermissionDenied);
        assert_eq!(err.to_string(), "nope");
    }

    #[tokio::test]
    async fn test_zero_workers_is_clamped() {
        let exec = FsExecutor::new(0);
        assert_eq!(exec.workers(), 1);
        assert_eq!(exec.run(|| "ok").await, "ok");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let exec = FsExecutor::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let exec = exec.clone();
            let running = running.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                exec.run(tracked(running, peak, 20)).await
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency was {peak}");
        assert!(peak >= 1);
    }

    fn tracked(running: Arc<AtomicUsize>, peak: Arc<AtomicUsize>, ms: u64) -> impl FnOnce() + Send + 'static {
        move || {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(ms));
            running.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_abandoned_call_keeps_its_slot() {
        let exec = FsExecutor::new(1);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let slow = exec.run(tracked(running.clone(), peak.clone(), 300));
        assert!(tokio::time::timeout(Duration::from_millis(50), slow)
            .await
            .is_err());

        exec.run(tracked(running.clone(), peak.clone(), 10)).await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    #[should_panic(expected = "boom")]
    async fn test_panic_resumes_on_caller() {
        let exec = FsExecutor::new(1);
        exec.run(|| panic!("boom")).await
    }
}
