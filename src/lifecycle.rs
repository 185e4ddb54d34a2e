use std::future::Future;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

// ============================================================================
// Lifecycle Manager - Shutdown signal, task tracking, ordered cleanup
// ============================================================================
//
// Constructed once in `main` and passed by reference to everything that owns
// a resource. `shutdown` raises the signal, waits for tracked tasks, then runs
// cleanups in reverse registration order.
//
// ============================================================================

type Cleanup = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), String>> + Send>;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("cleanup '{name}' failed: {message}")]
    CleanupFailed { name: String, message: String },

    #[error("shutdown did not finish within {0:?}")]
    Timeout(Duration),
}

/// Cloneable view of the process-wide shutdown flag.
#[derive(Clone, Debug)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown is requested. Pends forever if the owner is gone.
    pub async fn wait(&self) {
        let mut rx = self.0.clone();
        if rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub struct Lifecycle {
    signal: watch::Sender<bool>,
    cleanups: Mutex<Vec<(String, Cleanup)>>,
    tasks: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            signal,
            cleanups: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal(self.signal.subscribe())
    }

    /// Register a named cleanup. Cleanups run last-registered first.
    pub async fn register<F, Fut>(&self, name: impl Into<String>, cleanup: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let name = name.into();
        tracing::debug!(cleanup = %name, "Registered cleanup");
        self.cleanups
            .lock()
            .await
            .push((name, Box::new(move || Box::pin(cleanup()))));
    }

    /// Track a spawned task so shutdown waits for it.
    pub async fn track(&self, name: impl Into<String>, handle: JoinHandle<()>) {
        self.tasks.lock().await.push((name.into(), handle));
    }

    pub fn trigger_shutdown(&self) {
        self.signal.send_replace(true);
    }

    /// Raise the signal, join tracked tasks within `timeout`, then run cleanups
    /// in reverse order. Returns the first failure.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), LifecycleError> {
        tracing::info!("🛑 Shutting down");
        self.trigger_shutdown();

        let deadline = Instant::now() + timeout;
        let mut first_error: Option<LifecycleError> = None;

        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for (name, handle) in tasks {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, handle).await {
                Ok(Ok(())) => tracing::debug!(task = %name, "Task stopped"),
                Ok(Err(e)) => tracing::error!(task = %name, error = %e, "Task panicked"),
                Err(_) => {
                    tracing::error!(task = %name, "Task did not stop before shutdown deadline");
                    first_error.get_or_insert(LifecycleError::Timeout(timeout));
                }
            }
        }

        let cleanups: Vec<_> = self.cleanups.lock().await.drain(..).collect();
        for (name, cleanup) in cleanups.into_iter().rev() {
            let started = Instant::now();
            let remaining = deadline.saturating_duration_since(started);

            match tokio::time::timeout(remaining, cleanup()).await {
                Ok(Ok(())) => {
                    tracing::info!(
                        cleanup = %name,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "✅ Cleanup finished"
                    );
                }
                Ok(Err(message)) => {
                    tracing::error!(cleanup = %name, error = %message, "❌ Cleanup failed");
                    first_error.get_or_insert(LifecycleError::CleanupFailed { name, message });
                }
                Err(_) => {
                    tracing::error!(cleanup = %name, "❌ Cleanup timed out");
                    first_error.get_or_insert(LifecycleError::Timeout(timeout));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cleanups_run_in_reverse_order() {
        let lifecycle = Lifecycle::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        for name in ["store", "broker", "http"] {
            let order = order.clone();
            lifecycle
                .register(name, move || async move {
                    order.lock().unwrap().push(name);
                    Ok(())
                })
                .await;
        }

        lifecycle.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["http", "broker", "store"]);
    }

    #[tokio::test]
    async fn test_first_cleanup_error_is_returned_after_all_run() {
        let lifecycle = Lifecycle::new();
        let ran = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let r = ran.clone();
        lifecycle
            .register("first", move || async move {
                r.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
            .await;
        lifecycle
            .register("second", || async { Err("flush failed".to_string()) })
            .await;

        let err = lifecycle.shutdown(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, LifecycleError::CleanupFailed { ref name, .. } if name == "second"));
        assert_eq!(ran.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_tracked_tasks() {
        let lifecycle = Lifecycle::new();
        let signal = lifecycle.shutdown_signal();
        assert!(!signal.is_shutdown());

        let handle = tokio::spawn({
            let signal = signal.clone();
            async move { signal.wait().await }
        });
        lifecycle.track("waiter", handle).await;

        lifecycle.shutdown(Duration::from_secs(1)).await.unwrap();
        assert!(signal.is_shutdown());
    }

    #[tokio::test]
    async fn test_never_signal_does_not_fire() {
        let signal = ShutdownSignal::never();
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.wait()).await;
        assert!(waited.is_err());
    }
}
