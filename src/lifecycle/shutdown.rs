//! Shutdown coordination.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::BoxError;
use futures_util::future::BoxFuture;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::lifecycle::drain::DrainState;
use crate::lifecycle::signals;

type CloseFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;
type Callback = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

struct ShutdownResource {
    name: String,
    close: CloseFn,
}

/// Coordinator for graceful shutdown.
///
/// Waits for a termination signal (or a programmatic trigger), then runs
/// the full sequence: pre-shutdown callback, drain flag, listener stop,
/// in-flight wait, resource closes in reverse registration order, post
/// callback. Every wait is bounded by one shared deadline; a resource that
/// cannot close in time is logged and skipped, never waited on forever.
pub struct ShutdownCoordinator {
    resources: Mutex<Vec<ShutdownResource>>,
    drain: Arc<DrainState>,
    timeout: Duration,
    trigger_tx: broadcast::Sender<()>,
    triggered: AtomicBool,
    before: Mutex<Option<Callback>>,
    after: Mutex<Option<Callback>>,
}

impl ShutdownCoordinator {
    pub fn new(drain: Arc<DrainState>, timeout: Duration) -> Self {
        let (trigger_tx, _) = broadcast::channel(1);
        Self {
            resources: Mutex::new(Vec::new()),
            drain,
            timeout,
            trigger_tx,
            triggered: AtomicBool::new(false),
            before: Mutex::new(None),
            after: Mutex::new(None),
        }
    }

    /// Register a named resource in dependency order: a store before the
    /// things using it. Closes run in reverse, so dependents go first.
    /// The HTTP listener is not registered here; the coordinator stops it
    /// itself, ahead of every resource.
    pub fn register<F, Fut>(&self, name: impl Into<String>, close: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let name = name.into();
        tracing::debug!(resource = %name, "Shutdown resource registered");
        self.resources
            .lock()
            .expect("shutdown resources mutex poisoned")
            .push(ShutdownResource {
                name,
                close: Box::new(move || Box::pin(close())),
            });
    }

    /// Runs after the signal, before anything is torn down.
    pub fn on_before_shutdown<F, Fut>(&self, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *self.before.lock().expect("shutdown callback mutex poisoned") =
            Some(Box::new(move || Box::pin(callback())));
    }

    /// Runs last, after resources closed (or their deadline passed).
    pub fn on_after_shutdown<F, Fut>(&self, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *self.after.lock().expect("shutdown callback mutex poisoned") =
            Some(Box::new(move || Box::pin(callback())));
    }

    /// Programmatic shutdown, equivalent to receiving a signal.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        let _ = self.trigger_tx.send(());
    }

    pub fn drain_state(&self) -> Arc<DrainState> {
        Arc::clone(&self.drain)
    }

    /// Block until a signal or trigger arrives, then shut down.
    pub async fn run(&self, listener: axum_server::Handle) {
        // Subscribe before checking the flag. A trigger() landing between
        // the two is then either visible in the flag or delivered on the
        // channel; checking first would drop its wakeup.
        let mut trigger_rx = self.trigger_tx.subscribe();
        if !self.triggered.load(Ordering::SeqCst) {
            tokio::select! {
                _ = signals::termination_signal() => {}
                _ = trigger_rx.recv() => {
                    tracing::info!("Programmatic shutdown triggered");
                }
            }
        }
        self.shutdown(listener).await;
    }

    /// The shutdown sequence itself.
    pub async fn shutdown(&self, listener: axum_server::Handle) {
        let started = Instant::now();
        let deadline = started + self.timeout;

        // Take the callback out before awaiting it; a guard held across
        // the await would make this future !Send.
        let before = self
            .before
            .lock()
            .expect("shutdown callback mutex poisoned")
            .take();
        if let Some(callback) = before {
            callback().await;
        }

        self.drain.begin_drain();
        // Stop accepting right away, independent of resource order.
        listener.graceful_shutdown(Some(self.timeout));

        if self.drain.wait_idle(deadline).await {
            tracing::info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "In-flight requests drained"
            );
        } else {
            tracing::warn!(
                in_flight = self.drain.in_flight(),
                "Shutdown deadline reached with requests still in flight"
            );
        }

        let resources: Vec<ShutdownResource> = {
            let mut resources = self
                .resources
                .lock()
                .expect("shutdown resources mutex poisoned");
            resources.drain(..).collect()
        };
        for resource in resources.into_iter().rev() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, (resource.close)()).await {
                Ok(Ok(())) => {
                    tracing::info!(resource = %resource.name, "Resource closed");
                }
                Ok(Err(err)) => {
                    tracing::warn!(
                        resource = %resource.name,
                        error = %err,
                        "Resource close failed, continuing"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        resource = %resource.name,
                        "Resource close timed out, continuing"
                    );
                }
            }
        }

        let after = self
            .after
            .lock()
            .expect("shutdown callback mutex poisoned")
            .take();
        if let Some(callback) = after {
            callback().await;
        }
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Shutdown complete"
        );
    }
}
