//! Readiness check registry.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::BoxError;
use futures_util::future::{join_all, BoxFuture};
use serde::Serialize;

/// A named readiness probe: database reachable, cache warm, upstream
/// resolvable. Failures make `/readyz` report unready; they never affect
/// liveness.
pub trait HealthCheck: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn check(&self) -> BoxFuture<'_, Result<(), BoxError>>;
}

/// Outcome of a single check run.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub name: String,
    pub healthy: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated readiness document served by `/readyz`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub status: &'static str,
    pub checks: Vec<CheckReport>,
}

impl ReadinessReport {
    pub fn healthy(&self) -> bool {
        self.checks.iter().all(|check| check.healthy)
    }
}

/// Holds every registered check and runs them concurrently, each bounded
/// by the same per-check timeout.
pub struct HealthRegistry {
    checks: RwLock<Vec<Arc<dyn HealthCheck>>>,
    check_timeout: Duration,
}

impl HealthRegistry {
    pub fn new(check_timeout: Duration) -> Self {
        Self {
            checks: RwLock::new(Vec::new()),
            check_timeout,
        }
    }

    pub fn register(&self, check: impl HealthCheck) {
        self.checks
            .write()
            .expect("health registry lock poisoned")
            .push(Arc::new(check));
    }

    pub fn len(&self) -> usize {
        self.checks
            .read()
            .expect("health registry lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every check concurrently and aggregate. A registry with no
    /// checks reports ready.
    pub async fn run_all(&self) -> ReadinessReport {
        // Clone the handles out so no lock guard lives across an await.
        let checks: Vec<Arc<dyn HealthCheck>> = {
            self.checks
                .read()
                .expect("health registry lock poisoned")
                .clone()
        };

        let timeout = self.check_timeout;
        let reports = join_all(checks.iter().map(|check| async move {
            let started = Instant::now();
            let outcome = tokio::time::timeout(timeout, check.check()).await;
            let duration_ms = started.elapsed().as_millis() as u64;
            match outcome {
                Ok(Ok(())) => CheckReport {
                    name: check.name().to_string(),
                    healthy: true,
                    duration_ms,
                    error: None,
                },
                Ok(Err(err)) => {
                    tracing::warn!(check = %check.name(), error = %err, "Readiness check failed");
                    CheckReport {
                        name: check.name().to_string(),
                        healthy: false,
                        duration_ms,
                        error: Some(err.to_string()),
                    }
                }
                Err(_) => {
                    tracing::warn!(
                        check = %check.name(),
                        timeout_ms = timeout.as_millis() as u64,
                        "Readiness check timed out"
                    );
                    CheckReport {
                        name: check.name().to_string(),
                        healthy: false,
                        duration_ms,
                        error: Some("timed out".to_string()),
                    }
                }
            }
        }))
        .await;

        let ready = reports.iter().all(|check| check.healthy);
        ReadinessReport {
            status: if ready { "ready" } else { "unready" },
            checks: reports,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        name: &'static str,
        outcome: Result<(), &'static str>,
    }

    impl HealthCheck for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn check(&self) -> BoxFuture<'_, Result<(), BoxError>> {
            let outcome = self.outcome;
            Box::pin(async move { outcome.map_err(BoxError::from) })
        }
    }

    struct Stuck;

    impl HealthCheck for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }

        fn check(&self) -> BoxFuture<'_, Result<(), BoxError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_empty_registry_is_ready() {
        let registry = HealthRegistry::new(Duration::from_secs(1));
        let report = registry.run_all().await;
        assert!(report.healthy());
        assert_eq!(report.status, "ready");
        assert!(report.checks.is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_makes_report_unready() {
        let registry = HealthRegistry::new(Duration::from_secs(1));
        registry.register(Fixed {
            name: "database",
            outcome: Ok(()),
        });
        registry.register(Fixed {
            name: "cache",
            outcome: Err("connection refused"),
        });

        let report = registry.run_all().await;
        assert!(!report.healthy());
        assert_eq!(report.status, "unready");

        let cache = report.checks.iter().find(|c| c.name == "cache").unwrap();
        assert_eq!(cache.error.as_deref(), Some("connection refused"));
        let database = report.checks.iter().find(|c| c.name == "database").unwrap();
        assert!(database.healthy);
    }

    #[tokio::test]
    async fn test_slow_check_times_out() {
        let registry = HealthRegistry::new(Duration::from_millis(50));
        registry.register(Stuck);

        let report = registry.run_all().await;
        assert!(!report.healthy());
        assert_eq!(report.checks[0].error.as_deref(), Some("timed out"));
    }
}
