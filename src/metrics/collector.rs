//! Bounded-memory request metrics.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::http::{Method, StatusCode};

use crate::lifecycle::drain::DrainState;
use crate::metrics::ring::LatencyRing;

/// Endpoint label applied once the distinct-endpoint ceiling is reached.
pub const OVERFLOW_BUCKET: &str = "overflow";
/// Endpoint label used when per-path tracking is disabled.
pub const AGGREGATE_BUCKET: &str = "all";

/// Collector tuning, normally filled in from the config file.
#[derive(Debug, Clone)]
pub struct MetricsOptions {
    /// First component of every metric name.
    pub namespace: String,
    /// Second component of every metric name.
    pub subsystem: String,
    /// Ceiling on distinct `{method, endpoint}` latency buckets; overflow
    /// buckets sit outside the ceiling.
    pub max_endpoints: usize,
    /// Samples retained per latency ring.
    pub sample_capacity: usize,
    /// Collapse every endpoint into a single `all` bucket per method.
    pub aggregate_paths: bool,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            namespace: "manifold".to_string(),
            subsystem: "http".to_string(),
            max_endpoints: 256,
            sample_capacity: 256,
            aggregate_paths: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CounterKey {
    method: String,
    status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EndpointKey {
    method: String,
    endpoint: String,
}

#[derive(Debug, Default)]
struct MetricsState {
    counters: HashMap<CounterKey, u64>,
    latency: HashMap<EndpointKey, LatencyRing>,
    /// Latency buckets counted against the ceiling (everything except
    /// overflow buckets).
    tracked: usize,
}

/// Request counters and latency rings with a hard memory bound.
///
/// Writers take a brief write lock per request; the render path snapshots
/// under a read lock and formats outside it. Distinct endpoint cardinality
/// is capped by `max_endpoints`, after which new endpoints fold into a
/// per-method overflow bucket, so hostile path fuzzing cannot grow the
/// state beyond the configured ceiling.
#[derive(Debug)]
pub struct MetricsCollector {
    options: MetricsOptions,
    state: RwLock<MetricsState>,
    /// Requests currently inside a handler.
    executing: AtomicU64,
    drain: Arc<DrainState>,
}

impl MetricsCollector {
    pub fn new(options: MetricsOptions, drain: Arc<DrainState>) -> Self {
        Self {
            options,
            state: RwLock::new(MetricsState::default()),
            executing: AtomicU64::new(0),
            drain,
        }
    }

    pub fn options(&self) -> &MetricsOptions {
        &self.options
    }

    /// Record one completed request.
    pub fn record(&self, method: &Method, endpoint: &str, status: StatusCode, duration: Duration) {
        let method_label = method.as_str().to_string();
        let endpoint = if self.options.aggregate_paths {
            AGGREGATE_BUCKET
        } else {
            endpoint
        };

        let mut state = self.state.write().expect("metrics state lock poisoned");

        *state
            .counters
            .entry(CounterKey {
                method: method_label.clone(),
                status: status.as_u16(),
            })
            .or_insert(0) += 1;

        let mut key = EndpointKey {
            method: method_label,
            endpoint: endpoint.to_string(),
        };
        if !state.latency.contains_key(&key) {
            if key.endpoint != OVERFLOW_BUCKET && state.tracked < self.options.max_endpoints {
                state.tracked += 1;
            } else if key.endpoint != OVERFLOW_BUCKET {
                tracing::trace!(
                    endpoint = %key.endpoint,
                    ceiling = self.options.max_endpoints,
                    "Endpoint ceiling reached, folding into overflow bucket"
                );
                key.endpoint = OVERFLOW_BUCKET.to_string();
            }
        }

        let capacity = self.options.sample_capacity;
        state
            .latency
            .entry(key)
            .or_insert_with(|| LatencyRing::new(capacity))
            .push(duration.as_secs_f64());
    }

    /// Mark a request as executing. The gauge drops with the guard.
    pub fn executing_guard(self: &Arc<Self>) -> ExecutingGuard {
        self.executing.fetch_add(1, Ordering::SeqCst);
        ExecutingGuard {
            collector: Arc::clone(self),
        }
    }

    pub fn active_requests(&self) -> u64 {
        self.executing.load(Ordering::SeqCst)
    }

    /// Latency buckets currently allocated, overflow buckets included.
    pub fn latency_buckets(&self) -> usize {
        self.state
            .read()
            .expect("metrics state lock poisoned")
            .latency
            .len()
    }

    /// Latency buckets counted against the endpoint ceiling.
    pub fn tracked_endpoints(&self) -> usize {
        self.state
            .read()
            .expect("metrics state lock poisoned")
            .tracked
    }

    /// Counter value for one `{method, status}` pair, 0 when never seen.
    pub fn requests_total(&self, method: &Method, status: StatusCode) -> u64 {
        let state = self.state.read().expect("metrics state lock poisoned");
        state
            .counters
            .get(&CounterKey {
                method: method.as_str().to_string(),
                status: status.as_u16(),
            })
            .copied()
            .unwrap_or(0)
    }

    /// Render all state in Prometheus text exposition format.
    pub fn render(&self) -> String {
        // Snapshot under the read lock, format after releasing it.
        let (mut counters, mut latency) = {
            let state = self.state.read().expect("metrics state lock poisoned");
            let counters: Vec<(CounterKey, u64)> = state
                .counters
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect();
            let latency: Vec<(EndpointKey, u64, f64, f64)> = state
                .latency
                .iter()
                .map(|(k, ring)| (k.clone(), ring.total(), ring.average(), ring.max()))
                .collect();
            (counters, latency)
        };
        counters.sort_by(|a, b| (&a.0.method, a.0.status).cmp(&(&b.0.method, b.0.status)));
        latency.sort_by(|a, b| (&a.0.method, &a.0.endpoint).cmp(&(&b.0.method, &b.0.endpoint)));

        let prefix = format!("{}_{}", self.options.namespace, self.options.subsystem);
        let mut out = String::new();

        let _ = writeln!(
            out,
            "# HELP {prefix}_requests_total Total requests by method and status."
        );
        let _ = writeln!(out, "# TYPE {prefix}_requests_total counter");
        for (key, value) in &counters {
            let _ = writeln!(
                out,
                "{prefix}_requests_total{{method=\"{}\",status=\"{}\"}} {value}",
                escape_label(&key.method),
                key.status
            );
        }

        let _ = writeln!(
            out,
            "# HELP {prefix}_request_duration_seconds_count Latency samples observed per method and endpoint."
        );
        let _ = writeln!(out, "# TYPE {prefix}_request_duration_seconds_count counter");
        for (key, total, _, _) in &latency {
            let _ = writeln!(
                out,
                "{prefix}_request_duration_seconds_count{{method=\"{}\",endpoint=\"{}\"}} {total}",
                escape_label(&key.method),
                escape_label(&key.endpoint)
            );
        }

        let _ = writeln!(
            out,
            "# HELP {prefix}_request_duration_seconds_avg Mean latency over the retained sample window."
        );
        let _ = writeln!(out, "# TYPE {prefix}_request_duration_seconds_avg gauge");
        for (key, _, avg, _) in &latency {
            let _ = writeln!(
                out,
                "{prefix}_request_duration_seconds_avg{{method=\"{}\",endpoint=\"{}\"}} {avg}",
                escape_label(&key.method),
                escape_label(&key.endpoint)
            );
        }

        let _ = writeln!(
            out,
            "# HELP {prefix}_request_duration_seconds_max Maximum latency over the retained sample window."
        );
        let _ = writeln!(out, "# TYPE {prefix}_request_duration_seconds_max gauge");
        for (key, _, _, max) in &latency {
            let _ = writeln!(
                out,
                "{prefix}_request_duration_seconds_max{{method=\"{}\",endpoint=\"{}\"}} {max}",
                escape_label(&key.method),
                escape_label(&key.endpoint)
            );
        }

        let _ = writeln!(
            out,
            "# HELP {prefix}_requests_in_flight Requests admitted and not yet completed."
        );
        let _ = writeln!(out, "# TYPE {prefix}_requests_in_flight gauge");
        let _ = writeln!(out, "{prefix}_requests_in_flight {}", self.drain.in_flight());

        let _ = writeln!(
            out,
            "# HELP {prefix}_active_requests Requests currently executing a handler."
        );
        let _ = writeln!(out, "# TYPE {prefix}_active_requests gauge");
        let _ = writeln!(out, "{prefix}_active_requests {}", self.active_requests());

        out
    }
}

/// Gauge guard for one executing request.
#[derive(Debug)]
pub struct ExecutingGuard {
    collector: Arc<MetricsCollector>,
}

impl Drop for ExecutingGuard {
    fn drop(&mut self) {
        self.collector.executing.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Escape a label value per the text exposition format.
fn escape_label(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}
