//! Request metrics with strictly bounded memory.
//!
//! # Responsibilities
//! - Count completed requests by method and status.
//! - Retain a fixed window of latency samples per `{method, endpoint}`.
//! - Enforce a ceiling on distinct endpoint buckets so path fuzzing cannot
//!   grow memory without bound.
//! - Render everything as Prometheus text for the `/metrics` endpoint.
//!
//! # Design Decisions
//! - The collector owns its storage outright instead of delegating to a
//!   recorder facade. Bounded memory is the whole point; rings and the
//!   endpoint ceiling have to live in one place where they can be tested.
//! - Writers take a short write lock per request. Rendering snapshots under
//!   a read lock and formats after releasing it, so scrapes never stall
//!   request threads on string formatting.
//!
//! # Data Flow
//! ```text
//! request done ─> record(method, endpoint, status, duration)
//!                   ├─> counters{method,status} += 1
//!                   └─> ring{method,endpoint} ← sample  (ceiling → overflow)
//! GET /metrics ─> render() ─> text exposition
//! ```

pub mod collector;
pub mod ring;

pub use collector::{
    ExecutingGuard, MetricsCollector, MetricsOptions, AGGREGATE_BUCKET, OVERFLOW_BUCKET,
};
pub use ring::LatencyRing;
