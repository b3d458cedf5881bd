//! Health surface.
//!
//! # Data Flow
//! ```text
//! Liveness (/healthz):
//!     drain flag
//!     → 200 {"status":"ok"} while serving
//!     → 503 {"status":"draining"} once shutdown begins
//!
//! Readiness (/readyz):
//!     HealthRegistry.run_all()
//!     → every check concurrently, each under the per-check timeout
//!     → aggregate JSON report, 200 when all pass, 503 otherwise
//! ```
//!
//! # Design Decisions
//! - Liveness never runs user checks; it answers from the drain flag alone
//! - One failing or timed-out check makes the whole report unready
//! - Check errors are surfaced verbatim in the report for operators

pub mod endpoints;
pub mod registry;

pub use endpoints::{liveness_handler, readiness_handler};
pub use registry::{CheckReport, HealthCheck, HealthRegistry, ReadinessReport};
