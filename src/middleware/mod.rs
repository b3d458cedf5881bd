//! Middleware chain.
//!
//! # Responsibilities
//! - Define the [`Middleware`] trait: a named wrapper around a [`Handler`].
//! - Compose chains at registration time so dispatch pays no per-request
//!   assembly cost.
//! - Provide the built-in stack every route runs under: panic recovery,
//!   request id propagation, body size limits, drain rejection and metrics.
//!
//! # Design Decisions
//! - Chains are compiled once, when a route is registered. A chain is a
//!   plain slice of middlewares folded onto the route handler, first entry
//!   outermost.
//! - Middlewares see the same `(Request, RequestContext)` pair handlers do,
//!   so enrichment is just mutating the context before calling `next`.
//!
//! # Data Flow
//! ```text
//! request
//!   └─> recovery ─> request id ─> drain ─> body limit ─> metrics ─> handler
//!         (base stack, outermost first)    (domain chain) (route chain)
//! ```

use std::sync::Arc;

use crate::http::handler::ArcHandler;
use crate::lifecycle::drain::DrainState;
use crate::metrics::MetricsCollector;

pub mod body_limit;
pub mod drain;
pub mod metrics;
pub mod recovery;
pub mod request_id;

pub use body_limit::BodyLimitMiddleware;
pub use drain::DrainMiddleware;
pub use metrics::MetricsMiddleware;
pub use recovery::RecoveryMiddleware;
pub use request_id::RequestIdMiddleware;

/// A named request wrapper. Implementations wrap the downstream handler and
/// may short-circuit, mutate the request, enrich the context or inspect the
/// response.
pub trait Middleware: Send + Sync + 'static {
    /// Stable name used in logs and route introspection.
    fn name(&self) -> &'static str;

    /// Wrap `next`, returning the composed handler.
    fn wrap(&self, next: ArcHandler) -> ArcHandler;
}

/// Fold a chain onto a handler. The first middleware in the slice becomes
/// the outermost wrapper.
pub fn apply(chain: &[Arc<dyn Middleware>], handler: ArcHandler) -> ArcHandler {
    chain.iter().rev().fold(handler, |next, mw| mw.wrap(next))
}

/// Built-in stack applied outside every domain and route chain.
pub fn base_stack(
    expose_panic_detail: bool,
    max_body_bytes: usize,
    drain: Arc<DrainState>,
    retry_after_secs: u64,
    collector: Arc<MetricsCollector>,
) -> Vec<Arc<dyn Middleware>> {
    // Drain sits outside the body limit so rejected requests are never
    // buffered first.
    vec![
        Arc::new(RecoveryMiddleware::new(expose_panic_detail)),
        Arc::new(RequestIdMiddleware::new()),
        Arc::new(DrainMiddleware::new(drain, retry_after_secs)),
        Arc::new(BodyLimitMiddleware::new(max_body_bytes)),
        Arc::new(MetricsMiddleware::new(collector)),
    ]
}
