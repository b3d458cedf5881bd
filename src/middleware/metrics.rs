//! Per-request metrics recording.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;

use super::Middleware;
use crate::http::context::RequestContext;
use crate::http::handler::ArcHandler;
use crate::metrics::MetricsCollector;

/// Innermost built-in layer: times the handler, bumps the executing gauge
/// and records the outcome once the response exists.
pub struct MetricsMiddleware {
    collector: Arc<MetricsCollector>,
}

impl MetricsMiddleware {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }
}

impl Middleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn wrap(&self, next: ArcHandler) -> ArcHandler {
        let collector = Arc::clone(&self.collector);
        Arc::new(move |req: Request, ctx: RequestContext| {
            let next = Arc::clone(&next);
            let collector = Arc::clone(&collector);
            async move {
                let started = Instant::now();
                let method = req.method().clone();
                // Endpoint label comes from the registered route, not the raw
                // request path, so per-route cardinality stays bounded.
                let endpoint = ctx.route.path.clone();

                let guard = collector.executing_guard();
                let resp = next.call(req, ctx).await;
                drop(guard);

                // Read everything into locals while the response is still
                // ours; downstream layers may consume it immediately.
                let status = resp.status();
                let duration = started.elapsed();
                collector.record(&method, &endpoint, status, duration);
                resp
            }
        })
    }
}
