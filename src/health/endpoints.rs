//! Handlers behind the built-in health endpoints.
//! Registered through the ordinary route API with raw paths, so they run
//! under the same middleware stack as everything else.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::StatusCode;
use serde_json::json;

use crate::health::registry::HealthRegistry;
use crate::http::context::RequestContext;
use crate::http::handler::ArcHandler;
use crate::http::response;
use crate::lifecycle::drain::DrainState;

/// Liveness: 200 while serving, 503 once draining so orchestrators stop
/// routing to an instance on its way out.
pub fn liveness_handler(drain: Arc<DrainState>) -> ArcHandler {
    Arc::new(move |_req: Request, _ctx: RequestContext| {
        let drain = Arc::clone(&drain);
        async move {
            if drain.is_draining() {
                response::json(
                    StatusCode::SERVICE_UNAVAILABLE,
                    &json!({ "status": "draining" }),
                )
            } else {
                response::json(StatusCode::OK, &json!({ "status": "ok" }))
            }
        }
    })
}

/// Readiness: run all registered checks and report the aggregate.
pub fn readiness_handler(registry: Arc<HealthRegistry>) -> ArcHandler {
    Arc::new(move |_req: Request, _ctx: RequestContext| {
        let registry = Arc::clone(&registry);
        async move {
            let report = registry.run_all().await;
            let status = if report.healthy() {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            let body = serde_json::to_value(&report)
                .unwrap_or_else(|_| json!({ "status": "unready" }));
            response::json(status, &body)
        }
    })
}
