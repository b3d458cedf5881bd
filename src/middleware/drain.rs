//! Drain gate.
//!
//! Once shutdown begins this layer answers 503 for new work while the
//! in-flight guard keeps already-admitted requests visible to the
//! coordinator until they finish.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use serde_json::json;

use super::Middleware;
use crate::http::context::RequestContext;
use crate::http::handler::ArcHandler;
use crate::http::response;
use crate::lifecycle::drain::DrainState;

pub struct DrainMiddleware {
    state: Arc<DrainState>,
    retry_after_secs: u64,
}

impl DrainMiddleware {
    pub fn new(state: Arc<DrainState>, retry_after_secs: u64) -> Self {
        Self {
            state,
            retry_after_secs,
        }
    }
}

impl Middleware for DrainMiddleware {
    fn name(&self) -> &'static str {
        "drain"
    }

    fn wrap(&self, next: ArcHandler) -> ArcHandler {
        let state = Arc::clone(&self.state);
        let retry_after_secs = self.retry_after_secs;
        Arc::new(move |req: Request, ctx: RequestContext| {
            let next = Arc::clone(&next);
            let state = Arc::clone(&state);
            async move {
                // Count first, check second: the coordinator's idle wait can
                // never miss a request that slipped past the flag read.
                let guard = state.track();
                if state.is_draining() {
                    drop(guard);
                    tracing::debug!(
                        request_id = %ctx.request_id,
                        "Rejecting request, server is draining"
                    );
                    let mut resp = response::json(
                        StatusCode::SERVICE_UNAVAILABLE,
                        &json!({ "error": "server is shutting down" }),
                    );
                    resp.headers_mut().insert(
                        header::RETRY_AFTER,
                        HeaderValue::from(retry_after_secs),
                    );
                    return resp;
                }

                let resp = next.call(req, ctx).await;
                drop(guard);
                resp
            }
        })
    }
}
