//! Panic recovery.
//! Outermost layer of the built-in stack: a panicking handler becomes a
//! structured 500 instead of a dropped connection.

use std::any::Any;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::StatusCode;
use futures_util::FutureExt;
use serde_json::json;

use super::Middleware;
use crate::http::context::RequestContext;
use crate::http::handler::ArcHandler;
use crate::http::response;

pub struct RecoveryMiddleware {
    /// Include the panic message in the response body. Enabled in
    /// development mode, never in production.
    expose_detail: bool,
}

impl RecoveryMiddleware {
    pub fn new(expose_detail: bool) -> Self {
        Self { expose_detail }
    }
}

impl Middleware for RecoveryMiddleware {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn wrap(&self, next: ArcHandler) -> ArcHandler {
        let expose_detail = self.expose_detail;
        Arc::new(move |req: Request, ctx: RequestContext| {
            let next = Arc::clone(&next);
            // The id is cloned out up front so the report never depends on
            // state the panic may have taken down with it.
            let request_id = ctx.request_id.clone();
            async move {
                let outcome = std::panic::AssertUnwindSafe(async move {
                    next.call(req, ctx).await
                })
                .catch_unwind()
                .await;

                match outcome {
                    Ok(resp) => resp,
                    Err(panic) => {
                        let detail = panic_message(panic.as_ref());
                        tracing::error!(
                            request_id = %request_id,
                            panic = %detail,
                            "Handler panicked"
                        );
                        let body = if expose_detail {
                            json!({
                                "error": "internal server error",
                                "request_id": request_id,
                                "detail": detail,
                            })
                        } else {
                            json!({
                                "error": "internal server error",
                                "request_id": request_id,
                            })
                        };
                        response::json(StatusCode::INTERNAL_SERVER_ERROR, &body)
                    }
                }
            }
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
