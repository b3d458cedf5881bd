//! Request body size limit.
//!
//! Rejects with 413 before the handler runs: first on the declared
//! Content-Length, then while buffering bodies that never declared one.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::Response;
use serde_json::json;

use super::Middleware;
use crate::http::context::RequestContext;
use crate::http::handler::ArcHandler;
use crate::http::response;

pub struct BodyLimitMiddleware {
    max_bytes: usize,
}

impl BodyLimitMiddleware {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl Middleware for BodyLimitMiddleware {
    fn name(&self) -> &'static str {
        "body-limit"
    }

    fn wrap(&self, next: ArcHandler) -> ArcHandler {
        let max_bytes = self.max_bytes;
        Arc::new(move |req: Request, ctx: RequestContext| {
            let next = Arc::clone(&next);
            async move {
                let declared = req
                    .headers()
                    .get(header::CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                if let Some(len) = declared {
                    if len > max_bytes as u64 {
                        tracing::debug!(
                            request_id = %ctx.request_id,
                            declared = len,
                            max_bytes,
                            "Declared body length over limit"
                        );
                        return too_large(max_bytes);
                    }
                }

                // Chunked or lying clients: buffer up to the limit and stop.
                let (parts, body) = req.into_parts();
                match axum::body::to_bytes(body, max_bytes).await {
                    Ok(bytes) => {
                        let req = Request::from_parts(parts, Body::from(bytes));
                        next.call(req, ctx).await
                    }
                    Err(err) => {
                        tracing::debug!(
                            request_id = %ctx.request_id,
                            max_bytes,
                            error = %err,
                            "Body read stopped at limit"
                        );
                        too_large(max_bytes)
                    }
                }
            }
        })
    }
}

fn too_large(max_bytes: usize) -> Response {
    response::json(
        StatusCode::PAYLOAD_TOO_LARGE,
        &json!({ "error": "request body too large", "max_bytes": max_bytes }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_handler() -> ArcHandler {
        Arc::new(|req: Request, _ctx: RequestContext| async move {
            let bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
                .await
                .unwrap();
            Response::new(Body::from(bytes))
        })
    }

    #[tokio::test]
    async fn test_small_bodies_pass_through() {
        let wrapped = BodyLimitMiddleware::new(64).wrap(echo_handler());
        let resp = wrapped
            .call(
                Request::new(Body::from("hello")),
                RequestContext::for_tests(),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_declared_oversize_rejected_without_reading() {
        let wrapped = BodyLimitMiddleware::new(8).wrap(echo_handler());
        let mut req = Request::new(Body::from("0123456789abcdef"));
        req.headers_mut()
            .insert(header::CONTENT_LENGTH, "16".parse().unwrap());

        let resp = wrapped.call(req, RequestContext::for_tests()).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_undeclared_oversize_rejected_while_buffering() {
        let wrapped = BodyLimitMiddleware::new(8).wrap(echo_handler());
        // Request::new attaches no Content-Length, so only buffering can
        // catch this one.
        let req = Request::new(Body::from("0123456789abcdef"));

        let resp = wrapped.call(req, RequestContext::for_tests()).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
