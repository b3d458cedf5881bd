//! Request id propagation.
//!
//! The id itself is minted (or adopted from the client) when the request
//! context is built, before any middleware runs. This layer only reflects
//! it back to the caller.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::HeaderValue;

use super::Middleware;
use crate::http::context::RequestContext;
use crate::http::handler::ArcHandler;

/// Header carrying the request id in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Accept an inbound id only when it is printable ASCII of sane length.
pub fn valid_request_id(candidate: &str) -> bool {
    (1..=128).contains(&candidate.len())
        && candidate.bytes().all(|b| b.is_ascii_graphic())
}

#[derive(Debug, Default)]
pub struct RequestIdMiddleware;

impl RequestIdMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request-id"
    }

    fn wrap(&self, next: ArcHandler) -> ArcHandler {
        Arc::new(move |req: Request, ctx: RequestContext| {
            let next = Arc::clone(&next);
            async move {
                let request_id = ctx.request_id.clone();
                let mut resp = next.call(req, ctx).await;
                if let Ok(value) = HeaderValue::from_str(&request_id) {
                    resp.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                resp
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::response::Response;

    #[tokio::test]
    async fn test_response_carries_context_id() {
        let handler: ArcHandler = Arc::new(|_req: Request, _ctx: RequestContext| async {
            Response::new(Body::empty())
        });
        let wrapped = RequestIdMiddleware::new().wrap(handler);

        let ctx = RequestContext::for_tests();
        let expected = ctx.request_id.clone();
        let resp = wrapped.call(Request::new(Body::empty()), ctx).await;

        assert_eq!(
            resp.headers()[REQUEST_ID_HEADER],
            HeaderValue::from_str(&expected).unwrap()
        );
    }

    #[test]
    fn test_inbound_id_validation() {
        assert!(valid_request_id("req-1234"));
        assert!(valid_request_id(&"a".repeat(128)));
        assert!(!valid_request_id(""));
        assert!(!valid_request_id(&"a".repeat(129)));
        assert!(!valid_request_id("has space"));
        assert!(!valid_request_id("newline\n"));
    }
}
