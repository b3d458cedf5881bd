//! Handler capability interface.
//!
//! Routes store handlers as trait objects so the core never needs to know
//! what a handler does. Business handlers, health probes, and the metrics
//! endpoint all go through the same interface.

use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::http::context::RequestContext;

/// Shared, type-erased handler reference as stored in route tables.
pub type ArcHandler = Arc<dyn Handler>;

/// A request handler.
///
/// Implementations must be safe to invoke concurrently; the core spawns one
/// task per request and never serializes calls to the same handler.
pub trait Handler: Send + Sync + 'static {
    /// Handle a single request with its enriched context.
    fn call(&self, req: Request, ctx: RequestContext) -> BoxFuture<'static, Response>;
}

/// Any `Fn(Request, RequestContext) -> Future<Response>` closure is a handler.
///
/// This keeps registration lightweight: `Route::new(Method::GET, "/users",
/// |req, ctx| async move { ... })`.
impl<F, Fut> Handler for F
where
    F: Fn(Request, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request, ctx: RequestContext) -> BoxFuture<'static, Response> {
        Box::pin(self(req, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_closure_is_a_handler() {
        let handler: ArcHandler = Arc::new(|_req: Request, ctx: RequestContext| async move {
            let mut resp = Response::new(Body::from(ctx.request_id.clone()));
            *resp.status_mut() = StatusCode::OK;
            resp
        });

        let req = Request::builder().body(Body::empty()).unwrap();
        let resp = handler.call(req, RequestContext::for_tests()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
