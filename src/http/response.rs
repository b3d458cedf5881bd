//! Small response constructors shared across the crate.
//! All of them build through infallible `Response` mutation, so no layer
//! needs to handle builder errors for values it just produced.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;

/// JSON body with the given status.
pub fn json(status: StatusCode, body: &serde_json::Value) -> Response {
    let mut resp = Response::new(Body::from(body.to_string()));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    resp
}

/// Empty body with the given status.
pub fn empty(status: StatusCode) -> Response {
    let mut resp = Response::new(Body::empty());
    *resp.status_mut() = status;
    resp
}

/// Plain-text body with the given status.
pub fn text(status: StatusCode, body: impl Into<String>) -> Response {
    let mut resp = Response::new(Body::from(body.into()));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}

/// 308 to `location`. Falls back to a bare 308 when the target cannot be
/// carried in a header, which only happens for non-ASCII configuration.
pub fn permanent_redirect(location: &str) -> Response {
    let mut resp = empty(StatusCode::PERMANENT_REDIRECT);
    match HeaderValue::from_str(location) {
        Ok(value) => {
            resp.headers_mut().insert(header::LOCATION, value);
        }
        Err(_) => {
            tracing::warn!(location, "Redirect target not header-safe, dropping Location");
        }
    }
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_sets_status_and_content_type() {
        let resp = json(StatusCode::NOT_FOUND, &json!({ "error": "not found" }));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_permanent_redirect_carries_location() {
        let resp = permanent_redirect("https://canonical.example.com/api/v1/users?x=1");
        assert_eq!(resp.status(), StatusCode::PERMANENT_REDIRECT);
        assert_eq!(
            resp.headers()[header::LOCATION],
            "https://canonical.example.com/api/v1/users?x=1"
        );
    }
}
