//! Request-scoped context.
//!
//! # Responsibilities
//! - Carry the values the core promises to every handler: request id,
//!   client IP, resolved domain, tenant id, API version, base path, and
//!   route metadata
//! - Stay cheap to clone (middleware pass it inward by value)
//!
//! # Design Decisions
//! - Explicit record threaded through the chain, never ambient state
//! - Immutable once built; enrichment produces a new value

use std::net::IpAddr;

use axum::http::Method;

/// Metadata about the matched route, forwarded for downstream logging.
#[derive(Debug, Clone)]
pub struct RouteInfo {
    pub method: Method,
    /// Final registered path pattern, not the raw request path.
    pub path: String,
    pub category: String,
}

impl RouteInfo {
    pub fn new(method: Method, path: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            category: category.into(),
        }
    }
}

/// Immutable per-request record built by the dispatcher before the
/// middleware chain runs.
///
/// The request id is seeded here so the outermost recovery layer can always
/// report it, even when a panic unwinds before any inner middleware ran.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub client_ip: IpAddr,
    /// Resolved domain name; empty for the top-level route table.
    pub domain: String,
    pub tenant_id: Option<String>,
    pub api_version: String,
    pub base_path: String,
    pub route: RouteInfo,
}

impl RequestContext {
    /// Context with placeholder values for unit tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            request_id: "test-request".to_string(),
            client_ip: IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            domain: String::new(),
            tenant_id: None,
            api_version: "v1".to_string(),
            base_path: "/api".to_string(),
            route: RouteInfo::new(Method::GET, "/", "test"),
        }
    }
}
