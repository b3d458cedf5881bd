//! Route table with conflict detection.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::Request;
use axum::http::Method;
use axum::response::Response;
use serde::Serialize;

use crate::config::RunMode;
use crate::http::context::RequestContext;
use crate::http::handler::ArcHandler;
use crate::middleware::{self, Middleware};
use crate::routing::path;
use crate::routing::route::{Route, RouteDocs, RouteGroup};

/// Dispatch key: method plus fully resolved path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub method: Method,
    pub path: String,
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Errors raised while registering routes.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The key is already taken and strict mode refuses to overwrite.
    #[error("{method} {path} already registered at {registered_at_ms} ms since the epoch")]
    Conflict {
        method: Method,
        path: String,
        /// When the existing route was registered.
        registered_at_ms: u64,
    },
    /// The path still escapes the root after cleaning.
    #[error("invalid route path {path:?}")]
    InvalidPath { path: String },
}

pub type RouteResult<T> = Result<T, RouteError>;

/// Fully resolved route: final key, provenance and the handler with its
/// whole middleware chain already applied.
pub struct CompiledRoute {
    pub method: Method,
    pub path: String,
    /// Owning domain, empty for the top-level table.
    pub domain: String,
    pub category: String,
    pub tenant_id: Option<String>,
    pub registered_at_ms: u64,
    pub docs: Option<RouteDocs>,
    /// Set on OPTIONS handlers the table created itself for preflight.
    pub auto_options: bool,
    handler: ArcHandler,
}

impl CompiledRoute {
    pub async fn call(&self, req: Request, ctx: RequestContext) -> Response {
        self.handler.call(req, ctx).await
    }
}

impl fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("domain", &self.domain)
            .field("category", &self.category)
            .field("tenant_id", &self.tenant_id)
            .field("registered_at_ms", &self.registered_at_ms)
            .field("auto_options", &self.auto_options)
            .finish()
    }
}

/// Serializable view of one compiled route, for introspection and startup
/// logging.
#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub method: String,
    pub path: String,
    pub domain: String,
    pub category: String,
    pub tenant_id: Option<String>,
    pub auto_options: bool,
    pub registered_at_ms: u64,
}

/// One table per domain (plus the top-level one). Writes happen during
/// startup registration, reads on every dispatch.
pub struct RouteTable {
    domain: String,
    mode: RunMode,
    base_path: String,
    version: String,
    base_middleware: Vec<Arc<dyn Middleware>>,
    domain_middleware: Vec<Arc<dyn Middleware>>,
    routes: RwLock<HashMap<RouteKey, Arc<CompiledRoute>>>,
}

impl RouteTable {
    pub fn new(
        domain: impl Into<String>,
        mode: RunMode,
        base_path: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            mode,
            base_path: base_path.into(),
            version: version.into(),
            base_middleware: Vec::new(),
            domain_middleware: Vec::new(),
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Install the server-wide built-in chain, outermost for every route.
    pub fn with_base_middleware(mut self, chain: Vec<Arc<dyn Middleware>>) -> Self {
        self.base_middleware = chain;
        self
    }

    /// Install the domain chain, nested inside the base chain.
    pub fn with_domain_middleware(mut self, chain: Vec<Arc<dyn Middleware>>) -> Self {
        self.domain_middleware = chain;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Register one route and, for non-OPTIONS methods, an automatic
    /// preflight OPTIONS handler on the same path. Duplicate keys fail in
    /// strict mode and overwrite with a warning in lenient mode; an
    /// explicit OPTIONS route always replaces an automatic one silently.
    pub fn register(&self, route: Route) -> RouteResult<()> {
        let effective = self.effective_path(&route)?;
        let key = RouteKey {
            method: route.method.clone(),
            path: effective.clone(),
        };

        let mut chain: Vec<Arc<dyn Middleware>> = Vec::with_capacity(
            self.base_middleware.len() + self.domain_middleware.len() + route.middleware.len(),
        );
        chain.extend(self.base_middleware.iter().cloned());
        chain.extend(self.domain_middleware.iter().cloned());
        chain.extend(route.middleware.iter().cloned());

        let compiled = Arc::new(CompiledRoute {
            method: route.method.clone(),
            path: effective.clone(),
            domain: self.domain.clone(),
            category: route.category.clone(),
            tenant_id: route.tenant_id.clone(),
            registered_at_ms: unix_millis(),
            docs: route.docs.clone(),
            auto_options: false,
            handler: middleware::apply(&chain, Arc::clone(&route.handler)),
        });

        let mut routes = self.routes.write().expect("route table lock poisoned");
        if let Some(existing) = routes.get(&key) {
            if !existing.auto_options {
                match self.mode {
                    RunMode::Development => {
                        return Err(RouteError::Conflict {
                            method: key.method,
                            path: key.path,
                            registered_at_ms: existing.registered_at_ms,
                        });
                    }
                    RunMode::Production => {
                        tracing::warn!(
                            route = %key,
                            domain = %self.domain,
                            "Overwriting already-registered route"
                        );
                    }
                }
            }
        }
        tracing::debug!(route = %key, domain = %self.domain, "Route registered");
        routes.insert(key, compiled);

        if route.method != Method::OPTIONS {
            let options_key = RouteKey {
                method: Method::OPTIONS,
                path: effective.clone(),
            };
            // First registration on a path wins; explicit OPTIONS handlers
            // are never replaced by automatic ones.
            if !routes.contains_key(&options_key) {
                let preflight: ArcHandler =
                    Arc::new(|_req: Request, _ctx: RequestContext| async {
                        Response::new(Body::empty())
                    });
                routes.insert(
                    options_key,
                    Arc::new(CompiledRoute {
                        method: Method::OPTIONS,
                        path: effective,
                        domain: self.domain.clone(),
                        category: route.category,
                        tenant_id: route.tenant_id,
                        registered_at_ms: unix_millis(),
                        docs: None,
                        auto_options: true,
                        handler: middleware::apply(&chain, preflight),
                    }),
                );
            }
        }
        Ok(())
    }

    /// Register every route in the group; stops at the first failure.
    pub fn register_group(&self, group: RouteGroup) -> RouteResult<()> {
        for route in group.flatten() {
            self.register(route)?;
        }
        Ok(())
    }

    /// Exact lookup on an already-sanitized request path.
    pub fn lookup(&self, method: &Method, sanitized_path: &str) -> Option<Arc<CompiledRoute>> {
        let routes = self.routes.read().expect("route table lock poisoned");
        routes
            .get(&RouteKey {
                method: method.clone(),
                path: sanitized_path.to_string(),
            })
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.read().expect("route table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All compiled routes, ordered by path then method.
    pub fn summaries(&self) -> Vec<RouteSummary> {
        let routes = self.routes.read().expect("route table lock poisoned");
        let mut out: Vec<RouteSummary> = routes
            .values()
            .map(|r| RouteSummary {
                method: r.method.to_string(),
                path: r.path.clone(),
                domain: r.domain.clone(),
                category: r.category.clone(),
                tenant_id: r.tenant_id.clone(),
                auto_options: r.auto_options,
                registered_at_ms: r.registered_at_ms,
            })
            .collect();
        out.sort_by(|a, b| (&a.path, &a.method).cmp(&(&b.path, &b.method)));
        out
    }

    fn effective_path(&self, route: &Route) -> RouteResult<String> {
        let joined = if route.flags.raw_path {
            route.path.clone()
        } else {
            let base = if route.flags.skip_base_path {
                ""
            } else {
                self.base_path.as_str()
            };
            let version = if route.flags.skip_version_prefix {
                ""
            } else {
                self.version.as_str()
            };
            path::join(&[base, version, &route.path])
        };
        path::normalize(&joined).ok_or_else(|| RouteError::InvalidPath {
            path: route.path.clone(),
        })
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
