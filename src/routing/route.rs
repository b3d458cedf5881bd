//! Route definitions as accepted by the registration API.

use std::sync::Arc;

use axum::http::Method;

use crate::http::handler::{ArcHandler, Handler};
use crate::middleware::Middleware;

/// Per-route registration switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteFlags {
    /// Do not prepend the table's base path.
    pub skip_base_path: bool,
    /// Do not prepend the table's version segment.
    pub skip_version_prefix: bool,
    /// Register the path exactly as written: no base path, no version.
    pub raw_path: bool,
}

/// Optional documentation metadata attached to a route, surfaced through
/// route introspection.
#[derive(Debug, Clone, Default)]
pub struct RouteDocs {
    pub summary: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// A route as handed to `register`. Immutable once registered; the table
/// keeps only the compiled form.
pub struct Route {
    pub method: Method,
    pub path: String,
    pub handler: ArcHandler,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub category: String,
    pub flags: RouteFlags,
    pub tenant_id: Option<String>,
    pub docs: Option<RouteDocs>,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>, handler: impl Handler) -> Self {
        Self::from_handler(method, path, Arc::new(handler))
    }

    /// Route around an already-shared handler. Built-in endpoints are
    /// constructed this way.
    pub fn from_handler(method: Method, path: impl Into<String>, handler: ArcHandler) -> Self {
        Self {
            method,
            path: path.into(),
            handler,
            middleware: Vec::new(),
            category: String::new(),
            flags: RouteFlags::default(),
            tenant_id: None,
            docs: None,
        }
    }

    /// Append a middleware to this route's chain (runs inside the base and
    /// domain chains, in the order added).
    pub fn middleware(mut self, mw: impl Middleware) -> Self {
        self.middleware.push(Arc::new(mw));
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn docs(mut self, docs: RouteDocs) -> Self {
        self.docs = Some(docs);
        self
    }

    pub fn skip_base_path(mut self) -> Self {
        self.flags.skip_base_path = true;
        self
    }

    pub fn skip_version_prefix(mut self) -> Self {
        self.flags.skip_version_prefix = true;
        self
    }

    /// Page-style route: no base path, no version prefix.
    pub fn raw_path(mut self) -> Self {
        self.flags.raw_path = true;
        self
    }
}

/// Routes sharing a path prefix and middleware set, registered in one call.
pub struct RouteGroup {
    pub prefix: String,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub category: Option<String>,
    pub routes: Vec<Route>,
}

impl RouteGroup {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            middleware: Vec::new(),
            category: None,
            routes: Vec::new(),
        }
    }

    pub fn middleware(mut self, mw: impl Middleware) -> Self {
        self.middleware.push(Arc::new(mw));
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Flatten into plain routes: prefix applied to each path, group
    /// middleware wrapping outside each route's own, group category filling
    /// any route that did not set one.
    pub fn flatten(self) -> Vec<Route> {
        let Self {
            prefix,
            middleware,
            category,
            routes,
        } = self;
        routes
            .into_iter()
            .map(|mut route| {
                route.path = super::path::join(&[&prefix, &route.path]);
                let mut chain = middleware.clone();
                chain.append(&mut route.middleware);
                route.middleware = chain;
                if route.category.is_empty() {
                    if let Some(cat) = &category {
                        route.category = cat.clone();
                    }
                }
                route
            })
            .collect()
    }
}
