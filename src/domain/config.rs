//! Domain declarations as accepted by `register_domain`.

use std::path::PathBuf;
use std::sync::Arc;

use crate::middleware::Middleware;
use crate::routing::{Route, RouteGroup};

/// Certificate material for one domain, loaded eagerly at registration.
#[derive(Debug, Clone)]
pub struct DomainTls {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Everything a virtual host brings along: routes, middleware, overrides
/// for the path prefixes, optional TLS identity, tenant attribution or a
/// redirect target. Consumed by `Server::register_domain`.
pub struct DomainConfig {
    /// Exact host (`api.example.com`) or wildcard (`*.example.com`).
    pub name: String,
    /// Serve requests whose host matches no registered domain.
    pub default: bool,
    /// Base-path override; the server default applies when unset.
    pub base_path: Option<String>,
    /// Version-segment override; the server default applies when unset.
    pub version: Option<String>,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub routes: Vec<Route>,
    pub groups: Vec<RouteGroup>,
    pub tls: Option<DomainTls>,
    pub tenant_id: Option<String>,
    /// Answer every request with a permanent redirect to this host.
    pub redirect_to: Option<String>,
}

impl DomainConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: false,
            base_path: None,
            version: None,
            middleware: Vec::new(),
            routes: Vec::new(),
            groups: Vec::new(),
            tls: None,
            tenant_id: None,
            redirect_to: None,
        }
    }

    pub fn default_domain(mut self) -> Self {
        self.default = true;
        self
    }

    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn middleware(mut self, mw: impl Middleware) -> Self {
        self.middleware.push(Arc::new(mw));
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn group(mut self, group: RouteGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn tls(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.tls = Some(DomainTls {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        });
        self
    }

    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn redirect_to(mut self, host: impl Into<String>) -> Self {
        self.redirect_to = Some(host.into());
        self
    }
}
