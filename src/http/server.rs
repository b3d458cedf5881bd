//! HTTP server setup and dispatch.
//!
//! # Responsibilities
//! - Assemble every subsystem from a validated [`ServerConfig`]
//! - Create the Axum router with the catch-all dispatch handler
//! - Resolve the Host header to a domain, then its route table
//! - Build the per-request context (request id, client IP, tenant)
//! - Bind plain or TLS listeners via axum-server
//! - Run the shutdown coordinator alongside the listener
//!
//! # Data Flow
//! ```text
//! request
//!     → built-in path (healthz/readyz/metrics) → top-level table, any host
//!     → Host header → DomainRegistry::resolve
//!         ├─ redirect domain → 308 + Location
//!         └─ route table lookup (sanitized path)
//!              ├─ hit  → RequestContext → compiled chain → handler
//!              └─ miss → 404 (recorded at the dispatch boundary)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, Method, StatusCode};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use http_body::Body as _;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::{RunMode, ServerConfig};
use crate::domain::{DomainConfig, DomainError, DomainHandler, DomainRegistry};
use crate::health::{endpoints, HealthCheck, HealthRegistry};
use crate::http::context::{RequestContext, RouteInfo};
use crate::http::metering::{self, MeterRecord, MeteringHook};
use crate::http::response;
use crate::lifecycle::drain::DrainState;
use crate::lifecycle::ShutdownCoordinator;
use crate::metrics::{MetricsCollector, MetricsOptions};
use crate::middleware::{self, Middleware};
use crate::middleware::request_id::{valid_request_id, REQUEST_ID_HEADER};
use crate::net::tls::{self, CertStore, TlsError};
use crate::routing::{path, Route, RouteError, RouteGroup, RouteResult, RouteSummary, RouteTable};

/// Errors raised while assembling or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Tls(#[from] TlsError),
    /// The configured bind address does not parse as `host:port`.
    #[error("invalid bind address {address:?}")]
    InvalidBindAddress { address: String },
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Application state injected into the dispatch handler.
#[derive(Clone)]
struct AppState {
    registry: Arc<DomainRegistry>,
    top_level: Arc<RouteTable>,
    collector: Arc<MetricsCollector>,
    metering: Option<Arc<dyn MeteringHook>>,
    /// Normalized built-in endpoint paths. These answer for every host,
    /// ahead of domain resolution.
    builtin_paths: Arc<Vec<String>>,
    /// Scheme used in redirect targets, fixed at startup by whether the
    /// listener terminates TLS.
    scheme: &'static str,
}

/// The assembled serving core: domain registry, route tables, metrics,
/// health checks, TLS identities and the shutdown coordinator.
pub struct Server {
    config: ServerConfig,
    registry: Arc<DomainRegistry>,
    top_level: Arc<RouteTable>,
    collector: Arc<MetricsCollector>,
    health: Arc<HealthRegistry>,
    coordinator: Arc<ShutdownCoordinator>,
    cert_store: Arc<CertStore>,
    base_middleware: Vec<Arc<dyn Middleware>>,
    metering: Option<Arc<dyn MeteringHook>>,
    handle: Handle,
}

impl Server {
    /// Assemble every subsystem from a validated configuration.
    ///
    /// TLS certificates referenced by the config are loaded eagerly, so a
    /// missing file fails here rather than at the first handshake.
    pub fn from_config(config: ServerConfig) -> ServerResult<Self> {
        let drain = Arc::new(DrainState::default());
        let collector = Arc::new(MetricsCollector::new(
            MetricsOptions {
                namespace: config.metrics.namespace.clone(),
                subsystem: config.metrics.subsystem.clone(),
                max_endpoints: config.metrics.max_endpoints,
                sample_capacity: config.metrics.sample_capacity,
                aggregate_paths: config.metrics.aggregate_paths,
            },
            Arc::clone(&drain),
        ));
        let health = Arc::new(HealthRegistry::new(Duration::from_secs(
            config.health.check_timeout_secs,
        )));
        let coordinator = Arc::new(ShutdownCoordinator::new(
            Arc::clone(&drain),
            Duration::from_secs(config.shutdown.timeout_secs),
        ));

        let base_middleware = middleware::base_stack(
            config.routing.mode == RunMode::Development,
            config.limits.max_body_bytes,
            Arc::clone(&drain),
            config.shutdown.retry_after_secs,
            Arc::clone(&collector),
        );

        let top_level = Arc::new(
            RouteTable::new(
                "",
                config.routing.mode,
                &config.routing.base_path,
                &config.routing.version,
            )
            .with_base_middleware(base_middleware.clone()),
        );

        let cert_store = Arc::new(CertStore::new());
        if let Some(tls) = &config.listener.tls {
            if let (Some(cert), Some(key)) = (&tls.cert_path, &tls.key_path) {
                cert_store.load_fallback(cert, key)?;
            }
            for entry in &tls.domains {
                cert_store.load_domain(&entry.domain, &entry.cert_path, &entry.key_path)?;
            }
        }

        let server = Self {
            config,
            registry: Arc::new(DomainRegistry::new()),
            top_level,
            collector,
            health,
            coordinator,
            cert_store,
            base_middleware,
            metering: None,
            handle: Handle::new(),
        };
        server.register_builtin_routes()?;
        Ok(server)
    }

    /// Install a per-request metering hook, invoked once per completed
    /// request on a detached task.
    pub fn with_metering(mut self, hook: impl MeteringHook) -> Self {
        self.metering = Some(Arc::new(hook));
        self
    }

    /// Register one route on the top-level table.
    pub fn register(&self, route: Route) -> RouteResult<()> {
        self.top_level.register(route)
    }

    /// Register a group of routes on the top-level table.
    pub fn register_group(&self, group: RouteGroup) -> RouteResult<()> {
        self.top_level.register_group(group)
    }

    /// Register a domain: build its route table (base chain outermost,
    /// then the domain chain), load its TLS identity if configured, and
    /// insert it into the registry.
    pub fn register_domain(&self, config: DomainConfig) -> ServerResult<()> {
        let base_path = config
            .base_path
            .clone()
            .unwrap_or_else(|| self.config.routing.base_path.clone());
        let version = config
            .version
            .clone()
            .unwrap_or_else(|| self.config.routing.version.clone());

        let table = RouteTable::new(&config.name, self.config.routing.mode, &base_path, &version)
            .with_base_middleware(self.base_middleware.clone())
            .with_domain_middleware(config.middleware.clone());
        for route in config.routes {
            table.register(route)?;
        }
        for group in config.groups {
            table.register_group(group)?;
        }

        if let Some(tls) = &config.tls {
            self.cert_store
                .load_domain(&config.name, &tls.cert_path, &tls.key_path)?;
        }

        tracing::info!(
            domain = %config.name,
            routes = table.len(),
            redirect = config.redirect_to.is_some(),
            "Domain table built"
        );
        self.registry.insert(
            Arc::new(DomainHandler {
                name: config.name,
                table,
                tenant_id: config.tenant_id,
                redirect_to: config.redirect_to,
                base_path,
                version,
            }),
            config.default,
        )?;
        Ok(())
    }

    /// Add a readiness check, reported by the readiness endpoint.
    pub fn register_health_check(&self, check: impl HealthCheck) {
        self.health.register(check);
    }

    /// Shutdown coordinator, for resource registration and programmatic
    /// triggering.
    pub fn coordinator(&self) -> Arc<ShutdownCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Handle controlling the bound listener. `listening()` resolves to
    /// the local address once the socket is up.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.collector)
    }

    /// Compiled top-level routes, for diagnostics and startup logging.
    pub fn routes(&self) -> Vec<RouteSummary> {
        self.top_level.summaries()
    }

    /// Compiled routes of one registered domain.
    pub fn domain_routes(&self, name: &str) -> Option<Vec<RouteSummary>> {
        self.registry.resolve(name).map(|d| d.table.summaries())
    }

    /// Bind and serve until shutdown completes. The shutdown coordinator
    /// runs alongside the listener and closes it once a signal or a
    /// programmatic trigger arrives.
    pub async fn serve(self) -> ServerResult<()> {
        let address: SocketAddr = self
            .config
            .listener
            .bind_address
            .parse()
            .map_err(|_| ServerError::InvalidBindAddress {
                address: self.config.listener.bind_address.clone(),
            })?;

        let tls_enabled = !self.cert_store.is_empty();
        let router = Self::build_router(&self.config, self.app_state(tls_enabled));

        let handle = self.handle.clone();
        let coordinator = Arc::clone(&self.coordinator);
        let watcher = handle.clone();
        let lifecycle = tokio::spawn(async move {
            coordinator.run(watcher).await;
        });

        tracing::info!(
            address = %address,
            tls = tls_enabled,
            domains = self.registry.len(),
            routes = self.top_level.len(),
            "Server starting"
        );

        let make_service = router.into_make_service_with_connect_info::<SocketAddr>();
        let served = if tls_enabled {
            let rustls_config =
                RustlsConfig::from_config(tls::server_config(Arc::clone(&self.cert_store)));
            axum_server::bind_rustls(address, rustls_config)
                .handle(handle)
                .serve(make_service)
                .await
        } else {
            axum_server::bind(address)
                .handle(handle)
                .serve(make_service)
                .await
        };
        if let Err(err) = served {
            // Accept loop died on its own; stop the coordinator's signal
            // wait instead of leaking it.
            lifecycle.abort();
            return Err(err.into());
        }

        // The listener only stops through the coordinator, so the rest of
        // the sequence (resource closes, callbacks) is already underway.
        // Wait it out, so callers observe a fully shut-down server.
        let _ = lifecycle.await;

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Liveness, readiness and metrics endpoints, registered through the
    /// same route API as everything else.
    fn register_builtin_routes(&self) -> RouteResult<()> {
        self.top_level.register(
            Route::from_handler(
                Method::GET,
                &self.config.health.liveness_path,
                endpoints::liveness_handler(self.coordinator.drain_state()),
            )
            .category("builtin")
            .raw_path(),
        )?;
        self.top_level.register(
            Route::from_handler(
                Method::GET,
                &self.config.health.readiness_path,
                endpoints::readiness_handler(Arc::clone(&self.health)),
            )
            .category("builtin")
            .raw_path(),
        )?;
        if self.config.metrics.enabled {
            let collector = Arc::clone(&self.collector);
            self.top_level.register(
                Route::new(
                    Method::GET,
                    &self.config.metrics.path,
                    move |_req: Request, _ctx: RequestContext| {
                        let collector = Arc::clone(&collector);
                        async move { response::text(StatusCode::OK, collector.render()) }
                    },
                )
                .category("builtin")
                .raw_path(),
            )?;
        }
        Ok(())
    }

    /// The built-in paths in their normalized form, matching the dispatch
    /// keys `register_builtin_routes` produced.
    fn builtin_paths(&self) -> Vec<String> {
        let mut paths = vec![
            self.config.health.liveness_path.clone(),
            self.config.health.readiness_path.clone(),
        ];
        if self.config.metrics.enabled {
            paths.push(self.config.metrics.path.clone());
        }
        paths.iter().filter_map(|p| path::normalize(p)).collect()
    }

    fn app_state(&self, tls_enabled: bool) -> AppState {
        AppState {
            registry: Arc::clone(&self.registry),
            top_level: Arc::clone(&self.top_level),
            collector: Arc::clone(&self.collector),
            metering: self.metering.clone(),
            builtin_paths: Arc::new(self.builtin_paths()),
            scheme: if tls_enabled { "https" } else { "http" },
        }
    }

    /// Build the Axum router: one catch-all dispatch route plus the
    /// transport layers (timeout, tracing).
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }
}

/// Catch-all handler: resolve the domain, look up the route, build the
/// context and run the compiled chain.
async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let started = Instant::now();

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        // HTTP/2 carries the host in the URI authority instead.
        .or_else(|| request.uri().authority().map(|a| a.to_string()));

    let sanitized = path::sanitize_request_path(request.uri().path());
    let method = request.method().clone();

    // Built-in endpoints are host-agnostic: orchestrator health traffic
    // must reach them under any Host header, including ones a default or
    // redirect domain would otherwise capture. They stay on the top-level
    // table.
    let domain = if state.builtin_paths.iter().any(|p| *p == sanitized) {
        None
    } else {
        host.as_deref().and_then(|h| state.registry.resolve(h))
    };

    if let Some(domain) = &domain {
        if let Some(target) = &domain.redirect_to {
            let path_and_query = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            let location = format!("{}://{}{}", state.scheme, target, path_and_query);
            tracing::debug!(domain = %domain.name, target = %target, "Redirecting request");
            state.collector.record(
                &method,
                &sanitized,
                StatusCode::PERMANENT_REDIRECT,
                started.elapsed(),
            );
            return response::permanent_redirect(&location);
        }
    }

    let (table, domain_name, domain_tenant, base_path, version) = match &domain {
        Some(d) => (
            &d.table,
            d.name.as_str(),
            d.tenant_id.clone(),
            d.base_path.as_str(),
            d.version.as_str(),
        ),
        None => (
            state.top_level.as_ref(),
            "",
            None,
            state.top_level.base_path(),
            state.top_level.version(),
        ),
    };

    let route = match table.lookup(&method, &sanitized) {
        Some(route) => route,
        None => {
            tracing::debug!(
                method = %method,
                path = %sanitized,
                domain = %domain_name,
                "No route matched"
            );
            state
                .collector
                .record(&method, &sanitized, StatusCode::NOT_FOUND, started.elapsed());
            return response::json(
                StatusCode::NOT_FOUND,
                &serde_json::json!({ "error": "no route matches the request" }),
            );
        }
    };

    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| valid_request_id(v))
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let ctx = RequestContext {
        request_id,
        client_ip: addr.ip(),
        domain: domain_name.to_string(),
        tenant_id: route.tenant_id.clone().or(domain_tenant),
        api_version: version.to_string(),
        base_path: base_path.to_string(),
        route: RouteInfo::new(route.method.clone(), route.path.clone(), route.category.clone()),
    };

    tracing::debug!(
        request_id = %ctx.request_id,
        method = %method,
        path = %sanitized,
        domain = %domain_name,
        route = %route.path,
        "Dispatching request"
    );

    let response = route.call(request, ctx.clone()).await;

    if let Some(hook) = &state.metering {
        let record = MeterRecord {
            request_id: ctx.request_id,
            domain: ctx.domain,
            tenant_id: ctx.tenant_id,
            method: method.to_string(),
            path: route.path.clone(),
            status: response.status().as_u16(),
            response_bytes: response.body().size_hint().exact().unwrap_or(0),
            duration_seconds: started.elapsed().as_secs_f64(),
        };
        metering::submit(hook, record);
    }

    response
}
