//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (at startup):
//!     Route / RouteGroup
//!     → apply base path + version prefixes (per-route flags may skip)
//!     → normalize the path, reject traversal
//!     → conflict check against the (method, path) map
//!     → compile middleware chain onto the handler
//!     → insert CompiledRoute (+ auto OPTIONS for preflight)
//!
//! Dispatch (per request):
//!     sanitized path + method
//!     → exact map lookup
//!     → Return: Arc<CompiledRoute> or NotFound
//! ```
//!
//! # Design Decisions
//! - Routes compiled at registration, immutable at runtime
//! - Exact-match map in the hot path, no pattern evaluation per request
//! - Middleware chains folded onto handlers once, at registration
//! - Conflicts surface at startup: hard error in development, logged
//!   overwrite in production

pub mod path;
pub mod route;
pub mod table;

pub use route::{Route, RouteDocs, RouteFlags, RouteGroup};
pub use table::{CompiledRoute, RouteError, RouteKey, RouteResult, RouteSummary, RouteTable};
