//! Multi-tenant HTTP routing and serving core.

pub mod config;
pub mod domain;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod metrics;
pub mod middleware;
pub mod net;
pub mod routing;

pub use config::ServerConfig;
pub use domain::DomainConfig;
pub use http::Server;
pub use lifecycle::ShutdownCoordinator;
pub use routing::{Route, RouteGroup};
