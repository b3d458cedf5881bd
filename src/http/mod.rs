//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, host resolution, dispatch)
//!     → routing layer picks the compiled route
//!     → middleware chain runs with the request context
//!     → handler.rs trait object produces the response
//!     → metering.rs reports the completed request
//! ```

pub mod context;
pub mod handler;
pub mod metering;
pub mod response;
pub mod server;

pub use context::{RequestContext, RouteInfo};
pub use handler::{ArcHandler, Handler};
pub use metering::{MeterRecord, MeteringHook};
pub use server::{Server, ServerError, ServerResult};
