//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors at once)
//!     → ServerConfig (validated, immutable)
//!     → consumed by Server::from_config at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{from_toml_str, load_config, ConfigError, ConfigResult};
pub use schema::{
    DomainCertConfig, HealthConfig, LimitsConfig, ListenerConfig, MetricsConfig, RoutingConfig,
    RunMode, ServerConfig, ShutdownConfig, TimeoutConfig, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
