//! Multi-tenant domain dispatch.
//!
//! # Responsibilities
//! - Hold one [`DomainHandler`] (route table + dispatch metadata) per
//!   registered virtual host.
//! - Resolve inbound host headers: exact name, most-specific wildcard,
//!   then the default domain.
//! - Enforce single-default and unique-name registration rules.
//!
//! # Design Decisions
//! - Hosts are normalized once per request (port stripped, lowercased);
//!   registration normalizes names the same way so lookups never miss on
//!   case or port.
//! - Wildcards match proper subdomains only: `*.example.com` serves
//!   `foo.example.com` but not `example.com` itself.
//! - Redirect domains keep an empty route table; dispatch answers with a
//!   permanent redirect before any lookup.

pub mod config;
pub mod registry;

pub use config::{DomainConfig, DomainTls};
pub use registry::{normalize_host, DomainError, DomainHandler, DomainRegistry, DomainResult};
