//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TLS connection
//!     → rustls ClientHello (SNI server name)
//!     → tls.rs SniCertResolver → CertStore lookup
//!     → exact name | shorter wildcard suffixes | fallback | fail handshake
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Certificates loaded eagerly at startup, never during a handshake
//! - Identity lookups are lock-free reads of an atomically swapped map
//! - TLS is optional; the plain listener path skips this module entirely

pub mod tls;

pub use tls::{server_config, CertStore, SniCertResolver, TlsError, TlsResult};
