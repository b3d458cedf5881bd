//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How strictly the server treats registration mistakes.
///
/// Development fails fast on route conflicts; production logs a warning
/// and keeps serving with the most recent registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Development,
    Production,
}

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Route registration behavior and URL layout.
    pub routing: RoutingConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Metrics collection settings.
    pub metrics: MetricsConfig,

    /// Health endpoint settings.
    pub health: HealthConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
///
/// The top-level cert/key pair is the fallback identity handed to clients
/// whose SNI matches no per-domain entry. Per-domain entries may use
/// wildcard names ("*.example.com").
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to the fallback certificate chain file (PEM).
    pub cert_path: Option<PathBuf>,

    /// Path to the fallback private key file (PEM).
    pub key_path: Option<PathBuf>,

    /// Per-domain certificates selected by SNI.
    pub domains: Vec<DomainCertConfig>,
}

/// A certificate bound to one domain name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DomainCertConfig {
    /// Domain the certificate covers. A leading "*." makes it match
    /// every proper subdomain instead of the name itself.
    pub domain: String,

    /// Path to the certificate chain file (PEM).
    pub cert_path: PathBuf,

    /// Path to the private key file (PEM).
    pub key_path: PathBuf,
}

/// Route registration behavior and default URL layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Conflict handling mode.
    pub mode: RunMode,

    /// Prefix prepended to every route path unless the route opts out.
    pub base_path: String,

    /// API version segment inserted after the base path (e.g., "v1").
    pub version: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Development,
            base_path: "/api".to_string(),
            version: "v1".to_string(),
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes. Larger bodies get 413.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request timeout in seconds. Requests exceeding it get 408.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Graceful shutdown settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Total budget in seconds for draining requests and closing resources.
    pub timeout_secs: u64,

    /// Retry-After value in seconds attached to 503s while draining.
    pub retry_after_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retry_after_secs: 5,
        }
    }
}

/// Metrics collection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable request metrics and the exposition endpoint.
    pub enabled: bool,

    /// Prometheus namespace (first metric name segment).
    pub namespace: String,

    /// Prometheus subsystem (second metric name segment).
    pub subsystem: String,

    /// Ceiling on distinct endpoint label values per method.
    pub max_endpoints: usize,

    /// Latency samples retained per endpoint bucket.
    pub sample_capacity: usize,

    /// Collapse all endpoints into one aggregate bucket.
    pub aggregate_paths: bool,

    /// Path serving the Prometheus text exposition.
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "manifold".to_string(),
            subsystem: "http".to_string(),
            max_endpoints: 256,
            sample_capacity: 256,
            aggregate_paths: false,
            path: "/metrics".to_string(),
        }
    }
}

/// Health endpoint settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Path answering liveness probes.
    pub liveness_path: String,

    /// Path answering readiness probes.
    pub readiness_path: String,

    /// Budget in seconds for each registered readiness check.
    pub check_timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            liveness_path: "/healthz".to_string(),
            readiness_path: "/readyz".to_string(),
            check_timeout_secs: 5,
        }
    }
}
