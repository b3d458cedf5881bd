//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits and timeouts nonzero, bind address parses)
//! - Check TLS entries are complete and domain names well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ServerConfig -> Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// One semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path to the offending field (e.g., "listener.bind_address").
    pub field: String,

    /// What is wrong with the value.
    pub message: String,
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        push(
            &mut errors,
            "listener.bind_address",
            format!("{:?} is not a valid socket address", config.listener.bind_address),
        );
    }

    if let Some(tls) = &config.listener.tls {
        match (&tls.cert_path, &tls.key_path) {
            (Some(_), Some(_)) | (None, None) => {}
            _ => push(
                &mut errors,
                "listener.tls",
                "cert_path and key_path must be set together",
            ),
        }
        if tls.cert_path.is_none() && tls.domains.is_empty() {
            push(
                &mut errors,
                "listener.tls",
                "TLS is enabled but no certificate is configured",
            );
        }

        let mut seen = HashSet::new();
        for (index, entry) in tls.domains.iter().enumerate() {
            let field = format!("listener.tls.domains[{index}].domain");
            let name = entry.domain.trim().to_ascii_lowercase();
            if !valid_domain_name(&name) {
                push(&mut errors, &field, format!("{:?} is not a valid domain name", entry.domain));
            } else if !seen.insert(name) {
                push(&mut errors, &field, format!("{:?} is configured twice", entry.domain));
            }
        }
    }

    if !config.routing.base_path.is_empty() && !config.routing.base_path.starts_with('/') {
        push(&mut errors, "routing.base_path", "must be empty or start with '/'");
    }
    if config.routing.version.contains('/') || config.routing.version.contains(char::is_whitespace) {
        push(&mut errors, "routing.version", "must be a single path segment");
    }

    if config.limits.max_body_bytes == 0 {
        push(&mut errors, "limits.max_body_bytes", "must be greater than zero");
    }
    if config.timeouts.request_secs == 0 {
        push(&mut errors, "timeouts.request_secs", "must be greater than zero");
    }
    if config.shutdown.timeout_secs == 0 {
        push(&mut errors, "shutdown.timeout_secs", "must be greater than zero");
    }

    if config.metrics.enabled {
        if !valid_metric_ident(&config.metrics.namespace) {
            push(
                &mut errors,
                "metrics.namespace",
                format!("{:?} is not a valid metric name segment", config.metrics.namespace),
            );
        }
        if !valid_metric_ident(&config.metrics.subsystem) {
            push(
                &mut errors,
                "metrics.subsystem",
                format!("{:?} is not a valid metric name segment", config.metrics.subsystem),
            );
        }
        if config.metrics.max_endpoints == 0 {
            push(&mut errors, "metrics.max_endpoints", "must be greater than zero");
        }
        if config.metrics.sample_capacity == 0 {
            push(&mut errors, "metrics.sample_capacity", "must be greater than zero");
        }
        if !config.metrics.path.starts_with('/') {
            push(&mut errors, "metrics.path", "must start with '/'");
        }
    }

    if !config.health.liveness_path.starts_with('/') {
        push(&mut errors, "health.liveness_path", "must start with '/'");
    }
    if !config.health.readiness_path.starts_with('/') {
        push(&mut errors, "health.readiness_path", "must start with '/'");
    }
    if config.health.liveness_path == config.health.readiness_path {
        push(
            &mut errors,
            "health.readiness_path",
            "liveness and readiness paths must differ",
        );
    }
    if config.health.check_timeout_secs == 0 {
        push(&mut errors, "health.check_timeout_secs", "must be greater than zero");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn push(errors: &mut Vec<ValidationError>, field: &str, message: impl Into<String>) {
    errors.push(ValidationError {
        field: field.to_string(),
        message: message.into(),
    });
}

/// A hostname usable as a certificate or virtual-host key. Accepts a
/// leading "*." wildcard label; rejects empty names, whitespace, and
/// path separators.
fn valid_domain_name(name: &str) -> bool {
    let rest = name.strip_prefix("*.").unwrap_or(name);
    !rest.is_empty() && !rest.contains(char::is_whitespace) && !rest.contains('/')
}

/// Prometheus metric name segment: [a-zA-Z_][a-zA-Z0-9_]*.
fn valid_metric_ident(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
