//! Host-to-domain resolution.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::routing::RouteTable;

/// Errors raised while registering domains.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Only one domain may carry the default flag.
    #[error("default domain already registered ({existing})")]
    DuplicateDefault { existing: String },
    /// The name is already taken.
    #[error("domain {name:?} already registered")]
    Duplicate { name: String },
    /// Empty name, embedded whitespace or a bare `*.` wildcard.
    #[error("invalid domain name {name:?}")]
    InvalidName { name: String },
    /// The redirect target is not a bare host, optionally with a port.
    #[error("invalid redirect target {target:?}")]
    InvalidRedirect { target: String },
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Runtime half of a registered domain: its route table plus the few
/// config fields dispatch needs per request.
pub struct DomainHandler {
    pub name: String,
    pub table: RouteTable,
    pub tenant_id: Option<String>,
    pub redirect_to: Option<String>,
    /// Effective prefixes, echoed into each request context.
    pub base_path: String,
    pub version: String,
}

struct WildcardEntry {
    /// Suffix without the leading `*.`, lowercased.
    suffix: String,
    /// Label count of the suffix; more labels resolve first.
    labels: usize,
    handler: Arc<DomainHandler>,
}

#[derive(Default)]
struct DomainMap {
    exact: HashMap<String, Arc<DomainHandler>>,
    /// Sorted by label count, most specific first.
    wildcards: Vec<WildcardEntry>,
    default: Option<Arc<DomainHandler>>,
}

/// All registered domains. Writes happen at startup, reads on every
/// request, so the map sits behind a reader-preferring lock.
#[derive(Default)]
pub struct DomainRegistry {
    inner: RwLock<DomainMap>,
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its (possibly wildcard) name, optionally
    /// as the default domain.
    pub fn insert(&self, handler: Arc<DomainHandler>, default: bool) -> DomainResult<()> {
        let name = handler.name.trim().to_ascii_lowercase();
        if name.is_empty()
            || name == "*."
            || name.contains(char::is_whitespace)
            || name.contains('/')
        {
            return Err(DomainError::InvalidName { name });
        }
        if let Some(target) = &handler.redirect_to {
            // The Location header is assembled as `scheme://target/path`,
            // so the target must parse as a bare authority.
            let bare_host = url::Url::parse(&format!("http://{target}"))
                .map(|u| u.host_str().is_some() && u.path() == "/" && u.query().is_none())
                .unwrap_or(false);
            if !bare_host {
                return Err(DomainError::InvalidRedirect {
                    target: target.clone(),
                });
            }
        }

        let mut map = self.inner.write().expect("domain registry lock poisoned");

        // All checks first; the map only changes once the whole
        // registration is known to be valid.
        if default {
            if let Some(existing) = &map.default {
                return Err(DomainError::DuplicateDefault {
                    existing: existing.name.clone(),
                });
            }
        }
        let suffix = name.strip_prefix("*.");
        match suffix {
            Some(suffix) if map.wildcards.iter().any(|w| w.suffix == suffix) => {
                return Err(DomainError::Duplicate { name });
            }
            None if map.exact.contains_key(&name) => {
                return Err(DomainError::Duplicate { name });
            }
            _ => {}
        }

        if default {
            map.default = Some(Arc::clone(&handler));
        }
        match suffix {
            Some(suffix) => {
                map.wildcards.push(WildcardEntry {
                    suffix: suffix.to_string(),
                    labels: suffix.split('.').count(),
                    handler,
                });
                // Stable sort keeps registration order among equal-label ties.
                map.wildcards.sort_by(|a, b| b.labels.cmp(&a.labels));
            }
            None => {
                map.exact.insert(name.clone(), handler);
            }
        }

        tracing::info!(domain = %name, default, "Domain registered");
        Ok(())
    }

    /// Resolve a raw host header value: exact match, then the wildcard
    /// with the most labels, then the default domain.
    pub fn resolve(&self, raw_host: &str) -> Option<Arc<DomainHandler>> {
        let host = normalize_host(raw_host);
        let map = self.inner.read().expect("domain registry lock poisoned");

        if let Some(handler) = map.exact.get(&host) {
            return Some(Arc::clone(handler));
        }
        for entry in &map.wildcards {
            if matches_wildcard(&host, &entry.suffix) {
                return Some(Arc::clone(&entry.handler));
            }
        }
        map.default.as_ref().map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        let map = self.inner.read().expect("domain registry lock poisoned");
        map.exact.len() + map.wildcards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names, wildcards restored to their `*.suffix` form.
    pub fn names(&self) -> Vec<String> {
        let map = self.inner.read().expect("domain registry lock poisoned");
        let mut names: Vec<String> = map.exact.keys().cloned().collect();
        names.extend(map.wildcards.iter().map(|w| format!("*.{}", w.suffix)));
        names.sort();
        names
    }
}

/// Strip the port (bracketed IPv6 included) and lowercase.
pub fn normalize_host(raw: &str) -> String {
    let host = raw.trim();
    if let Some(rest) = host.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return rest[..end].to_ascii_lowercase();
        }
    }
    match host.rsplit_once(':') {
        Some((head, port))
            if !port.is_empty()
                && port.bytes().all(|b| b.is_ascii_digit())
                && !head.contains(':') =>
        {
            head.to_ascii_lowercase()
        }
        _ => host.to_ascii_lowercase(),
    }
}

/// A wildcard only covers proper subdomains of its suffix.
fn matches_wildcard(host: &str, suffix: &str) -> bool {
    host.len() > suffix.len()
        && host.ends_with(suffix)
        && host.as_bytes()[host.len() - suffix.len() - 1] == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunMode;

    fn handler(name: &str) -> Arc<DomainHandler> {
        Arc::new(DomainHandler {
            name: name.to_string(),
            table: RouteTable::new(name, RunMode::Development, "/api", "v1"),
            tenant_id: None,
            redirect_to: None,
            base_path: "/api".to_string(),
            version: "v1".to_string(),
        })
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("Example.COM"), "example.com");
        assert_eq!(normalize_host("example.com:8443"), "example.com");
        assert_eq!(normalize_host("[::1]:8080"), "::1");
        assert_eq!(normalize_host("[2001:db8::1]"), "2001:db8::1");
        assert_eq!(normalize_host("::1"), "::1");
        assert_eq!(normalize_host(" example.com "), "example.com");
        assert_eq!(normalize_host("example.com:"), "example.com:");
    }

    #[test]
    fn test_exact_beats_wildcard_beats_default() {
        let registry = DomainRegistry::new();
        registry.insert(handler("api.example.com"), false).unwrap();
        registry.insert(handler("*.example.com"), false).unwrap();
        registry.insert(handler("fallback.local"), true).unwrap();

        assert_eq!(
            registry.resolve("api.example.com").unwrap().name,
            "api.example.com"
        );
        assert_eq!(
            registry.resolve("foo.example.com").unwrap().name,
            "*.example.com"
        );
        assert_eq!(registry.resolve("other.org").unwrap().name, "fallback.local");
    }

    #[test]
    fn test_most_specific_wildcard_wins() {
        let registry = DomainRegistry::new();
        registry.insert(handler("*.example.com"), false).unwrap();
        registry.insert(handler("*.api.example.com"), false).unwrap();

        assert_eq!(
            registry.resolve("x.api.example.com").unwrap().name,
            "*.api.example.com"
        );
        assert_eq!(
            registry.resolve("x.example.com").unwrap().name,
            "*.example.com"
        );
    }

    #[test]
    fn test_wildcard_requires_proper_subdomain() {
        let registry = DomainRegistry::new();
        registry.insert(handler("*.example.com"), false).unwrap();

        assert!(registry.resolve("example.com").is_none());
        assert!(registry.resolve("notexample.com").is_none());
        assert!(registry.resolve("a.b.example.com").is_some());
    }

    #[test]
    fn test_host_port_and_case_ignored() {
        let registry = DomainRegistry::new();
        registry.insert(handler("api.example.com"), false).unwrap();

        assert!(registry.resolve("API.Example.Com:8443").is_some());
    }

    #[test]
    fn test_second_default_rejected() {
        let registry = DomainRegistry::new();
        registry.insert(handler("a.example.com"), true).unwrap();
        let err = registry.insert(handler("b.example.com"), true).unwrap_err();
        assert!(matches!(
            err,
            DomainError::DuplicateDefault { existing } if existing == "a.example.com"
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let registry = DomainRegistry::new();
        registry.insert(handler("api.example.com"), false).unwrap();
        assert!(matches!(
            registry.insert(handler("API.example.com"), false),
            Err(DomainError::Duplicate { .. })
        ));

        registry.insert(handler("*.example.com"), false).unwrap();
        assert!(matches!(
            registry.insert(handler("*.example.com"), false),
            Err(DomainError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let registry = DomainRegistry::new();
        assert!(matches!(
            registry.insert(handler(""), false),
            Err(DomainError::InvalidName { .. })
        ));
        assert!(matches!(
            registry.insert(handler("*."), false),
            Err(DomainError::InvalidName { .. })
        ));
        assert!(matches!(
            registry.insert(handler("bad host.com"), false),
            Err(DomainError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_no_match_without_default() {
        let registry = DomainRegistry::new();
        registry.insert(handler("api.example.com"), false).unwrap();
        assert!(registry.resolve("other.org").is_none());
    }

    #[test]
    fn test_redirect_target_must_be_bare_host() {
        let redirecting = |name: &str, target: &str| {
            Arc::new(DomainHandler {
                name: name.to_string(),
                table: RouteTable::new(name, RunMode::Development, "/api", "v1"),
                tenant_id: None,
                redirect_to: Some(target.to_string()),
                base_path: "/api".to_string(),
                version: "v1".to_string(),
            })
        };

        let registry = DomainRegistry::new();
        registry
            .insert(redirecting("a.example.com", "new.example.com:8443"), false)
            .unwrap();
        assert!(matches!(
            registry.insert(redirecting("b.example.com", "new.example.com/path"), false),
            Err(DomainError::InvalidRedirect { .. })
        ));
        assert!(matches!(
            registry.insert(redirecting("c.example.com", "bad host"), false),
            Err(DomainError::InvalidRedirect { .. })
        ));
    }
}
