//! TLS identity selection.
//!
//! # Responsibilities
//! - Load certificate/key pairs eagerly from PEM files at startup and
//!   registration, never on the handshake path.
//! - Resolve the client's SNI name to a certificate: exact name first,
//!   then progressively shorter wildcard suffixes, then the fallback.
//! - Pin protocol versions to TLS 1.3/1.2 with ALPN h2 + http/1.1.
//!
//! # Design Decisions
//! - Identities live in an `ArcSwap`ped map so handshakes read lock-free
//!   while registration swaps whole snapshots.
//! - A name with no matching identity and no fallback fails only that
//!   handshake; startup fails only when configured files are unusable.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;

/// Errors raised while loading certificate material.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    /// Configured file does not exist.
    #[error("{kind} file not found: {path}")]
    MissingFile { kind: &'static str, path: String },
    /// I/O failure while reading PEM material.
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// File read fine but held no usable PEM blocks.
    #[error("failed to parse PEM in {path}: {reason}")]
    Parse { path: String, reason: String },
    /// Key file contained no private key.
    #[error("no private key found in {path}")]
    NoPrivateKey { path: String },
    /// Key algorithm the crypto provider cannot sign with.
    #[error("unsupported private key in {path}: {reason}")]
    UnsupportedKey { path: String, reason: String },
}

pub type TlsResult<T> = Result<T, TlsError>;

#[derive(Clone, Default)]
struct CertMap {
    exact: HashMap<String, Arc<CertifiedKey>>,
    /// Keyed by the suffix after `*.`, lowercased.
    wildcard: HashMap<String, Arc<CertifiedKey>>,
    fallback: Option<Arc<CertifiedKey>>,
}

/// All loaded TLS identities.
///
/// Registration happens at startup; handshakes only ever read the current
/// snapshot, so lookups take no lock.
#[derive(Default)]
pub struct CertStore {
    certs: ArcSwap<CertMap>,
}

impl CertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the static fallback identity served when no domain matches.
    pub fn load_fallback(&self, cert_path: &Path, key_path: &Path) -> TlsResult<()> {
        let identity = Arc::new(load_certified_key(cert_path, key_path)?);
        let mut next = CertMap::clone(&self.certs.load_full());
        next.fallback = Some(identity);
        self.certs.store(Arc::new(next));
        tracing::info!(cert = %cert_path.display(), "Fallback TLS identity loaded");
        Ok(())
    }

    /// Load an identity for an exact or `*.suffix` wildcard name.
    pub fn load_domain(&self, name: &str, cert_path: &Path, key_path: &Path) -> TlsResult<()> {
        let identity = Arc::new(load_certified_key(cert_path, key_path)?);
        let name = name.trim().to_ascii_lowercase();
        let mut next = CertMap::clone(&self.certs.load_full());
        match name.strip_prefix("*.") {
            Some(suffix) => {
                next.wildcard.insert(suffix.to_string(), identity);
            }
            None => {
                next.exact.insert(name.clone(), identity);
            }
        }
        self.certs.store(Arc::new(next));
        tracing::info!(domain = %name, cert = %cert_path.display(), "Domain TLS identity loaded");
        Ok(())
    }

    /// Pick an identity for a requested server name: exact, then each
    /// shorter wildcard suffix, then the fallback.
    pub fn resolve(&self, server_name: &str) -> Option<Arc<CertifiedKey>> {
        let name = server_name.to_ascii_lowercase();
        let map = self.certs.load();
        if let Some(identity) = map.exact.get(&name) {
            return Some(Arc::clone(identity));
        }
        let mut rest = name.as_str();
        while let Some((_, suffix)) = rest.split_once('.') {
            if let Some(identity) = map.wildcard.get(suffix) {
                return Some(Arc::clone(identity));
            }
            rest = suffix;
        }
        map.fallback.as_ref().map(Arc::clone)
    }

    /// The fallback identity, if one was loaded.
    pub fn fallback(&self) -> Option<Arc<CertifiedKey>> {
        self.certs.load().fallback.as_ref().map(Arc::clone)
    }

    pub fn is_empty(&self) -> bool {
        let map = self.certs.load();
        map.exact.is_empty() && map.wildcard.is_empty() && map.fallback.is_none()
    }
}

/// SNI hook handed to rustls.
pub struct SniCertResolver {
    store: Arc<CertStore>,
}

impl SniCertResolver {
    pub fn new(store: Arc<CertStore>) -> Self {
        Self { store }
    }
}

impl fmt::Debug for SniCertResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SniCertResolver").finish_non_exhaustive()
    }
}

impl ResolvesServerCert for SniCertResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        match client_hello.server_name() {
            Some(name) => {
                let identity = self.store.resolve(name);
                if identity.is_none() {
                    tracing::debug!(server_name = %name, "No TLS identity for server name");
                }
                identity
            }
            // No SNI at all: only the fallback can serve.
            None => self.store.fallback(),
        }
    }
}

/// rustls server config with the SNI resolver installed. TLS 1.3 and 1.2
/// only; ALPN advertises h2 and http/1.1.
pub fn server_config(store: Arc<CertStore>) -> Arc<rustls::ServerConfig> {
    let mut config = rustls::ServerConfig::builder_with_protocol_versions(&[
        &rustls::version::TLS13,
        &rustls::version::TLS12,
    ])
    .with_no_client_auth()
    .with_cert_resolver(Arc::new(SniCertResolver::new(store)));
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Arc::new(config)
}

fn load_certified_key(cert_path: &Path, key_path: &Path) -> TlsResult<CertifiedKey> {
    if !cert_path.exists() {
        return Err(TlsError::MissingFile {
            kind: "certificate",
            path: cert_path.display().to_string(),
        });
    }
    if !key_path.exists() {
        return Err(TlsError::MissingFile {
            kind: "private key",
            path: key_path.display().to_string(),
        });
    }

    let file = File::open(cert_path).map_err(|source| TlsError::Read {
        path: cert_path.display().to_string(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| TlsError::Parse {
            path: cert_path.display().to_string(),
            reason: err.to_string(),
        })?;
    if certs.is_empty() {
        return Err(TlsError::Parse {
            path: cert_path.display().to_string(),
            reason: "no certificates in file".to_string(),
        });
    }

    let file = File::open(key_path).map_err(|source| TlsError::Read {
        path: key_path.display().to_string(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Read {
            path: key_path.display().to_string(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey {
            path: key_path.display().to_string(),
        })?;

    let signing_key = rustls::crypto::aws_lc_rs::sign::any_supported_type(&key).map_err(|err| {
        TlsError::UnsupportedKey {
            path: key_path.display().to_string(),
            reason: err.to_string(),
        }
    })?;

    Ok(CertifiedKey::new(certs, signing_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustls::sign::{Signer, SigningKey};
    use rustls::{SignatureAlgorithm, SignatureScheme};

    #[derive(Debug)]
    struct StubKey;

    impl SigningKey for StubKey {
        fn choose_scheme(&self, _offered: &[SignatureScheme]) -> Option<Box<dyn Signer>> {
            None
        }

        fn algorithm(&self) -> SignatureAlgorithm {
            SignatureAlgorithm::RSA
        }
    }

    fn identity() -> Arc<CertifiedKey> {
        Arc::new(CertifiedKey::new(
            vec![CertificateDer::from(vec![0u8; 8])],
            Arc::new(StubKey),
        ))
    }

    fn store_with(entries: &[&str], fallback: bool) -> CertStore {
        let store = CertStore::new();
        let mut map = CertMap::default();
        for name in entries {
            match name.strip_prefix("*.") {
                Some(suffix) => {
                    map.wildcard.insert(suffix.to_string(), identity());
                }
                None => {
                    map.exact.insert(name.to_string(), identity());
                }
            }
        }
        if fallback {
            map.fallback = Some(identity());
        }
        store.certs.store(Arc::new(map));
        store
    }

    #[test]
    fn test_exact_name_wins() {
        let store = store_with(&["api.example.com", "*.example.com"], false);
        assert!(store.resolve("api.example.com").is_some());
        assert!(store.resolve("API.EXAMPLE.COM").is_some());
    }

    #[test]
    fn test_wildcard_matches_shorter_suffixes() {
        let store = store_with(&["*.example.com"], false);
        assert!(store.resolve("foo.example.com").is_some());
        assert!(store.resolve("a.b.example.com").is_some());
        // The bare suffix is not a subdomain of itself.
        assert!(store.resolve("example.com").is_none());
        assert!(store.resolve("other.org").is_none());
    }

    #[test]
    fn test_fallback_used_last() {
        let store = store_with(&["*.example.com"], true);
        assert!(store.resolve("unrelated.org").is_some());

        let none = store_with(&["*.example.com"], false);
        assert!(none.resolve("unrelated.org").is_none());
    }

    #[test]
    fn test_missing_files_reported() {
        let store = CertStore::new();
        let err = store
            .load_fallback(
                Path::new("/nonexistent/server.crt"),
                Path::new("/nonexistent/server.key"),
            )
            .unwrap_err();
        assert!(matches!(err, TlsError::MissingFile { kind: "certificate", .. }));
    }

    #[test]
    fn test_junk_pem_reported_as_parse_error() {
        let dir = std::env::temp_dir();
        let cert_path = dir.join(format!("manifold-test-{}.crt", std::process::id()));
        let key_path = dir.join(format!("manifold-test-{}.key", std::process::id()));
        std::fs::write(&cert_path, "this is not pem").unwrap();
        std::fs::write(&key_path, "neither is this").unwrap();

        let store = CertStore::new();
        let err = store.load_domain("api.example.com", &cert_path, &key_path);
        std::fs::remove_file(&cert_path).ok();
        std::fs::remove_file(&key_path).ok();

        assert!(matches!(err, Err(TlsError::Parse { .. })));
    }
}
