//! TLS support for `wss://` connections, backed by rustls.
//!
//! [`TlsConfig`] describes the policy (protocol versions, trust anchors,
//! certificate verification, ALPN) and [`TlsConfig::build`] turns it into
//! a rustls [`ClientConfig`].

mod verifier;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, RootCertStore, SupportedProtocolVersion};

use crate::error::{Error, Result};

use verifier::NoVerifier;

/// TLS protocol versions a connection may negotiate.
///
/// rustls implements neither TLS 1.0 nor TLS 1.1, so 1.2 is the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TlsVersion {
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    fn protocol(self) -> &'static SupportedProtocolVersion {
        match self {
            TlsVersion::Tls12 => &rustls::version::TLS12,
            TlsVersion::Tls13 => &rustls::version::TLS13,
        }
    }
}

/// TLS policy for secure connections.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Lowest protocol version offered. Default: TLS 1.2
    pub min_version: TlsVersion,

    /// Highest protocol version offered. Default: TLS 1.3
    pub max_version: TlsVersion,

    /// Verify the server certificate chain and name.
    ///
    /// Default: true
    pub verify_certificates: bool,

    /// Trust the bundled Mozilla root set.
    ///
    /// Default: true
    pub use_webpki_roots: bool,

    /// Additional trust anchors.
    pub root_certificates: Vec<CertificateDer<'static>>,

    /// ALPN protocols to offer, most preferred first.
    pub alpn_protocols: Vec<Vec<u8>>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            min_version: TlsVersion::Tls12,
            max_version: TlsVersion::Tls13,
            verify_certificates: true,
            use_webpki_roots: true,
            root_certificates: Vec::new(),
            alpn_protocols: Vec::new(),
        }
    }
}

impl TlsConfig {
    /// Default policy: TLS 1.2 to 1.3, verified against the webpki roots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy that accepts any server certificate.
    ///
    /// Only meant for tests and closed networks.
    #[must_use]
    pub fn insecure() -> Self {
        Self {
            verify_certificates: false,
            ..Self::default()
        }
    }

    /// Restrict the negotiable protocol versions to `min..=max`.
    #[must_use]
    pub const fn with_versions(mut self, min: TlsVersion, max: TlsVersion) -> Self {
        self.min_version = min;
        self.max_version = max;
        self
    }

    /// Trust an additional root certificate.
    #[must_use]
    pub fn with_root_certificate(mut self, cert: CertificateDer<'static>) -> Self {
        self.root_certificates.push(cert);
        self
    }

    /// Trust only explicitly added roots.
    #[must_use]
    pub const fn without_webpki_roots(mut self) -> Self {
        self.use_webpki_roots = false;
        self
    }

    /// Offer the given ALPN protocols.
    #[must_use]
    pub fn with_alpn_protocols(mut self, protocols: Vec<Vec<u8>>) -> Self {
        self.alpn_protocols = protocols;
        self
    }

    fn protocol_versions(&self) -> Vec<&'static SupportedProtocolVersion> {
        [TlsVersion::Tls12, TlsVersion::Tls13]
            .into_iter()
            .filter(|v| (self.min_version..=self.max_version).contains(v))
            .map(TlsVersion::protocol)
            .collect()
    }

    fn root_store(&self) -> Result<RootCertStore> {
        let mut store = if self.use_webpki_roots {
            RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned())
        } else {
            RootCertStore::empty()
        };
        for cert in &self.root_certificates {
            store.add(cert.clone())?;
        }
        Ok(store)
    }

    /// Build the rustls client configuration.
    ///
    /// # Errors
    ///
    /// - `Error::TlsConfig` if `min_version > max_version`
    /// - `Error::Tls` if rustls rejects the versions or a root certificate
    pub fn build(&self) -> Result<Arc<ClientConfig>> {
        let versions = self.protocol_versions();
        if versions.is_empty() {
            return Err(Error::TlsConfig(format!(
                "empty protocol version range: {:?}..={:?}",
                self.min_version, self.max_version
            )));
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = ClientConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(&versions)?
            .with_root_certificates(self.root_store()?)
            .with_no_client_auth();

        if !self.verify_certificates {
            config
                .dangerous()
                .set_certificate_verifier(Arc::new(NoVerifier::new(provider)));
        }
        config.alpn_protocols.clone_from(&self.alpn_protocols);

        Ok(Arc::new(config))
    }
}

/// Load every PEM certificate in `path`.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read or a PEM section is
/// malformed, and `Error::TlsConfig` if it holds no certificate.
pub fn load_certs_from_file(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let certs: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut reader).collect::<std::result::Result<Vec<_>, _>>()?;

    if certs.is_empty() {
        return Err(Error::TlsConfig(format!(
            "no certificates found in {}",
            path.display()
        )));
    }

    Ok(certs)
}
