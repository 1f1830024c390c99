//! TLS certificate provisioning.
//!
//! # Responsibilities
//! - Load the operator's PEM certificate chain and private key
//! - Generate an ephemeral self-signed certificate for development
//! - Derive the trust anchor the internal gateway client uses to dial back in
//! - Build the rustls server configuration (ALPN h2 and http/1.1)
//!
//! # Design Decisions
//! - Only the ring provider is compiled in; it is installed as the process
//!   default so every rustls user (server, tonic client) agrees on it
//! - A key that does not belong to the leaf certificate is a startup error,
//!   not a handshake-time surprise

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rcgen::{CertificateParams, DistinguishedName, DnType, DnValue, KeyPair};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;

use crate::config::ListenerConfig;

/// Host name the development certificate is issued for.
pub const DEV_CERT_HOST: &str = "localhost";

/// ALPN identifiers offered by the server, preferred first.
pub const ALPN_PROTOCOLS: [&[u8]; 2] = [b"h2", b"http/1.1"];

/// Errors raised while provisioning TLS material.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificate found in {0}")]
    NoCertificate(PathBuf),

    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("private key does not match certificate: {0}")]
    KeyMismatch(#[source] rustls::Error),

    #[error("could not generate development certificate: {0}")]
    Generate(#[source] rcgen::Error),

    #[error("could not parse certificate: {0}")]
    Parse(#[source] rcgen::Error),

    #[error("certificate has no subject common name")]
    MissingCommonName,

    #[error("invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Certificate chain (leaf first) and its private key.
#[derive(Debug)]
pub struct Certificate {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl Certificate {
    /// Build a certificate, verifying that the key belongs to the leaf.
    pub fn new(
        chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self, TlsError> {
        if chain.is_empty() {
            return Err(rustls::Error::NoCertificatesPresented.into());
        }

        let provider = crypto_provider();
        let signing_key = provider.key_provider.load_private_key(key.clone_key())?;
        match rustls::sign::CertifiedKey::new(chain.clone(), signing_key).keys_match() {
            // Unknown: the key type cannot expose its public half, nothing to compare.
            Ok(()) | Err(rustls::Error::InconsistentKeys(rustls::InconsistentKeys::Unknown)) => {}
            Err(e) => return Err(TlsError::KeyMismatch(e)),
        }
        Ok(Self { chain, key })
    }

    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    /// The end-entity certificate.
    pub fn leaf(&self) -> &CertificateDer<'static> {
        // new() rejects empty chains
        &self.chain[0]
    }

    pub fn key(&self) -> &PrivateKeyDer<'static> {
        &self.key
    }

    /// The leaf certificate in PEM form.
    pub fn leaf_pem(&self) -> String {
        pem::encode(&pem::Pem::new("CERTIFICATE", self.leaf().to_vec()))
    }
}

/// What the internal client needs to trust the server's certificate.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    leaf_pem: String,
    common_name: String,
}

impl TrustAnchor {
    pub fn leaf_pem(&self) -> &str {
        &self.leaf_pem
    }

    /// Subject common name, used as the server name when dialing.
    pub fn common_name(&self) -> &str {
        &self.common_name
    }
}

/// Produce the server certificate: generated when `devcert` is set, loaded
/// from `certfile`/`keyfile` otherwise.
pub fn load_or_generate(config: &ListenerConfig) -> Result<Certificate, TlsError> {
    if config.devcert {
        tracing::warn!(
            host = DEV_CERT_HOST,
            "WARNING: using a generated self-signed development certificate; do not use in production"
        );
        generate_dev_certificate()
    } else {
        load_certificate(&config.certfile, &config.keyfile)
    }
}

/// Load a PEM certificate chain and private key from disk.
pub fn load_certificate(certfile: &Path, keyfile: &Path) -> Result<Certificate, TlsError> {
    let chain = rustls_pemfile::certs(&mut open(certfile)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: certfile.to_path_buf(),
            source,
        })?;
    if chain.is_empty() {
        return Err(TlsError::NoCertificate(certfile.to_path_buf()));
    }

    let key = rustls_pemfile::private_key(&mut open(keyfile)?)
        .map_err(|source| TlsError::Read {
            path: keyfile.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(keyfile.to_path_buf()))?;

    Certificate::new(chain, key)
}

/// Generate a self-signed certificate for [`DEV_CERT_HOST`].
pub fn generate_dev_certificate() -> Result<Certificate, TlsError> {
    let mut params =
        CertificateParams::new(vec![DEV_CERT_HOST.to_string()]).map_err(TlsError::Generate)?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DEV_CERT_HOST);
    params.distinguished_name = dn;

    let key_pair = KeyPair::generate().map_err(TlsError::Generate)?;
    let cert = params.self_signed(&key_pair).map_err(TlsError::Generate)?;

    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    Certificate::new(vec![cert.der().clone()], key)
}

/// Derive the trust anchor for the internal client from the server certificate.
pub fn derive_trust_anchor(cert: &Certificate) -> Result<TrustAnchor, TlsError> {
    let params = CertificateParams::from_ca_cert_der(cert.leaf()).map_err(TlsError::Parse)?;
    let common_name = match params.distinguished_name.get(&DnType::CommonName) {
        Some(DnValue::Utf8String(name)) => name.clone(),
        Some(DnValue::PrintableString(name)) => name.as_str().to_string(),
        _ => return Err(TlsError::MissingCommonName),
    };

    Ok(TrustAnchor {
        leaf_pem: cert.leaf_pem(),
        common_name,
    })
}

/// Build the rustls server configuration for the listener.
pub fn server_config(cert: &Certificate) -> Result<Arc<ServerConfig>, TlsError> {
    let mut config = ServerConfig::builder_with_provider(Arc::new(crypto_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(cert.chain.clone(), cert.key.clone_key())?;
    config.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();
    Ok(Arc::new(config))
}

/// Install ring as the process-wide rustls provider. Safe to call repeatedly.
pub fn install_crypto_provider() {
    // Err means a provider is already installed.
    let _ = crypto_provider().install_default();
}

fn crypto_provider() -> rustls::crypto::CryptoProvider {
    rustls::crypto::ring::default_provider()
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("thing-api-{}-{}", uuid::Uuid::new_v4(), name))
    }

    fn write_pair(key_pair: &KeyPair, cert_key: &KeyPair) -> (PathBuf, PathBuf) {
        let mut params = CertificateParams::new(vec!["api.internal".to_string()]).unwrap();
        params.distinguished_name.push(DnType::CommonName, "api.internal");
        let cert = params.self_signed(cert_key).unwrap();

        let certfile = temp_path("server.crt");
        let keyfile = temp_path("server.key");
        std::fs::write(&certfile, cert.pem()).unwrap();
        std::fs::write(&keyfile, key_pair.serialize_pem()).unwrap();
        (certfile, keyfile)
    }

    #[test]
    fn dev_certificate_is_for_localhost() {
        let config = ListenerConfig {
            tls: true,
            devcert: true,
            certfile: PathBuf::from("/nonexistent/server.crt"),
            ..ListenerConfig::default()
        };
        let cert = load_or_generate(&config).unwrap();
        assert_eq!(cert.chain().len(), 1);

        let anchor = derive_trust_anchor(&cert).unwrap();
        assert_eq!(anchor.common_name(), DEV_CERT_HOST);
        assert!(anchor.leaf_pem().starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn loads_certificate_files() {
        let key = KeyPair::generate().unwrap();
        let (certfile, keyfile) = write_pair(&key, &key);

        let cert = load_certificate(&certfile, &keyfile).unwrap();
        let anchor = derive_trust_anchor(&cert).unwrap();
        assert_eq!(anchor.common_name(), "api.internal");

        let config = server_config(&cert).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);

        let _ = std::fs::remove_file(certfile);
        let _ = std::fs::remove_file(keyfile);
    }

    #[test]
    fn rejects_mismatched_key() {
        let cert_key = KeyPair::generate().unwrap();
        let other_key = KeyPair::generate().unwrap();
        let (certfile, keyfile) = write_pair(&other_key, &cert_key);

        let err = load_certificate(&certfile, &keyfile).unwrap_err();
        assert!(matches!(err, TlsError::KeyMismatch(_)), "got {err:?}");

        let _ = std::fs::remove_file(certfile);
        let _ = std::fs::remove_file(keyfile);
    }

    #[test]
    fn missing_file_fails() {
        let err = load_certificate(Path::new("/nonexistent/server.crt"), Path::new("/nonexistent/server.key"))
            .unwrap_err();
        assert!(matches!(err, TlsError::Read { .. }));
    }

    #[test]
    fn empty_certificate_file_fails() {
        let certfile = temp_path("empty.crt");
        std::fs::write(&certfile, "").unwrap();
        let err = load_certificate(&certfile, Path::new("/nonexistent/server.key")).unwrap_err();
        assert!(matches!(err, TlsError::NoCertificate(_)));
        let _ = std::fs::remove_file(certfile);
    }
}
