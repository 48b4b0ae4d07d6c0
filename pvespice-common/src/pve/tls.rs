//! TLS trust policy for the management API connection.
//!
//! Cluster nodes ship with a self-signed certificate, so the default policy
//! accepts any server certificate. Handshake signatures are still checked
//! so the session keys are bound to the presented certificate.

use anyhow::{anyhow, Context, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How the API server's certificate is verified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Accept any certificate (self-signed cluster CA).
    #[default]
    AcceptInvalidCerts,
    /// Verify against the bundled Mozilla root store.
    WebPki,
    /// Verify against the CA certificates in a PEM file.
    CustomCa(PathBuf),
}

impl TlsPolicy {
    /// Build the rustls client configuration for this policy.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let provider = Arc::new(ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .context("Failed to select TLS protocol versions")?;

        let config = match self {
            TlsPolicy::AcceptInvalidCerts => builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
                .with_no_client_auth(),
            TlsPolicy::WebPki => {
                let roots: RootCertStore =
                    webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
                builder.with_root_certificates(roots).with_no_client_auth()
            }
            TlsPolicy::CustomCa(path) => builder
                .with_root_certificates(load_ca_file(path)?)
                .with_no_client_auth(),
        };

        Ok(config)
    }
}

/// Load every certificate from a PEM bundle into a root store.
fn load_ca_file(path: &Path) -> Result<RootCertStore> {
    let pem = std::fs::read(path)
        .with_context(|| format!("Failed to read CA file: {}", path.display()))?;

    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Failed to parse CA file: {}", path.display()))?;

    if certs.is_empty() {
        return Err(anyhow!("No certificates found in {}", path.display()));
    }

    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots
            .add(cert)
            .with_context(|| format!("Invalid CA certificate in {}", path.display()))?;
    }
    Ok(roots)
}

/// Verifier that trusts any server certificate.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
