use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use ring::digest::{digest, SHA256};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};
use wtransport::tls::{Certificate, CertificateChain, PrivateKey};
use wtransport::Identity;

use crate::config::ServerConfig;

// Dev certificate paths (generated via `make setup`)
const DEV_CERT_FILE: &str = "certs/cert.pem";
const DEV_KEY_FILE: &str = "certs/key.pem";

/// TLS configuration for the WebTransport endpoint
pub struct TlsConfig {
    /// The wtransport Identity containing certificate and key
    pub identity: Identity,
    /// Base64-encoded SHA-256 hash of the certificate (for browser flag)
    pub cert_hash: String,
}

impl TlsConfig {
    /// Load TLS configuration.
    ///
    /// Production: set TLS_CERT_PATH and TLS_KEY_PATH.
    /// Development: `make setup` generates certs/, or fall back to an
    /// ephemeral in-memory certificate.
    pub async fn load(config: &ServerConfig) -> Result<Self> {
        if let (Some(cert_path), Some(key_path)) = (
            config.tls_cert_path.as_deref(),
            config.tls_key_path.as_deref(),
        ) {
            info!("Loading TLS certificate from configured paths");
            return Self::load_from_paths(cert_path, key_path).await;
        }

        if Path::new(DEV_CERT_FILE).exists() && Path::new(DEV_KEY_FILE).exists() {
            info!("Loading dev certificate from certs/");
            return Self::load_from_paths(DEV_CERT_FILE, DEV_KEY_FILE).await;
        }

        warn!(
            "No TLS certificate found, generating an ephemeral self-signed one \
             (run `make setup` for a persistent dev certificate)"
        );
        Self::generate_self_signed()
    }

    /// Load certificate from PEM file paths
    async fn load_from_paths(cert_path: &str, key_path: &str) -> Result<Self> {
        let identity = Identity::load_pemfiles(cert_path, key_path)
            .await
            .context("Failed to load certificate from PEM files")?;

        let cert_hash = Self::compute_cert_hash(&identity);
        Self::log_cert_info(&cert_hash);

        Ok(Self {
            identity,
            cert_hash,
        })
    }

    /// Generate an in-memory self-signed certificate for localhost.
    ///
    /// Valid for 14 days: browsers reject longer validity for the
    /// WebTransport serverCertificateHashes mechanism.
    pub fn generate_self_signed() -> Result<Self> {
        let mut params =
            CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()])?;

        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, "Derby Arena Dev");
        params
            .distinguished_name
            .push(DnType::OrganizationName, "Development");

        let now = SystemTime::now();
        let fourteen_days = Duration::from_secs(14 * 24 * 60 * 60);
        params.not_before = now.into();
        params.not_after = (now + fourteen_days).into();

        let key_pair = KeyPair::generate()?;
        let cert = params.self_signed(&key_pair)?;

        let certificate = Certificate::from_der(cert.der().to_vec())
            .context("Generated certificate DER was rejected")?;
        let private_key = PrivateKey::from_der_pkcs8(key_pair.serialize_der());
        let identity = Identity::new(CertificateChain::single(certificate), private_key);

        let cert_hash = Self::compute_cert_hash(&identity);
        Self::log_cert_info(&cert_hash);

        Ok(Self {
            identity,
            cert_hash,
        })
    }

    fn compute_cert_hash(identity: &Identity) -> String {
        identity
            .certificate_chain()
            .as_slice()
            .first()
            .map(|cert| {
                let der_bytes = cert.der();
                let hash = digest(&SHA256, der_bytes);
                STANDARD.encode(hash.as_ref())
            })
            .unwrap_or_default()
    }

    fn log_cert_info(cert_hash: &str) {
        info!("Certificate hash: {}", cert_hash);
        info!(
            "Chrome flag: --ignore-certificate-errors-spki-list={}",
            cert_hash
        );
    }

    /// Get the certificate hash for client configuration
    pub fn get_cert_hash(&self) -> &str {
        &self.cert_hash
    }
}
