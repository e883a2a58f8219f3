//! TLS trust-anchor harvest.
//!
//! The CA's HTTPS endpoint presents a certificate chain that is not rooted
//! in the system store. On first contact the full chain is captured during
//! a handshake, normalized to PEM, and cached on disk; later runs reuse the
//! cached file so the trust decision is only made once per environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

use fablink_core::pem::chain_to_pem;

use crate::error::{Error, Result};

/// The harvested trust anchor: PEM text plus its on-disk location.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    pub pem: String,
    pub path: PathBuf,
}

/// Captures a server's certificate chain, as a seam for tests.
#[async_trait]
pub trait ChainFetcher: Send + Sync {
    /// Handshake with the HTTPS endpoint at `url` and return its DER chain,
    /// leaf first.
    async fn fetch_chain(&self, url: &str) -> Result<Vec<Vec<u8>>>;
}

/// Verifier used only during harvest: accepts any certificate so the chain
/// can be captured. Handshake signatures are still checked, so the captured
/// chain is the one the peer actually holds keys for.
#[derive(Debug)]
struct HarvestVerifier;

impl ServerCertVerifier for HarvestVerifier {
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
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
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
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Fetches chains with a real TLS handshake.
pub struct TlsChainFetcher;

fn host_and_port(url: &str) -> Result<(String, u16)> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let authority = rest.split('/').next().unwrap_or(rest);
    match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse().map_err(|_| {
                Error::MalformedInput(format!("invalid port in url {url:?}"))
            })?;
            Ok((host.to_string(), port))
        }
        None => Ok((authority.to_string(), 443)),
    }
}

#[async_trait]
impl ChainFetcher for TlsChainFetcher {
    async fn fetch_chain(&self, url: &str) -> Result<Vec<Vec<u8>>> {
        let (host, port) = host_and_port(url)?;
        debug!(%host, port, "harvesting certificate chain");

        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Transport(format!("TLS configuration failed: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(HarvestVerifier))
        .with_no_client_auth();

        let server_name = ServerName::try_from(host.clone())
            .map_err(|_| Error::MalformedInput(format!("invalid server name {host:?}")))?;

        let tcp = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|e| Error::Transport(format!("connect to {host}:{port} failed: {e}")))?;
        let stream = TlsConnector::from(Arc::new(config))
            .connect(server_name, tcp)
            .await
            .map_err(|e| Error::Transport(format!("handshake with {host}:{port} failed: {e}")))?;

        let (_, session) = stream.get_ref();
        let chain = session
            .peer_certificates()
            .ok_or_else(|| {
                Error::Transport(format!("{host}:{port} presented no certificates"))
            })?
            .iter()
            .map(|der| der.as_ref().to_vec())
            .collect();
        Ok(chain)
    }
}

/// Provides the environment's trust anchor, harvesting at most once.
pub struct TrustAnchorProvider<F: ChainFetcher + ?Sized> {
    fetcher: Arc<F>,
    cache_path: PathBuf,
    memo: Mutex<Option<TrustAnchor>>,
}

impl<F: ChainFetcher + ?Sized> TrustAnchorProvider<F> {
    /// `cache_path` is the PEM file under the environment directory, e.g.
    /// `{root}/{env}/console_ca.pem`.
    pub fn new(fetcher: Arc<F>, cache_path: &Path) -> Self {
        Self {
            fetcher,
            cache_path: cache_path.to_path_buf(),
            memo: Mutex::new(None),
        }
    }

    /// The trust anchor for the CA at `url`. Cache order: memo, then the
    /// on-disk PEM, then a live harvest.
    pub async fn get(&self, url: &str) -> Result<TrustAnchor> {
        if let Some(anchor) = self.memo.lock().unwrap().clone() {
            return Ok(anchor);
        }

        let pem = if self.cache_path.is_file() {
            debug!(path = %self.cache_path.display(), "trust anchor loaded from cache");
            fs::read_to_string(&self.cache_path)?
        } else {
            let chain = self.fetcher.fetch_chain(url).await?;
            if chain.is_empty() {
                return Err(Error::Transport(format!("{url} presented an empty chain")));
            }
            let pem = chain_to_pem(&chain);
            if let Some(parent) = self.cache_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&self.cache_path, &pem)?;
            let fingerprint = hex::encode(Sha256::digest(&chain[0]));
            info!(
                path = %self.cache_path.display(),
                certs = chain.len(),
                leaf_sha256 = %fingerprint,
                "trust anchor harvested"
            );
            pem
        };

        let anchor = TrustAnchor {
            pem,
            path: self.cache_path.clone(),
        };
        *self.memo.lock().unwrap() = Some(anchor.clone());
        Ok(anchor)
    }
}
