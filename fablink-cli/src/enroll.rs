//! Identity provisioning against the managed CA.
//!
//! Each identity is provisioned in two steps: register the enrollment id
//! through the control plane (which returns a one-time secret), then enroll
//! against the CA itself with a locally-generated key and CSR. Provisioned
//! identities land in the wallet, which makes the whole flow idempotent.

use async_trait::async_trait;
use rcgen::{CertificateParams, DnType, KeyPair};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use zeroize::Zeroizing;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::console::Registrar;
use crate::error::{Error, Result};
use crate::wallet::{StoredIdentity, Wallet};

/// A freshly-issued certificate and the private key it certifies.
pub struct EnrollmentMaterial {
    pub certificate: String,
    pub private_key: Zeroizing<String>,
}

/// The CA's enrollment endpoint, as a seam for tests.
#[async_trait]
pub trait CaProtocol: Send + Sync {
    /// Enroll `enrollment_id` using its one-time `secret`, optionally under
    /// a named certificate profile (e.g. `tls`).
    async fn enroll(
        &self,
        enrollment_id: &str,
        secret: &str,
        profile: Option<&str>,
    ) -> Result<EnrollmentMaterial>;
}

pub struct CaClient {
    http: reqwest::Client,
    ca_url: String,
}

#[derive(Debug, Deserialize)]
struct EnrollResponse {
    result: Option<EnrollResult>,
    #[serde(default)]
    errors: Vec<CaError>,
}

#[derive(Debug, Deserialize)]
struct EnrollResult {
    #[serde(rename = "Cert")]
    cert: String,
}

#[derive(Debug, Deserialize)]
struct CaError {
    #[serde(default)]
    message: String,
}

impl CaClient {
    /// Build a client for the CA at `ca_url`, trusting only the given PEM
    /// bundle for its HTTPS endpoint.
    pub fn new(ca_url: &str, trust_anchor_pem: &[u8]) -> Result<Self> {
        let mut builder = reqwest::Client::builder().use_rustls_tls();
        let anchors = reqwest::Certificate::from_pem_bundle(trust_anchor_pem)
            .map_err(|e| Error::Identity(format!("invalid CA trust anchor: {e}")))?;
        for anchor in anchors {
            builder = builder.add_root_certificate(anchor);
        }
        Ok(Self {
            http: builder.build()?,
            ca_url: ca_url.trim_end_matches('/').to_string(),
        })
    }

    fn generate_key_and_csr(enrollment_id: &str) -> Result<(Zeroizing<String>, String)> {
        let key_pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)
            .map_err(|e| Error::Identity(format!("key generation failed: {e}")))?;
        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CommonName, enrollment_id);
        let csr = params
            .serialize_request(&key_pair)
            .map_err(|e| Error::Identity(format!("CSR generation failed: {e}")))?;
        let csr_pem = csr
            .pem()
            .map_err(|e| Error::Identity(format!("CSR encoding failed: {e}")))?;
        Ok((Zeroizing::new(key_pair.serialize_pem()), csr_pem))
    }
}

#[async_trait]
impl CaProtocol for CaClient {
    async fn enroll(
        &self,
        enrollment_id: &str,
        secret: &str,
        profile: Option<&str>,
    ) -> Result<EnrollmentMaterial> {
        let (private_key, csr_pem) = Self::generate_key_and_csr(enrollment_id)?;

        let mut body = json!({ "certificate_request": csr_pem });
        if let Some(profile) = profile {
            body["profile"] = json!(profile);
        }

        let response = self
            .http
            .post(format!("{}/api/v1/enroll", self.ca_url))
            .basic_auth(enrollment_id, Some(secret))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Rejected(format!(
                "enrollment of {enrollment_id} returned {status}: {text}"
            )));
        }

        let parsed: EnrollResponse = response.json().await?;
        if let Some(err) = parsed.errors.first() {
            return Err(Error::Rejected(format!(
                "enrollment of {enrollment_id} refused: {}",
                err.message
            )));
        }
        let result = parsed.result.ok_or_else(|| {
            Error::Rejected(format!("enrollment of {enrollment_id} returned no certificate"))
        })?;

        // the CA returns the PEM certificate base64-encoded once more
        let pem_bytes = STANDARD
            .decode(&result.cert)
            .map_err(|e| Error::Identity(format!("certificate is not valid base64: {e}")))?;
        let certificate = String::from_utf8(pem_bytes)
            .map_err(|e| Error::Identity(format!("certificate is not valid UTF-8: {e}")))?;

        Ok(EnrollmentMaterial {
            certificate,
            private_key,
        })
    }
}

pub struct IdentityEnroller<'a, R: Registrar + ?Sized, C: CaProtocol + ?Sized> {
    registrar: &'a R,
    ca: &'a C,
    wallet: &'a Wallet,
    ca_id: String,
    msp_id: String,
}

impl<'a, R: Registrar + ?Sized, C: CaProtocol + ?Sized> IdentityEnroller<'a, R, C> {
    pub fn new(
        registrar: &'a R,
        ca: &'a C,
        wallet: &'a Wallet,
        ca_id: &str,
        msp_id: &str,
    ) -> Self {
        Self {
            registrar,
            ca,
            wallet,
            ca_id: ca_id.to_string(),
            msp_id: msp_id.to_string(),
        }
    }

    /// Make sure `label` exists in the wallet, registering and enrolling
    /// `enrollment_id` if it does not. Returns whether anything was done.
    pub async fn ensure_identity(
        &self,
        label: &str,
        enrollment_id: &str,
        profile: Option<&str>,
    ) -> Result<bool> {
        if self.wallet.contains(label) {
            info!(label, "identity already in wallet");
            return Ok(false);
        }

        let secret = self.registrar.register(&self.ca_id, enrollment_id).await?;
        let material = self.ca.enroll(enrollment_id, &secret, profile).await?;
        let identity = StoredIdentity::new(
            material.certificate,
            material.private_key.to_string(),
            self.msp_id.clone(),
        );
        self.wallet.put(label, &identity)?;
        info!(label, enrollment_id, "identity enrolled");
        Ok(true)
    }

    /// Provision the standard set: the org admin, its TLS counterpart, and
    /// the end user named in the configuration.
    pub async fn ensure_all(&self, username: &str) -> Result<()> {
        self.ensure_identity("admin", "admin-local", None).await?;
        self.ensure_identity("admin-tls", "admin-tls", Some("tls"))
            .await?;
        self.ensure_identity(username, username, None).await?;
        Ok(())
    }
}
