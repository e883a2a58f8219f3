//! REST gateway client for sample transactions.
//!
//! Once the profile is written, the bootstrap can optionally exercise the
//! channel through a REST gateway fronting the network: make sure the
//! signer exists on the gateway side, submit `InitLedger` and a
//! `CreateAsset`, then read everything back with `GetAllAssets`.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub struct GatewayClient {
    http: reqwest::Client,
    base: String,
    signer: String,
    channel: String,
    chaincode: String,
}

#[derive(Debug, Deserialize)]
struct GatewayIdentity {
    #[serde(default)]
    secret: String,
    #[serde(rename = "enrollmentCert", default)]
    enrollment_cert: String,
}

impl GatewayIdentity {
    /// Registered, but the enrollment step never ran.
    fn enrollment_pending(&self) -> bool {
        !self.secret.is_empty() && self.enrollment_cert.is_empty()
    }
}

impl GatewayClient {
    pub fn new(base_url: &str, signer: &str, channel: &str, chaincode: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base_url.trim_end_matches('/').to_string(),
            signer: signer.to_string(),
            channel: channel.to_string(),
            chaincode: chaincode.to_string(),
        }
    }

    /// Make sure the signer is registered and enrolled on the gateway.
    ///
    /// An existing record may still carry a pending enrollment secret (the
    /// register step ran but enroll never did); that state is completed
    /// here rather than treated as provisioned.
    pub async fn ensure_identity(&self) -> Result<()> {
        let url = format!("{}/identities/{}", self.base, self.signer);
        let response = self.http.get(&url).send().await?;
        if response.status().is_success() {
            let identity: GatewayIdentity = response.json().await?;
            if identity.enrollment_pending() {
                return self.enroll(&identity.secret).await;
            }
            debug!(signer = %self.signer, "gateway identity already enrolled");
            return Ok(());
        }
        if response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(Error::Transport(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }

        let created = self
            .http
            .post(format!("{}/identities", self.base))
            .json(&json!({
                "name": self.signer,
                "type": "client",
                "maxEnrollments": 0,
            }))
            .send()
            .await?;
        if !created.status().is_success() {
            return Err(Error::Rejected(format!(
                "gateway refused to register {}: {}",
                self.signer,
                created.status()
            )));
        }
        let identity: GatewayIdentity = created.json().await?;
        self.enroll(&identity.secret).await
    }

    async fn enroll(&self, secret: &str) -> Result<()> {
        let enrolled = self
            .http
            .post(format!("{}/identities/{}/enroll", self.base, self.signer))
            .json(&json!({ "secret": secret }))
            .send()
            .await?;
        if !enrolled.status().is_success() {
            return Err(Error::Rejected(format!(
                "gateway refused to enroll {}: {}",
                self.signer,
                enrolled.status()
            )));
        }
        info!(signer = %self.signer, "gateway identity enrolled");
        Ok(())
    }

    async fn submit(&self, func: &str, args: &[&str], init: bool) -> Result<Value> {
        let body = json!({
            "headers": {
                "type": "SendTransaction",
                "signer": self.signer,
                "channel": self.channel,
                "chaincode": self.chaincode,
            },
            "func": func,
            "args": args,
            "init": init,
        });
        let response = self
            .http
            .post(format!("{}/transactions?fly-sync=true", self.base))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Rejected(format!(
                "transaction {func} returned {status}: {text}"
            )));
        }
        Ok(response.json().await?)
    }

    pub async fn init_ledger(&self) -> Result<Value> {
        self.submit("InitLedger", &[], false).await
    }

    pub async fn create_asset(&self, asset_id: &str) -> Result<Value> {
        self.submit("CreateAsset", &[asset_id, "yellow", "5", "Tom", "1300"], false)
            .await
    }

    pub async fn query_all(&self) -> Result<Value> {
        let body = json!({
            "headers": {
                "signer": self.signer,
                "channel": self.channel,
                "chaincode": self.chaincode,
            },
            "func": "GetAllAssets",
            "args": [],
        });
        let response = self
            .http
            .post(format!("{}/query", self.base))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Rejected(format!("query returned {status}")));
        }
        Ok(response.json().await?)
    }
}
