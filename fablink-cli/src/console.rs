//! Control-plane REST client.
//!
//! Read-only discovery of consortia, environments, memberships, channels,
//! services and nodes, plus the one mutating call the bootstrap needs:
//! registering an enrollment id against a managed CA.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use fablink_core::{Channel, Consortium, Environment, Membership, Node, Service};

use crate::error::{Error, Result};

/// Registration of enrollment ids against a managed CA. Split from the
/// discovery surface so the enroller can be tested against a minimal fake.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Register `enrollment_id` with the CA service and return the
    /// enrollment secret issued for it.
    async fn register(&self, ca_id: &str, enrollment_id: &str) -> Result<String>;
}

/// Read access to the control plane's resource hierarchy.
#[async_trait]
pub trait ControlPlane: Registrar {
    async fn consortia(&self) -> Result<Vec<Consortium>>;
    async fn environments(&self, consortium: &str) -> Result<Vec<Environment>>;
    async fn memberships(&self, consortium: &str) -> Result<Vec<Membership>>;
    async fn channels(&self, consortium: &str, environment: &str) -> Result<Vec<Channel>>;
    async fn services(&self, consortium: &str, environment: &str) -> Result<Vec<Service>>;
    async fn nodes(&self, consortium: &str, environment: &str) -> Result<Vec<Node>>;
}

pub struct ConsoleClient {
    http: reqwest::Client,
    base: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    #[serde(default)]
    registrations: Vec<Registration>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Registration {
    #[serde(rename = "enrollmentSecret")]
    enrollment_secret: String,
}

impl ConsoleClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base, path);
        debug!(%url, "console GET");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("GET {path} returned {status}")));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Registrar for ConsoleClient {
    async fn register(&self, ca_id: &str, enrollment_id: &str) -> Result<String> {
        let url = format!("{}/fabric-ca/{ca_id}/register", self.base);
        debug!(%url, enrollment_id, "console register");
        let body = json!({
            "registrations": [{ "enrollmentID": enrollment_id, "role": "admin" }],
        });
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "register {enrollment_id} returned {status}"
            )));
        }
        let parsed: RegisterResponse = response.json().await?;
        if let Some(message) = parsed.error_message {
            return Err(Error::Rejected(format!(
                "registration of {enrollment_id} refused: {message}"
            )));
        }
        parsed
            .registrations
            .into_iter()
            .next()
            .map(|r| r.enrollment_secret)
            .ok_or_else(|| {
                Error::Rejected(format!(
                    "registration of {enrollment_id} returned no secret"
                ))
            })
    }
}

#[async_trait]
impl ControlPlane for ConsoleClient {
    async fn consortia(&self) -> Result<Vec<Consortium>> {
        self.get("/c").await
    }

    async fn environments(&self, consortium: &str) -> Result<Vec<Environment>> {
        self.get(&format!("/c/{consortium}/e")).await
    }

    async fn memberships(&self, consortium: &str) -> Result<Vec<Membership>> {
        self.get(&format!("/c/{consortium}/m")).await
    }

    async fn channels(&self, consortium: &str, environment: &str) -> Result<Vec<Channel>> {
        self.get(&format!("/c/{consortium}/e/{environment}/channels"))
            .await
    }

    async fn services(&self, consortium: &str, environment: &str) -> Result<Vec<Service>> {
        self.get(&format!("/c/{consortium}/e/{environment}/services"))
            .await
    }

    async fn nodes(&self, consortium: &str, environment: &str) -> Result<Vec<Node>> {
        self.get(&format!("/c/{consortium}/e/{environment}/n")).await
    }
}
