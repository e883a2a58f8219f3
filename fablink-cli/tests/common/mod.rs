//! Shared harness for bootstrap integration tests.
//!
//! Stands up a wiremock control plane populated with one consortium, one
//! environment, two memberships and a small node set, plus the CA register
//! and enroll endpoints. The TLS harvest is driven by a fetcher that returns
//! a locally-generated self-signed certificate.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fablink_cli::config::Config;
use fablink_cli::error::Result;
use fablink_cli::tls::ChainFetcher;

pub const CONSORTIUM: &str = "c1";
pub const ENVIRONMENT: &str = "e1";
pub const MEMBERSHIP: &str = "m1";
pub const CA_ID: &str = "ca-m1";

/// A PEM certificate to hand out from the fake CA and embed in node records.
pub fn sample_cert_pem() -> String {
    let key = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).unwrap();
    rcgen::CertificateParams::default()
        .self_signed(&key)
        .unwrap()
        .pem()
}

fn node_identity_hex(org_ca_pem: &str) -> String {
    hex::encode(serde_json::json!({ "orgCA": org_ca_pem }).to_string())
}

pub struct BootstrapWorld {
    pub server: MockServer,
    pub org_ca_pem: String,
}

impl BootstrapWorld {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let org_ca_pem = sample_cert_pem();

        Mock::given(method("GET"))
            .and(path("/c"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "_id": CONSORTIUM, "name": "net-one" },
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/c/{CONSORTIUM}/e")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "_id": ENVIRONMENT, "name": "env-one" },
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/c/{CONSORTIUM}/m")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "_id": MEMBERSHIP, "org_name": "Org One" },
                { "_id": "m2", "org_name": "Org Two" },
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/c/{CONSORTIUM}/e/{ENVIRONMENT}/channels")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "_id": "ch1", "name": "default-channel" },
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/c/{CONSORTIUM}/e/{ENVIRONMENT}/services")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "_id": "svc-ipfs",
                    "name": "shared-storage",
                    "service": "ipfs",
                    "membership_id": MEMBERSHIP,
                    "urls": {},
                },
                {
                    "_id": CA_ID,
                    "name": "org-one-ca",
                    "service": "fabric-ca",
                    "membership_id": MEMBERSHIP,
                    "urls": { "http": server.uri() },
                },
            ])))
            .mount(&server)
            .await;

        let identity = node_identity_hex(&org_ca_pem);
        Mock::given(method("GET"))
            .and(path(format!("/c/{CONSORTIUM}/e/{ENVIRONMENT}/n")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "_id": "peer1", "name": "peer-0", "membership_id": MEMBERSHIP,
                    "role": "peer",
                    "urls": { "peer": "http://peer1.example.com:7051" },
                    "node_identity_data": identity,
                },
                {
                    "_id": "peer2", "name": "peer-1", "membership_id": "m2",
                    "role": "peer",
                    "urls": { "peer": "http://peer2.example.com:7051" },
                    "node_identity_data": identity,
                },
                {
                    "_id": "orderer1", "name": "orderer-0", "membership_id": MEMBERSHIP,
                    "role": "orderer",
                    "urls": { "orderer": "http://orderer1.example.com:7050" },
                    "node_identity_data": identity,
                },
                {
                    "_id": "mon1", "name": "monitor", "membership_id": "sys--mon",
                    "role": "peer",
                    "urls": { "peer": "http://mon1.example.com:7051" },
                    "node_identity_data": identity,
                },
            ])))
            .mount(&server)
            .await;

        Self { server, org_ca_pem }
    }

    /// Mount the CA register endpoint, expecting exactly `expected` calls.
    pub async fn mount_register(&self, expected: u64) {
        Mock::given(method("POST"))
            .and(path(format!("/fabric-ca/{CA_ID}/register")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "registrations": [{ "enrollmentSecret": "one-time-secret" }],
            })))
            .expect(expected)
            .mount(&self.server)
            .await;
    }

    /// Mount the CA enroll endpoint, returning `cert_pem` base64-wrapped the
    /// way the CA does.
    pub async fn mount_enroll(&self, cert_pem: &str, expected: u64) {
        Mock::given(method("POST"))
            .and(path("/api/v1/enroll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": { "Cert": STANDARD.encode(cert_pem) },
            })))
            .expect(expected)
            .mount(&self.server)
            .await;
    }

    /// A config pointing at the mock control plane, with all state rooted in
    /// `root` and the membership preselected so no prompt fires.
    pub fn config(&self, root: &Path) -> Config {
        Config {
            console_url: self.server.uri(),
            api_key: "test-key".to_string(),
            username: "user01".to_string(),
            contract_name: "asset_transfer".to_string(),
            root_dir: root.to_path_buf(),
            consortium: None,
            environment: None,
            membership: Some(MEMBERSHIP.to_string()),
            gateway_url: None,
        }
    }
}

/// Chain fetcher backed by a fixed in-memory chain, counting calls.
pub struct FixedChainFetcher {
    chain: Vec<Vec<u8>>,
    pub calls: AtomicUsize,
}

impl FixedChainFetcher {
    pub fn new() -> Self {
        let key = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).unwrap();
        let cert = rcgen::CertificateParams::default().self_signed(&key).unwrap();
        Self {
            chain: vec![cert.der().to_vec()],
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChainFetcher for FixedChainFetcher {
    async fn fetch_chain(&self, _url: &str) -> Result<Vec<Vec<u8>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.chain.clone())
    }
}
