//! Remote control-plane resources.
//!
//! Every type here mirrors a JSON document served by the control-plane REST
//! API. Resources are fetched read-only and never mutated locally; they live
//! for a single resolution pass.

use std::collections::HashMap;

use serde::Deserialize;

/// Errors raised while interpreting a remote resource.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ModelError {
    /// `node_identity_data` was not valid hexadecimal.
    #[error("node {node}: identity data is not valid hex: {source}")]
    IdentityHex {
        node: String,
        source: hex::FromHexError,
    },

    /// The decoded identity payload was not the expected JSON document.
    #[error("node {node}: identity payload is not valid JSON: {source}")]
    IdentityJson {
        node: String,
        source: serde_json::Error,
    },

    /// The node advertises no URL for its role.
    #[error("node {node}: no advertised endpoint url for role {role}")]
    MissingUrl { node: String, role: String },
}

/// A business network (top-level scoping resource).
#[derive(Debug, Clone, Deserialize)]
pub struct Consortium {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

/// A deployment environment within a consortium.
#[derive(Debug, Clone, Deserialize)]
pub struct Environment {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

/// An organization's membership in a consortium.
#[derive(Debug, Clone, Deserialize)]
pub struct Membership {
    #[serde(rename = "_id")]
    pub id: String,
    pub org_name: String,
}

/// A ledger channel within an environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

/// A managed service within an environment. The bootstrap flow only cares
/// about certificate authorities (`service == "fabric-ca"`).
#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub service: String,
    pub membership_id: String,
    #[serde(default)]
    pub urls: HashMap<String, String>,
}

impl Service {
    /// The HTTP endpoint advertised by the service, if any.
    pub fn http_url(&self) -> Option<&str> {
        self.urls.get("http").map(String::as_str)
    }
}

/// The role a node plays in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Peer,
    Orderer,
    #[serde(other)]
    Other,
}

impl NodeRole {
    /// The key under which a node of this role advertises its URL.
    pub fn url_key(&self) -> &'static str {
        match self {
            NodeRole::Peer => "peer",
            NodeRole::Orderer => "orderer",
            NodeRole::Other => "",
        }
    }
}

/// A peer or orderer node within an environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub membership_id: String,
    pub role: NodeRole,
    #[serde(default)]
    pub urls: HashMap<String, String>,
    #[serde(default)]
    pub node_identity_data: String,
}

/// The identity payload embedded in a node record. The control plane returns
/// it hex-encoded; the decoded bytes are a UTF-8 JSON document carrying the
/// organization CA certificate for that node.
#[derive(Debug, Deserialize)]
struct NodeIdentityData {
    #[serde(rename = "orgCA")]
    org_ca: String,
}

impl Node {
    /// The URL the node advertises for its role.
    pub fn endpoint_url(&self) -> Result<&str, ModelError> {
        self.urls
            .get(self.role.url_key())
            .map(String::as_str)
            .ok_or_else(|| ModelError::MissingUrl {
                node: self.id.clone(),
                role: self.role.url_key().to_string(),
            })
    }

    /// Decode `node_identity_data` and extract the node's TLS trust
    /// certificate (the `orgCA` field of the embedded JSON payload).
    pub fn trust_cert(&self) -> Result<String, ModelError> {
        let decoded = hex::decode(&self.node_identity_data).map_err(|source| {
            ModelError::IdentityHex {
                node: self.id.clone(),
                source,
            }
        })?;
        let payload: NodeIdentityData =
            serde_json::from_slice(&decoded).map_err(|source| ModelError::IdentityJson {
                node: self.id.clone(),
                source,
            })?;
        Ok(payload.org_ca)
    }
}

/// The slice of remote network state pinned down by one resolution pass.
///
/// All five fields are present by construction; the node-list invariants
/// (at least one peer and one orderer after the monitoring-membership
/// exclusion) are enforced by the profile builder.
#[derive(Debug, Clone)]
pub struct ResolvedTopology {
    pub consortium: Consortium,
    pub environment: Environment,
    pub membership: Membership,
    pub channel: Channel,
    pub ca: Service,
}
