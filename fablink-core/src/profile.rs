//! The connection profile document and its pure builder.
//!
//! The profile is assembled as an immutable tree value from a resolved
//! topology and the enrolled user's mutual-TLS material, then serialized to
//! block-style YAML. Cross-referencing sections (`organizations`,
//! `channels`) are checked against the top-level `peers`/`orderers` maps at
//! construction time.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::endpoint::rehost_grpcs;
use crate::model::{ModelError, Node, NodeRole, ResolvedTopology};

/// Profile document format version.
pub const PROFILE_VERSION: &str = "1.1.0";
/// Document name recorded at the top of every emitted profile.
pub const PROFILE_NAME: &str = "fablink-connection-profile";
/// Reserved membership owning the control plane's monitoring nodes; its
/// nodes are never part of the client-facing topology.
pub const MONITOR_MEMBERSHIP: &str = "sys--mon";
/// Endorser timeout recorded under `client.connection.timeout.peer`.
pub const ENDORSER_TIMEOUT: &str = "3000";
/// MSP directory the ledger runtime expects under each organization.
pub const CRYPTO_PATH: &str = "/tmp/msp";

/// Errors raised while assembling a connection profile.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProfileError {
    /// No peer nodes remain after the monitoring-membership exclusion.
    #[error("no peers found in the environment")]
    NoPeers,

    /// No orderer nodes remain after the monitoring-membership exclusion.
    #[error("no orderers found in the environment")]
    NoOrderers,

    /// A node record could not be interpreted.
    #[error(transparent)]
    Node(#[from] ModelError),

    /// A cross-referencing section names a key missing from the
    /// corresponding top-level map.
    #[error("section {section} references unknown key {key}")]
    Inconsistent { section: String, key: String },

    /// The assembled document could not be serialized.
    #[error("failed to serialize connection profile: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// A map that serializes its entries in insertion order, so "the first key
/// encountered" is well-defined for the `organizations` section.
#[derive(Debug, Clone, Default)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        self.0.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn first_key(&self) -> Option<&str> {
        self.0.first().map(|(k, _)| k.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// File paths of the enrolled user's client certificate and key, attached to
/// every node entry for mutual TLS.
#[derive(Debug, Clone)]
pub struct MtlsMaterial {
    pub cert_file: String,
    pub key_file: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionProfile {
    pub version: String,
    pub name: String,
    pub client: ClientSection,
    #[serde(rename = "certificateAuthorities")]
    pub certificate_authorities: OrderedMap<CaEntry>,
    pub peers: OrderedMap<NodeEntry>,
    pub orderers: OrderedMap<NodeEntry>,
    pub organizations: OrderedMap<Organization>,
    pub channels: OrderedMap<ChannelEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientSection {
    pub organization: String,
    pub connection: ConnectionSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSettings {
    pub timeout: TimeoutSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeoutSettings {
    pub peer: PeerTimeout,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerTimeout {
    pub endorser: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaEntry {
    pub url: String,
    #[serde(rename = "tlsCACerts")]
    pub tls_ca_certs: PathRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathRef {
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeEntry {
    pub url: String,
    #[serde(rename = "tlsCACerts")]
    pub tls_ca_certs: PemRef,
    #[serde(rename = "grpcOptions")]
    pub grpc_options: GrpcOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct PemRef {
    pub pem: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrpcOptions {
    #[serde(rename = "clientCertFile")]
    pub client_cert_file: String,
    #[serde(rename = "clientKeyFile")]
    pub client_key_file: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Organization {
    #[serde(rename = "cryptoPath")]
    pub crypto_path: String,
    pub mspid: String,
    pub peers: Vec<String>,
    pub orderers: Vec<String>,
    #[serde(rename = "certificateAuthorities")]
    pub certificate_authorities: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelEntry {
    pub orderers: Vec<String>,
    pub peers: OrderedMap<PeerCapabilities>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerCapabilities {
    #[serde(rename = "endorsingPeer")]
    pub endorsing_peer: bool,
    #[serde(rename = "chaincodeQuery")]
    pub chaincode_query: bool,
    #[serde(rename = "ledgerQuery")]
    pub ledger_query: bool,
    #[serde(rename = "eventSource")]
    pub event_source: bool,
}

impl PeerCapabilities {
    fn all() -> Self {
        Self {
            endorsing_peer: true,
            chaincode_query: true,
            ledger_query: true,
            event_source: true,
        }
    }
}

impl ConnectionProfile {
    /// Serialize the document to block-style, minimally-quoted YAML.
    pub fn to_yaml(&self) -> Result<String, ProfileError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Assemble a connection profile from the resolved topology, the full node
/// list of the environment, the enrolled user's mutual-TLS file paths and
/// the on-disk location of the control-plane trust anchor.
pub fn build(
    topology: &ResolvedTopology,
    nodes: &[Node],
    mtls: &MtlsMaterial,
    trust_anchor_path: &str,
) -> Result<ConnectionProfile, ProfileError> {
    let mut peers = OrderedMap::new();
    let mut orderers = OrderedMap::new();

    for node in nodes {
        if node.membership_id == MONITOR_MEMBERSHIP {
            continue;
        }
        let target = match node.role {
            NodeRole::Peer => &mut peers,
            NodeRole::Orderer => &mut orderers,
            NodeRole::Other => continue,
        };
        target.insert(
            &node.id,
            NodeEntry {
                url: rehost_grpcs(node.endpoint_url()?),
                tls_ca_certs: PemRef {
                    pem: node.trust_cert()?,
                },
                grpc_options: GrpcOptions {
                    client_cert_file: mtls.cert_file.clone(),
                    client_key_file: mtls.key_file.clone(),
                },
            },
        );
    }

    if peers.is_empty() {
        return Err(ProfileError::NoPeers);
    }
    if orderers.is_empty() {
        return Err(ProfileError::NoOrderers);
    }

    let mut certificate_authorities = OrderedMap::new();
    certificate_authorities.insert(
        &topology.ca.membership_id,
        CaEntry {
            url: topology.ca.http_url().unwrap_or_default().to_string(),
            tls_ca_certs: PathRef {
                path: trust_anchor_path.to_string(),
            },
        },
    );

    // Only the first peer and first orderer are listed under the
    // organization, while the channel lists them all. Client runtimes read
    // routing information from `channels`; this shape is preserved as
    // observed.
    let mut organizations = OrderedMap::new();
    organizations.insert(
        &topology.membership.id,
        Organization {
            crypto_path: CRYPTO_PATH.to_string(),
            mspid: topology.membership.id.clone(),
            peers: vec![peers.first_key().unwrap_or_default().to_string()],
            orderers: vec![orderers.first_key().unwrap_or_default().to_string()],
            certificate_authorities: vec![topology.ca.membership_id.clone()],
        },
    );

    let mut channel_peers = OrderedMap::new();
    for key in peers.keys() {
        channel_peers.insert(key, PeerCapabilities::all());
    }
    let mut channels = OrderedMap::new();
    channels.insert(
        &topology.channel.name,
        ChannelEntry {
            orderers: orderers.keys().map(str::to_string).collect(),
            peers: channel_peers,
        },
    );

    let profile = ConnectionProfile {
        version: PROFILE_VERSION.to_string(),
        name: PROFILE_NAME.to_string(),
        client: ClientSection {
            organization: topology.membership.id.clone(),
            connection: ConnectionSettings {
                timeout: TimeoutSettings {
                    peer: PeerTimeout {
                        endorser: ENDORSER_TIMEOUT.to_string(),
                    },
                },
            },
        },
        certificate_authorities,
        peers,
        orderers,
        organizations,
        channels,
    };

    verify_consistency(&profile)?;
    Ok(profile)
}

/// Every peer/orderer key referenced by `organizations` and `channels` must
/// exist in the corresponding top-level map.
fn verify_consistency(profile: &ConnectionProfile) -> Result<(), ProfileError> {
    let missing = |section: &str, key: &str| ProfileError::Inconsistent {
        section: section.to_string(),
        key: key.to_string(),
    };

    for (_, org) in profile.organizations.iter() {
        for key in &org.peers {
            if !profile.peers.contains_key(key) {
                return Err(missing("organizations.peers", key));
            }
        }
        for key in &org.orderers {
            if !profile.orderers.contains_key(key) {
                return Err(missing("organizations.orderers", key));
            }
        }
    }
    for (_, channel) in profile.channels.iter() {
        for key in &channel.orderers {
            if !profile.orderers.contains_key(key) {
                return Err(missing("channels.orderers", key));
            }
        }
        for (key, _) in channel.peers.iter() {
            if !profile.peers.contains_key(key) {
                return Err(missing("channels.peers", key));
            }
        }
    }
    Ok(())
}
