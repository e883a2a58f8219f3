//! # Fablink Core
//!
//! Pure domain types and logic for assembling connection profiles against a
//! managed permissioned-ledger control plane.
//!
//! This crate is intentionally **IO-free**:
//! - No filesystem operations
//! - No network calls
//! - No prompts or terminal interaction
//!
//! All types are plain Rust structs/enums with serde serialization. The
//! actual IO (REST discovery, CA enrollment, TLS harvesting, persistence)
//! lives in `fablink-cli`.
//!
//! ## Modules
//!
//! - [`model`] - Remote control-plane resources and the resolved topology
//! - [`endpoint`] - Node endpoint rewriting
//! - [`pem`] - PEM normalization for harvested certificate chains
//! - [`profile`] - The connection profile document and its pure builder

pub mod endpoint;
pub mod model;
pub mod pem;
pub mod profile;

pub use model::{
    Channel, Consortium, Environment, Membership, ModelError, Node, NodeRole, ResolvedTopology,
    Service,
};
pub use profile::{ConnectionProfile, MtlsMaterial, OrderedMap, ProfileError};
