//! # Fablink CLI
//!
//! Bootstraps a client against a managed permissioned-ledger environment:
//! resolves the network topology through the control-plane REST API,
//! provisions identities with the managed CA into a file wallet, harvests
//! the control plane's TLS trust anchor, and writes a connection profile
//! that ledger SDKs can consume directly.
//!
//! The pure document/model logic lives in `fablink-core`; everything in this
//! crate does IO.

pub mod chooser;
pub mod config;
pub mod console;
pub mod enroll;
pub mod error;
pub mod gateway;
pub mod tls;
pub mod topology;
pub mod wallet;

pub use error::{Error, Result};
