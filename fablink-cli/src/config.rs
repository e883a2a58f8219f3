//! Process configuration.
//!
//! All environment access happens here, once, at startup. Components receive
//! an explicit `Config` and never read the environment themselves.

use std::env;
use std::path::PathBuf;

use directories::UserDirs;

use crate::error::{Error, Result};

pub const DEFAULT_CONSOLE_URL: &str = "https://console.kaleido.io/api/v1";
pub const DEFAULT_USER_ID: &str = "user01";
pub const DEFAULT_CONTRACT_NAME: &str = "asset_transfer";

#[derive(Debug, Clone)]
pub struct Config {
    /// Control-plane REST base URL.
    pub console_url: String,
    /// Bearer token for the control plane.
    pub api_key: String,
    /// Enrollment id of the end user to provision.
    pub username: String,
    /// Chaincode name used by the optional sample transactions.
    pub contract_name: String,
    /// Root of all local state ({home}/fablink).
    pub root_dir: PathBuf,
    /// Pre-selected consortium name or id, skipping the prompt.
    pub consortium: Option<String>,
    /// Pre-selected environment name or id.
    pub environment: Option<String>,
    /// Pre-selected membership (org name or id).
    pub membership: Option<String>,
    /// REST gateway base URL; sample transactions are skipped when unset.
    pub gateway_url: Option<String>,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// `APIKEY` is required; everything else has a default or is optional.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("APIKEY")
            .map_err(|_| Error::Config("APIKEY environment variable is required".to_string()))?;
        if api_key.trim().is_empty() {
            return Err(Error::Config("APIKEY must not be empty".to_string()));
        }

        let console_url = env::var("CONSOLE_URL")
            .unwrap_or_else(|_| DEFAULT_CONSOLE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let home = UserDirs::new()
            .map(|d| d.home_dir().to_path_buf())
            .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))?;

        Ok(Self {
            console_url,
            api_key,
            username: env::var("USER_ID").unwrap_or_else(|_| DEFAULT_USER_ID.to_string()),
            contract_name: env::var("CCNAME")
                .unwrap_or_else(|_| DEFAULT_CONTRACT_NAME.to_string()),
            root_dir: home.join("fablink"),
            consortium: env::var("CONSORTIUM").ok(),
            environment: env::var("ENVIRONMENT").ok(),
            membership: env::var("SUBMITTER").ok(),
            gateway_url: env::var("GATEWAY_URL").ok(),
        })
    }

    /// Directory holding all state scoped to one environment.
    pub fn env_dir(&self, environment_id: &str) -> PathBuf {
        self.root_dir.join(environment_id)
    }
}
