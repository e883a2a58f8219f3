//! Fablink - bootstrap a client against a managed ledger environment.

use std::fs;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fablink_cli::chooser::{Chooser, TerminalChooser};
use fablink_cli::config::Config;
use fablink_cli::console::{ConsoleClient, ControlPlane};
use fablink_cli::enroll::{CaClient, IdentityEnroller};
use fablink_cli::error::{Error, Result};
use fablink_cli::gateway::GatewayClient;
use fablink_cli::tls::{TlsChainFetcher, TrustAnchorProvider};
use fablink_cli::topology::TopologySelector;
use fablink_cli::wallet::Wallet;

/// Resolve a ledger environment, enroll identities and write a connection
/// profile for it.
#[derive(Parser)]
#[command(name = "fablink", version, about)]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;
    let console = ConsoleClient::new(&config.console_url, &config.api_key);
    let mut chooser = TerminalChooser;

    let topology = TopologySelector::new(&console, &config)
        .resolve(&mut chooser)
        .await?;

    let env_dir = config.env_dir(&topology.environment.id);
    fs::create_dir_all(&env_dir)?;

    let ca_url = topology
        .ca
        .http_url()
        .ok_or_else(|| {
            Error::NotFound(format!("CA service {} has no http url", topology.ca.id))
        })?
        .to_string();

    let anchors = TrustAnchorProvider::new(
        Arc::new(TlsChainFetcher),
        &env_dir.join("console_ca.pem"),
    );
    let anchor = anchors.get(&ca_url).await?;

    let wallet = Wallet::open(&config.root_dir, &topology.environment.id, &topology.membership.id)?;
    let ca = CaClient::new(&ca_url, anchor.pem.as_bytes())?;
    let enroller =
        IdentityEnroller::new(&console, &ca, &wallet, &topology.ca.id, &topology.membership.id);
    enroller.ensure_all(&config.username).await?;

    let mtls = wallet.mtls_paths(&config.username)?;
    let nodes = console
        .nodes(&topology.consortium.id, &topology.environment.id)
        .await?;

    let profile = fablink_core::profile::build(
        &topology,
        &nodes,
        &mtls,
        &anchor.path.to_string_lossy(),
    )?;
    let profile_path = env_dir.join("ccp.yaml");
    fs::write(&profile_path, profile.to_yaml()?)?;
    info!(path = %profile_path.display(), "connection profile written");
    println!("{}", profile_path.display());

    if let Some(gateway_url) = &config.gateway_url {
        run_samples(gateway_url, &config, &topology.channel.name, &mut chooser).await?;
    }

    Ok(())
}

/// Exercise the channel through the REST gateway. Only the initialization
/// transaction is gated on the prompt; the create and query samples always
/// run.
async fn run_samples(
    gateway_url: &str,
    config: &Config,
    channel: &str,
    chooser: &mut dyn Chooser,
) -> Result<()> {
    let gateway = GatewayClient::new(gateway_url, &config.username, channel, &config.contract_name);
    gateway.ensure_identity().await?;

    if chooser.confirm("Call \"InitLedger\"? (y/n) ")? {
        gateway.init_ledger().await?;
        info!("ledger initialized");
    }

    let asset_id = format!("asset-{}", rand::random::<u32>() % 1_000_000);
    gateway.create_asset(&asset_id).await?;
    info!(%asset_id, "asset created");

    let assets = gateway.query_all().await?;
    println!("{}", serde_json::to_string_pretty(&assets).unwrap_or_default());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fablink_cli::chooser::ScriptedChooser;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> Config {
        Config {
            console_url: "https://console.example.com".into(),
            api_key: "k".into(),
            username: "user01".into(),
            contract_name: "asset_transfer".into(),
            root_dir: "/tmp/fablink".into(),
            consortium: None,
            environment: None,
            membership: None,
            gateway_url: None,
        }
    }

    async fn mount_gateway(server: &MockServer, init_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/identities/user01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "user01",
                "enrollmentCert": "cert",
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/transactions"))
            .and(body_partial_json(serde_json::json!({ "func": "InitLedger" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(init_calls)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/transactions"))
            .and(body_partial_json(serde_json::json!({ "func": "CreateAsset" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn declining_init_still_runs_create_and_query() {
        let server = MockServer::start().await;
        mount_gateway(&server, 0).await;

        let cfg = config();
        let mut chooser = ScriptedChooser::new(vec![], vec![false]);
        run_samples(&server.uri(), &cfg, "default-channel", &mut chooser)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn accepting_init_submits_the_initialization_transaction() {
        let server = MockServer::start().await;
        mount_gateway(&server, 1).await;

        let cfg = config();
        let mut chooser = ScriptedChooser::new(vec![], vec![true]);
        run_samples(&server.uri(), &cfg, "default-channel", &mut chooser)
            .await
            .unwrap();
    }
}
