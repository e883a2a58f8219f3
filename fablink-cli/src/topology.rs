//! Topology resolution.
//!
//! Walks the control plane's resource hierarchy top-down (consortium,
//! environment, membership, channel) and locates the CA service owned by
//! the selected membership. Each level is fetched only after the previous
//! one is settled.

use tracing::info;

use fablink_core::{ResolvedTopology, Service};

use crate::chooser::{select_one, Chooser};
use crate::config::Config;
use crate::console::ControlPlane;
use crate::error::{Error, Result};

pub struct TopologySelector<'a> {
    console: &'a dyn ControlPlane,
    config: &'a Config,
}

impl<'a> TopologySelector<'a> {
    pub fn new(console: &'a dyn ControlPlane, config: &'a Config) -> Self {
        Self { console, config }
    }

    /// Resolve the full topology, prompting through `chooser` wherever more
    /// than one candidate remains and no override applies.
    pub async fn resolve(&self, chooser: &mut dyn Chooser) -> Result<ResolvedTopology> {
        let consortia = self.console.consortia().await?;
        let consortium = pick(
            chooser,
            "consortium",
            &consortia,
            self.config.consortium.as_deref(),
            |c| (c.name.clone(), c.id.clone()),
        )?
        .clone();

        let environments = self.console.environments(&consortium.id).await?;
        let environment = pick(
            chooser,
            "environment",
            &environments,
            self.config.environment.as_deref(),
            |e| (e.name.clone(), e.id.clone()),
        )?
        .clone();

        let memberships = self.console.memberships(&consortium.id).await?;
        let membership = pick(
            chooser,
            "membership",
            &memberships,
            self.config.membership.as_deref(),
            |m| (m.org_name.clone(), m.id.clone()),
        )?
        .clone();

        let channels = self
            .console
            .channels(&consortium.id, &environment.id)
            .await?;
        let channel = pick(chooser, "channel", &channels, None, |c| {
            (c.name.clone(), c.id.clone())
        })?
        .clone();

        let services = self
            .console
            .services(&consortium.id, &environment.id)
            .await?;
        let ca = find_ca(&services, &membership.id)?.clone();

        info!(
            consortium = %consortium.id,
            environment = %environment.id,
            membership = %membership.id,
            channel = %channel.name,
            ca = %ca.id,
            "topology resolved"
        );

        Ok(ResolvedTopology {
            consortium,
            environment,
            membership,
            channel,
            ca,
        })
    }
}

/// Select one item, honoring a configured override.
///
/// An override matches either the display name or the id; an override that
/// matches nothing is fatal rather than falling back to prompting.
fn pick<'a, T>(
    chooser: &mut dyn Chooser,
    label: &str,
    items: &'a [T],
    preset: Option<&str>,
    display: impl Fn(&T) -> (String, String),
) -> Result<&'a T> {
    if let Some(wanted) = preset {
        return items
            .iter()
            .find(|item| {
                let (name, id) = display(item);
                name == wanted || id == wanted
            })
            .ok_or_else(|| Error::NotFound(format!("no {label} matching {wanted:?}")));
    }
    select_one(chooser, label, items, display)
}

/// The CA service owned by the selected membership.
fn find_ca<'a>(services: &'a [Service], membership_id: &str) -> Result<&'a Service> {
    services
        .iter()
        .find(|s| s.service == "fabric-ca" && s.membership_id == membership_id)
        .ok_or_else(|| {
            Error::NotFound(format!(
                "no fabric-ca service owned by membership {membership_id}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chooser::ScriptedChooser;
    use async_trait::async_trait;
    use fablink_core::{Channel, Consortium, Environment, Membership, Node};
    use std::collections::HashMap;

    struct FakeControlPlane;

    fn service(id: &str, kind: &str, membership: &str) -> Service {
        Service {
            id: id.to_string(),
            name: id.to_string(),
            service: kind.to_string(),
            membership_id: membership.to_string(),
            urls: HashMap::from([(
                "http".to_string(),
                format!("https://{id}.example.com"),
            )]),
        }
    }

    #[async_trait]
    impl crate::console::Registrar for FakeControlPlane {
        async fn register(&self, _ca_id: &str, _enrollment_id: &str) -> Result<String> {
            unimplemented!("not exercised by topology tests")
        }
    }

    #[async_trait]
    impl ControlPlane for FakeControlPlane {
        async fn consortia(&self) -> Result<Vec<Consortium>> {
            Ok(vec![
                Consortium {
                    id: "c1".into(),
                    name: "net-one".into(),
                },
                Consortium {
                    id: "c2".into(),
                    name: "net-two".into(),
                },
            ])
        }

        async fn environments(&self, _c: &str) -> Result<Vec<Environment>> {
            Ok(vec![Environment {
                id: "e1".into(),
                name: "env-one".into(),
            }])
        }

        async fn memberships(&self, _c: &str) -> Result<Vec<Membership>> {
            Ok(vec![
                Membership {
                    id: "m1".into(),
                    org_name: "Org One".into(),
                },
                Membership {
                    id: "m2".into(),
                    org_name: "Org Two".into(),
                },
            ])
        }

        async fn channels(&self, _c: &str, _e: &str) -> Result<Vec<Channel>> {
            Ok(vec![Channel {
                id: "ch1".into(),
                name: "default-channel".into(),
            }])
        }

        async fn services(&self, _c: &str, _e: &str) -> Result<Vec<Service>> {
            Ok(vec![
                service("svc-other", "ipfs", "m1"),
                service("ca-m2", "fabric-ca", "m2"),
                service("ca-m1", "fabric-ca", "m1"),
            ])
        }

        async fn nodes(&self, _c: &str, _e: &str) -> Result<Vec<Node>> {
            Ok(vec![])
        }
    }

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

    #[tokio::test]
    async fn prompts_resolve_ambiguity_and_ca_matches_membership() {
        let console = FakeControlPlane;
        let cfg = config();
        let selector = TopologySelector::new(&console, &cfg);
        // consortium: pick index 0, membership: pick index 1
        let mut chooser = ScriptedChooser::new(vec![0, 1], vec![]);

        let topology = selector.resolve(&mut chooser).await.unwrap();
        assert_eq!(topology.consortium.id, "c1");
        assert_eq!(topology.environment.id, "e1");
        assert_eq!(topology.membership.id, "m2");
        assert_eq!(topology.channel.name, "default-channel");
        assert_eq!(topology.ca.id, "ca-m2");
    }

    #[tokio::test]
    async fn overrides_bypass_the_prompt() {
        let console = FakeControlPlane;
        let mut cfg = config();
        cfg.consortium = Some("net-two".into());
        cfg.membership = Some("m1".into());
        let selector = TopologySelector::new(&console, &cfg);
        let mut chooser = ScriptedChooser::new(vec![], vec![]);

        let topology = selector.resolve(&mut chooser).await.unwrap();
        assert_eq!(topology.consortium.id, "c2");
        assert_eq!(topology.membership.id, "m1");
        assert_eq!(topology.ca.id, "ca-m1");
    }

    #[tokio::test]
    async fn unmatched_override_is_fatal() {
        let console = FakeControlPlane;
        let mut cfg = config();
        cfg.consortium = Some("no-such-net".into());
        let selector = TopologySelector::new(&console, &cfg);
        let mut chooser = ScriptedChooser::new(vec![0, 0], vec![]);

        let err = selector.resolve(&mut chooser).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "{err}");
    }

    #[test]
    fn missing_ca_for_membership_is_not_found() {
        let services = vec![service("ca-m1", "fabric-ca", "m1")];
        assert!(find_ca(&services, "m1").is_ok());
        assert!(matches!(find_ca(&services, "m9"), Err(Error::NotFound(_))));
    }
}
