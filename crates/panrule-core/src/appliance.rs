// ── Appliance connection ──
//
// Authenticates against the management interface, works out whether it is
// a firewall or Panorama, and hands back the matching rulebase client.

use std::sync::Arc;

use async_trait::async_trait;
use panrule_api::XmlApiClient;
use tracing::{debug, info};

use crate::config::{ApplianceConfig, AuthCredentials};
use crate::error::CoreError;
use crate::location::{Location, Topology};
use crate::model::PolicyRule;
use crate::rulebase::{Firewall, Panorama, RulebaseClient, RulebaseEdit};

/// A connected appliance of either topology.
#[derive(Clone)]
pub enum Appliance {
    Firewall(Firewall),
    Panorama(Panorama),
}

impl Appliance {
    /// Connect, authenticate and detect the topology.
    ///
    /// With password credentials an API key is generated first. Detection
    /// is skipped when the configuration forces a topology.
    pub async fn connect(config: &ApplianceConfig) -> Result<Self, CoreError> {
        let client = XmlApiClient::new(config.url.clone(), &config.transport())?;

        match &config.auth {
            AuthCredentials::ApiKey(key) => client.set_api_key(key.clone()),
            AuthCredentials::Password { username, password } => {
                client.keygen(username, password).await?;
                debug!(username = %username, "generated API key");
            }
        }

        let topology = match config.topology {
            Some(forced) => {
                debug!(%forced, "topology forced by configuration");
                forced
            }
            None => {
                let platform = client.detect_platform().await.map_err(|e| {
                    if e.is_transient() {
                        CoreError::ConnectionFailed {
                            url: config.url.to_string(),
                            reason: e.to_string(),
                        }
                    } else {
                        e.into()
                    }
                })?;
                Topology::from(platform)
            }
        };

        info!(url = %config.url, %topology, "connected to appliance");
        Ok(Self::from_client(Arc::new(client), topology))
    }

    /// Wrap an already authenticated client.
    pub fn from_client(client: Arc<XmlApiClient>, topology: Topology) -> Self {
        match topology {
            Topology::Standalone => Self::Firewall(Firewall::new(client)),
            Topology::Controller => Self::Panorama(Panorama::new(client)),
        }
    }

    pub fn topology(&self) -> Topology {
        match self {
            Self::Firewall(_) => Topology::Standalone,
            Self::Panorama(_) => Topology::Controller,
        }
    }

    pub fn client(&self) -> &XmlApiClient {
        match self {
            Self::Firewall(fw) => fw.client(),
            Self::Panorama(pano) => pano.client(),
        }
    }
}

#[async_trait]
impl<R: PolicyRule> RulebaseClient<R> for Appliance {
    fn topology(&self) -> Topology {
        Appliance::topology(self)
    }

    async fn get_all(&self, location: &Location) -> Result<Vec<R>, CoreError> {
        match self {
            Self::Firewall(fw) => RulebaseClient::<R>::get_all(fw, location).await,
            Self::Panorama(pano) => RulebaseClient::<R>::get_all(pano, location).await,
        }
    }

    async fn apply_edit(&self, location: &Location, edit: &RulebaseEdit<R>) -> Result<(), CoreError> {
        match self {
            Self::Firewall(fw) => RulebaseClient::<R>::apply_edit(fw, location, edit).await,
            Self::Panorama(pano) => RulebaseClient::<R>::apply_edit(pano, location, edit).await,
        }
    }
}
