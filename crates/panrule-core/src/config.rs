// ── Runtime connection configuration ──
//
// These types describe how to reach one appliance. They carry credentials
// and connection tuning but never touch disk; the CLI builds an
// `ApplianceConfig` from its profile and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use panrule_api::{TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::location::Topology;

/// How to authenticate with the appliance.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// Pre-generated API key, sent as `X-PAN-KEY`.
    ApiKey(SecretString),
    /// Administrator login, exchanged for an API key with `keygen`.
    Password {
        username: String,
        password: SecretString,
    },
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. Management interfaces ship self-signed.
    #[default]
    DangerAcceptInvalid,
}

/// Configuration for connecting to a single firewall or Panorama.
#[derive(Debug, Clone)]
pub struct ApplianceConfig {
    /// Management URL, e.g. `https://fw.example.com`.
    pub url: Url,
    pub auth: AuthCredentials,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Skip platform detection and assume this topology.
    pub topology: Option<Topology>,
}

impl ApplianceConfig {
    pub fn new(url: Url, auth: AuthCredentials) -> Self {
        Self {
            url,
            auth,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            topology: None,
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }
}
