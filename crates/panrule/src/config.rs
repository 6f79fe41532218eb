//! CLI configuration: a thin wrapper around `panrule_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides (--host,
//! --api-key, --insecure, --timeout, --topology).

use std::io::IsTerminal;
use std::time::Duration;

use secrecy::SecretString;
use tracing::debug;

use panrule_config::{AuthMode, Config, ConfigError, Profile};
use panrule_core::{ApplianceConfig, AuthCredentials, TlsVerification, Topology};

use crate::cli::{GlobalOpts, TopologyArg};
use crate::error::CliError;

pub use panrule_config::{config_path, load_config};

impl From<TopologyArg> for Topology {
    fn from(arg: TopologyArg) -> Self {
        match arg {
            TopologyArg::Standalone => Topology::Standalone,
            TopologyArg::Controller => Topology::Controller,
        }
    }
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build an `ApplianceConfig` from the config file, profile, and flags.
pub fn build_appliance_config(global: &GlobalOpts) -> Result<ApplianceConfig, CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        return resolve_profile(profile, &profile_name, &cfg, global);
    }

    // A profile named explicitly must exist.
    if global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(&cfg),
            path: config_path().display().to_string(),
        });
    }

    // No profile -- build from flags / env alone.
    let host = global.host.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let url = panrule_config::parse_host(host)?;
    let key = global.api_key.as_ref().ok_or_else(|| CliError::NoCredentials {
        profile: profile_name.clone(),
    })?;

    let mut config = ApplianceConfig::new(url, AuthCredentials::ApiKey(SecretString::from(key.clone())));
    config.tls = if global.insecure || cfg.defaults.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };
    config.timeout = Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout));
    config.topology = global.topology.map(Topology::from);
    Ok(config)
}

/// Translate a `Profile` plus global flags into an `ApplianceConfig`.
///
/// Flag overrides take priority over profile values.
fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<ApplianceConfig, CliError> {
    let url = panrule_config::parse_host(global.host.as_deref().unwrap_or(&profile.host))?;

    let auth = match (&global.api_key, profile.auth_mode) {
        (Some(key), _) => AuthCredentials::ApiKey(SecretString::from(key.clone())),
        (None, AuthMode::ApiKey) => {
            AuthCredentials::ApiKey(panrule_config::resolve_api_key(profile, profile_name)?)
        }
        (None, AuthMode::Password) => password_credentials(profile, profile_name)?,
    };

    let tls = if global.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        panrule_config::resolve_tls(profile, &cfg.defaults)
    };

    let timeout = global
        .timeout
        .or(profile.timeout)
        .unwrap_or(cfg.defaults.timeout);

    let mut config = ApplianceConfig::new(url, auth);
    config.tls = tls;
    config.timeout = Duration::from_secs(timeout);
    config.topology = global.topology.map(Topology::from).or(profile.topology);
    debug!(profile = profile_name, url = %config.url, "resolved appliance config");
    Ok(config)
}

/// Password credentials, prompting on a terminal when none are stored.
fn password_credentials(profile: &Profile, profile_name: &str) -> Result<AuthCredentials, CliError> {
    match panrule_config::resolve_password_credentials(profile, profile_name) {
        Ok((username, password)) => Ok(AuthCredentials::Password { username, password }),
        Err(ConfigError::NoCredentials { .. })
            if profile.username.is_some() && std::io::stdin().is_terminal() =>
        {
            let username = profile.username.clone().unwrap_or_default();
            let password = rpassword::prompt_password(format!("Password for {username}: "))?;
            Ok(AuthCredentials::Password {
                username,
                password: SecretString::from(password),
            })
        }
        Err(e) => Err(e.into()),
    }
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        return "(none)".into();
    }
    cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
}
