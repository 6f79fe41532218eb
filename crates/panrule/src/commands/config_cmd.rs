//! Config subcommand handlers.

use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct ProfileSummary {
    name: String,
    host: String,
    auth_mode: String,
    topology: Option<String>,
    active: bool,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Auth")]
    auth_mode: String,
    #[tabled(rename = "Topology")]
    topology: String,
}

fn profile_row(p: &ProfileSummary) -> ProfileRow {
    ProfileRow {
        marker: if p.active { "*" } else { "" },
        name: p.name.clone(),
        host: p.host.clone(),
        auth_mode: p.auth_mode.clone(),
        topology: p.topology.clone().unwrap_or_else(|| "detect".into()),
    }
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet)?;
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => panrule_config::render_redacted(&cfg)?,
                _ => output::render_single(
                    &global.output,
                    &panrule_config::redacted(&cfg),
                    |_| String::new(),
                    |_| String::new(),
                )?,
            };
            output::print_output(&out, global.quiet)?;
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let active = config::active_profile_name(global, &cfg);
            let profiles: Vec<ProfileSummary> = cfg
                .profiles
                .iter()
                .map(|(name, profile)| ProfileSummary {
                    name: name.clone(),
                    host: profile.host.clone(),
                    auth_mode: match profile.auth_mode {
                        panrule_config::AuthMode::ApiKey => "api-key".into(),
                        panrule_config::AuthMode::Password => "password".into(),
                    },
                    topology: profile.topology.as_ref().map(ToString::to_string),
                    active: *name == active,
                })
                .collect();

            let out = output::render_list(&global.output, &profiles, profile_row, |p| p.name.clone())?;
            output::print_output(&out, global.quiet)?;
            Ok(())
        }
    }
}
