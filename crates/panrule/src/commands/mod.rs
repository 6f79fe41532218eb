//! Command dispatch: bridges CLI args -> core resources -> output formatting.

pub mod config_cmd;
pub mod identity_cmd;
pub mod resource;
pub mod rules;
pub mod schema_cmd;
pub mod util;

use std::sync::Arc;

use panrule_core::Appliance;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

pub use resource::Managed;

/// Dispatch an appliance-bound command to its handler.
pub async fn dispatch(
    cmd: Command,
    appliance: Arc<Appliance>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Group(args) => resource::handle(Managed::Group, appliance, args.command, global).await,
        Command::Policy(args) => resource::handle(Managed::Policy, appliance, args.command, global).await,
        Command::Rules(args) => rules::handle(appliance, args, global).await,
        // Offline commands are handled before dispatch
        Command::Config(_) | Command::Identity(_) | Command::Schema(_) | Command::Completions(_) => {
            Err(CliError::Internal("offline command reached the appliance dispatcher".into()))
        }
    }
}
