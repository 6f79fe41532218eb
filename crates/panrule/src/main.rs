mod cli;
mod commands;
mod config;
mod error;
mod output;
mod state;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use panrule_core::Appliance;

use crate::cli::{Cli, Command, ResourceCommand};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Offline commands: no appliance connection
        Command::Config(args) => commands::config_cmd::handle(&args, &cli.global),
        Command::Identity(args) => commands::identity_cmd::handle(args, &cli.global),
        Command::Schema(args) => commands::schema_cmd::handle(&args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "panrule", &mut std::io::stdout());
            Ok(())
        }

        Command::Group(args) if matches!(args.command, ResourceCommand::Migrate { .. }) => {
            commands::resource::migrate_offline(commands::Managed::Group, args.command, &cli.global)
        }
        Command::Policy(args) if matches!(args.command, ResourceCommand::Migrate { .. }) => {
            commands::resource::migrate_offline(commands::Managed::Policy, args.command, &cli.global)
        }

        // Everything else talks to the appliance
        cmd => {
            let appliance_config = config::build_appliance_config(&cli.global)?;
            let appliance = Appliance::connect(&appliance_config).await?;

            tracing::debug!(command = ?cmd, topology = %appliance.topology(), "dispatching command");
            commands::dispatch(cmd, Arc::new(appliance), &cli.global).await
        }
    }
}
