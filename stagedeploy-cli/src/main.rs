//! Stagedeploy CLI - provision the streaming demo stack.

mod commands;
mod logging;
mod shell;

use clap::{Parser, Subcommand};
use logging::LogFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stagedeploy")]
#[command(about = "Provision the streaming demo stack stage by stage")]
#[command(version)]
struct Cli {
    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision every stage, skipping what is already ready
    Up {
        /// Run config file
        config: PathBuf,
    },

    /// Validate the config and print the plan without touching anything
    Check {
        /// Run config file
        config: PathBuf,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove deployed components in reverse order
    Teardown {
        /// Run config file
        config: PathBuf,

        /// Also delete the cluster
        #[arg(long)]
        include_cluster: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format);

    let result = match cli.command {
        Commands::Up { config } => commands::up::run(&config).await,
        Commands::Check { config, json } => commands::check::run(&config, json),
        Commands::Teardown {
            config,
            include_cluster,
        } => commands::teardown::run(&config, include_cluster).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_teardown_flags() {
        let cli = Cli::parse_from([
            "stagedeploy",
            "--log-format",
            "json",
            "teardown",
            "deploy.yaml",
            "--include-cluster",
        ]);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::Teardown { include_cluster: true, .. }
        ));
    }
}
