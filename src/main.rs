//! hubkit - A command-line front end for the hubkit GitHub client core.
//!
//! Loads the configuration, builds one client, runs a single typed call, and
//! prints the result as JSON.

use std::process::ExitCode;

use clap::Parser;
use hubkit_github::GitHubClient;
use tracing_subscriber::EnvFilter;

mod cli;
use cli::Cli;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "HUBKIT_LOG";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli::load_config(&cli).await?;
    let client = GitHubClient::new(&config)?;
    let show_stats = cli.stats;

    let outcome = cli::run(&client, cli.command).await;

    if show_stats {
        eprintln!("{:?}", client.stats());
    }

    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            // Typed client errors get the user-safe message; detail goes to the log.
            match err.downcast_ref::<hubkit_github::Error>() {
                Some(api) => {
                    tracing::error!(error = %api, kind = ?api.kind(), "request failed");
                    eprintln!("error: {}", api.user_message());
                }
                None => eprintln!("error: {err:#}"),
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
