//! Command-line definitions and handlers.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hubkit_config::{Config, auth::resolve_token_source};
use hubkit_github::{GitHubClient, IssueFilters, IssueState, SearchQuery, SearchSort, SortOrder};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "hubkit", version, about = "Query the GitHub API through the hubkit client core")]
pub struct Cli {
    /// Read configuration from this file instead of the default locations.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Fail immediately on rate limits instead of waiting.
    #[arg(long, global = true)]
    pub fail_fast: bool,

    /// Print client statistics to stderr when done.
    #[arg(long, global = true)]
    pub stats: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show a repository.
    Repo {
        /// `owner/name`.
        repo: String,
    },

    /// List issues of a repository (pull requests excluded).
    Issues {
        /// `owner/name`.
        repo: String,
        /// Issue state.
        #[arg(long, value_enum, default_value_t = StateArg::Open)]
        state: StateArg,
        /// Only issues carrying all of these labels.
        #[arg(long = "label")]
        labels: Vec<String>,
        /// Page size (1-100).
        #[arg(long, default_value_t = 30)]
        per_page: u8,
        /// Page number.
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Search repositories.
    Search {
        /// Search terms and qualifiers.
        query: String,
        /// Sort key; best match when omitted.
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
        /// Sort ascending instead of descending.
        #[arg(long)]
        asc: bool,
        /// Page number.
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Show a pull request.
    Pr {
        /// `owner/name`.
        repo: String,
        /// Pull request number.
        number: u64,
    },

    /// Show the authenticated user.
    Whoami,

    /// Show the remaining quota of every resource class.
    RateLimit,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StateArg {
    Open,
    Closed,
    All,
}

impl From<StateArg> for IssueState {
    fn from(state: StateArg) -> Self {
        match state {
            StateArg::Open => Self::Open,
            StateArg::Closed => Self::Closed,
            StateArg::All => Self::All,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    Stars,
    Forks,
    HelpWantedIssues,
    Updated,
}

impl From<SortArg> for SearchSort {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Stars => Self::Stars,
            SortArg::Forks => Self::Forks,
            SortArg::HelpWantedIssues => Self::HelpWantedIssues,
            SortArg::Updated => Self::Updated,
        }
    }
}

/// Splits `owner/name`.
pub fn split_repo(full_name: &str) -> Result<(&str, &str)> {
    full_name
        .split_once('/')
        .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
        .with_context(|| format!("expected `owner/name`, got `{full_name}`"))
}

/// Loads configuration, applying the CLI overrides and the credential
/// fallback chain.
pub async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::load_from(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => Config::load().await.context("failed to load configuration")?,
    };

    if cli.fail_fast {
        config.rate_limit = hubkit_config::RateLimitConfig::fail_fast();
    }
    config.token = resolve_token_source(config.token.as_ref()).await;
    debug!(authenticated = config.is_authenticated(), "configuration loaded");

    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Runs one command and returns its JSON output.
pub async fn run(client: &GitHubClient, command: Commands) -> Result<serde_json::Value> {
    match command {
        Commands::Repo { repo } => {
            let (owner, name) = split_repo(&repo)?;
            to_json(client.get_repository(owner, name).await?)
        }
        Commands::Issues {
            repo,
            state,
            labels,
            per_page,
            page,
        } => {
            let (owner, name) = split_repo(&repo)?;
            let filters = IssueFilters {
                state: state.into(),
                labels,
                per_page,
                page,
            };
            to_json(client.list_issues(owner, name, &filters).await?)
        }
        Commands::Search {
            query,
            sort,
            asc,
            page,
        } => {
            let mut search = SearchQuery::new(query).page(page);
            if let Some(sort) = sort {
                search = search.sort(sort.into());
            }
            if asc {
                search = search.order(SortOrder::Asc);
            }
            to_json(client.search_repositories(&search).await?)
        }
        Commands::Pr { repo, number } => {
            let (owner, name) = split_repo(&repo)?;
            to_json(client.get_pull_request(owner, name, number).await?)
        }
        Commands::Whoami => to_json(client.current_user().await?),
        Commands::RateLimit => to_json(client.fetch_rate_limits().await?),
    }
}

fn to_json(value: impl Serialize) -> Result<serde_json::Value> {
    serde_json::to_value(value).context("failed to serialize response")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_repo_accepts_owner_and_name() {
        assert_eq!(split_repo("octo/demo").unwrap(), ("octo", "demo"));
    }

    #[test]
    fn split_repo_rejects_partial_names() {
        assert!(split_repo("octo").is_err());
        assert!(split_repo("/demo").is_err());
        assert!(split_repo("octo/").is_err());
    }

    #[test]
    fn parses_issue_filters() {
        let cli = Cli::try_parse_from([
            "hubkit", "issues", "octo/demo", "--state", "all", "--label", "bug", "--label",
            "good first issue", "--per-page", "50",
        ])
        .unwrap();
        let Commands::Issues {
            state,
            labels,
            per_page,
            ..
        } = cli.command
        else {
            panic!("expected issues command");
        };
        assert!(matches!(state, StateArg::All));
        assert_eq!(labels, vec!["bug", "good first issue"]);
        assert_eq!(per_page, 50);
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["hubkit", "rate-limit", "--fail-fast"]).unwrap();
        assert!(cli.fail_fast);
        assert!(matches!(cli.command, Commands::RateLimit));
    }
}
