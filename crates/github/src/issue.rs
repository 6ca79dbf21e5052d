//! Issue listing.
//!
//! - [`IssueFilters`]: Filtering and pagination when listing issues
//! - [`IssueState`]: Filter for issue state (open, closed, or all)
//!
//! # Example
//!
//! ```no_run
//! use hubkit_config::Config;
//! use hubkit_github::{GitHubClient, IssueFilters, IssueState};
//!
//! # async fn example() -> hubkit_github::Result<()> {
//! let client = GitHubClient::new(&Config::default())?;
//!
//! let filters = IssueFilters {
//!     state: IssueState::Open,
//!     labels: vec!["bug".to_string()],
//!     per_page: 10,
//!     ..IssueFilters::default()
//! };
//!
//! for issue in client.list_issues("rust-lang", "rust", &filters).await? {
//!     println!("#{} {}", issue.number, issue.title);
//! }
//! # Ok(())
//! # }
//! ```

use tracing::{debug, instrument};

use crate::client::GitHubClient;
use crate::error::{Error, Result};
use crate::models::Issue;
use crate::repos::validate_segment;
use crate::request::Request;

/// Default page size used by GitHub.
pub const DEFAULT_PER_PAGE: u8 = 30;

/// Largest page size GitHub accepts.
pub const MAX_PER_PAGE: u8 = 100;

/// Options for listing issues.
///
/// # Example
///
/// ```
/// use hubkit_github::{IssueFilters, IssueState};
///
/// let filters = IssueFilters {
///     state: IssueState::All,
///     labels: vec!["enhancement".to_string(), "help wanted".to_string()],
///     per_page: 50,
///     page: 2,
/// };
/// assert_eq!(filters.effective_per_page(), 50);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFilters {
    /// Filter by issue state (default: open).
    pub state: IssueState,
    /// Filter by labels (issues must have ALL these labels).
    pub labels: Vec<String>,
    /// Page size (default: 30, max: 100).
    pub per_page: u8,
    /// 1-based page number; 0 means the first page.
    pub page: u32,
}

impl IssueFilters {
    /// Returns the effective per_page value, clamped between 1 and 100.
    ///
    /// If `per_page` is 0, returns the default of 30.
    #[must_use]
    pub fn effective_per_page(&self) -> u8 {
        match self.per_page {
            0 => DEFAULT_PER_PAGE,
            n => n.min(MAX_PER_PAGE),
        }
    }

    /// Returns the effective page number (at least 1).
    #[must_use]
    pub fn effective_page(&self) -> u32 {
        self.page.max(1)
    }

    fn validate(&self) -> Result<()> {
        for (i, label) in self.labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(Error::invalid_input(
                    format!("labels[{i}]"),
                    "must not be empty",
                ));
            }
            if label.contains(',') {
                return Err(Error::invalid_input(
                    format!("labels[{i}]"),
                    "must not contain a comma",
                ));
            }
        }
        Ok(())
    }
}

/// Issue state filter for GitHub API queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IssueState {
    /// Only open issues (default).
    #[default]
    Open,
    /// Only closed issues.
    Closed,
    /// Both open and closed issues.
    All,
}

impl IssueState {
    /// Returns the `state` query parameter value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

impl GitHubClient {
    /// Lists issues of a repository.
    ///
    /// Pull requests, which GitHub returns from the same endpoint, are
    /// filtered out, so a page may hold fewer than `per_page` entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationFailed`] for invalid input,
    /// [`Error::NotFound`] if the repository does not exist, or any other
    /// typed [`Error`] from the call.
    #[instrument(skip(self, filters), fields(owner = %owner, repo = %name))]
    pub async fn list_issues(
        &self,
        owner: &str,
        name: &str,
        filters: &IssueFilters,
    ) -> Result<Vec<Issue>> {
        validate_segment("owner", owner)?;
        validate_segment("name", name)?;
        filters.validate()?;

        debug!(
            state = ?filters.state,
            labels = ?filters.labels,
            per_page = filters.effective_per_page(),
            page = filters.effective_page(),
            "listing issues"
        );

        let mut request = Request::get("issues.list", format!("/repos/{owner}/{name}/issues"))
            .query("state", filters.state.as_str())
            .query("per_page", filters.effective_per_page())
            .query("page", filters.effective_page());
        if !filters.labels.is_empty() {
            request = request.query("labels", filters.labels.join(","));
        }

        let page: Vec<Issue> = self.execute(request).await?;
        let issues: Vec<Issue> = page
            .into_iter()
            .filter(|issue| !issue.is_pull_request())
            .collect();
        debug!(count = issues.len(), "fetched issues (excluding PRs)");

        Ok(issues)
    }
}
