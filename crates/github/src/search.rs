//! Repository search.

use std::fmt;

use tracing::{debug, instrument};

use crate::client::GitHubClient;
use crate::error::{Error, Result};
use crate::issue::{DEFAULT_PER_PAGE, MAX_PER_PAGE};
use crate::models::{Repository, SearchResults};
use crate::rate_limit::Resource;
use crate::request::Request;

/// GitHub rejects search queries longer than this.
const MAX_QUERY_LEN: usize = 256;

/// Sort key for repository search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSort {
    /// Star count.
    Stars,
    /// Fork count.
    Forks,
    /// Issues labeled `help-wanted`.
    HelpWantedIssues,
    /// Last update.
    Updated,
}

impl SearchSort {
    /// Returns the `sort` query parameter value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stars => "stars",
            Self::Forks => "forks",
            Self::HelpWantedIssues => "help-wanted-issues",
            Self::Updated => "updated",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Descending (default).
    #[default]
    Desc,
    /// Ascending.
    Asc,
}

impl SortOrder {
    /// Returns the `order` query parameter value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desc => "desc",
            Self::Asc => "asc",
        }
    }
}

/// A repository search.
///
/// # Example
///
/// ```
/// use hubkit_github::{SearchQuery, SearchSort, SortOrder};
///
/// let query = SearchQuery::new("tokio language:rust")
///     .sort(SearchSort::Stars)
///     .order(SortOrder::Desc)
///     .page(2);
/// assert_eq!(query.to_string(), "tokio language:rust");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// The search terms and qualifiers.
    pub query: String,
    /// Sort key; best match when `None`.
    pub sort: Option<SearchSort>,
    /// Sort direction, only sent with a sort key.
    pub order: SortOrder,
    /// 1-based page number; 0 means the first page.
    pub page: u32,
    /// Page size (default: 30, max: 100).
    pub per_page: u8,
}

impl SearchQuery {
    /// A best-match search for `query`.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            sort: None,
            order: SortOrder::default(),
            page: 0,
            per_page: 0,
        }
    }

    /// Sets the sort key.
    #[must_use]
    pub fn sort(mut self, sort: SearchSort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Sets the sort direction.
    #[must_use]
    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Sets the page number.
    #[must_use]
    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn per_page(mut self, per_page: u8) -> Self {
        self.per_page = per_page;
        self
    }

    fn validate(&self) -> Result<()> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(Error::invalid_input("query", "must not be empty"));
        }
        if query.len() > MAX_QUERY_LEN {
            return Err(Error::invalid_input(
                "query",
                format!("must be at most {MAX_QUERY_LEN} characters"),
            ));
        }
        Ok(())
    }

    fn to_request(&self) -> Request {
        let per_page = match self.per_page {
            0 => DEFAULT_PER_PAGE,
            n => n.min(MAX_PER_PAGE),
        };
        let mut request = Request::get("search.repositories", "/search/repositories")
            .resource(Resource::Search)
            .query("q", self.query.trim())
            .query("per_page", per_page)
            .query("page", self.page.max(1));
        if let Some(sort) = self.sort {
            request = request
                .query("sort", sort.as_str())
                .query("order", self.order.as_str());
        }
        request
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query)
    }
}

impl GitHubClient {
    /// Searches repositories.
    ///
    /// Charged to the `search` rate-limit class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationFailed`] for an empty or oversized query,
    /// or any other typed [`Error`] from the call.
    #[instrument(skip(self, query), fields(query = %query))]
    pub async fn search_repositories(
        &self,
        query: &SearchQuery,
    ) -> Result<SearchResults<Repository>> {
        query.validate()?;
        let results: SearchResults<Repository> = self.execute(query.to_request()).await?;
        debug!(
            total = results.total_count,
            returned = results.items.len(),
            "searched repositories"
        );
        Ok(results)
    }
}
