//! Response models.
//!
//! Only the fields the client surface relies on are modeled; unknown fields
//! are ignored. Optional upstream fields are `Option` so that a missing
//! value is not mistaken for a malformed payload, while required ones fail
//! validation with their field path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A GitHub account (user, organization, or bot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Numeric account ID.
    pub id: u64,
    /// Login name.
    pub login: String,
    /// `User`, `Organization`, or `Bot`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Display name (only on the full user object).
    #[serde(default)]
    pub name: Option<String>,
    /// Profile page.
    pub html_url: String,
    /// Avatar image.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Numeric repository ID.
    pub id: u64,
    /// Short name.
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    /// The owning account.
    pub owner: User,
    /// Whether the repository is private.
    pub private: bool,
    /// Repository description.
    #[serde(default)]
    pub description: Option<String>,
    /// Web page.
    pub html_url: String,
    /// Default branch name.
    #[serde(default)]
    pub default_branch: Option<String>,
    /// Primary language.
    #[serde(default)]
    pub language: Option<String>,
    /// Whether this is a fork.
    #[serde(default)]
    pub fork: bool,
    /// Whether the repository is archived.
    #[serde(default)]
    pub archived: bool,
    /// Star count.
    #[serde(default)]
    pub stargazers_count: u64,
    /// Fork count.
    #[serde(default)]
    pub forks_count: u64,
    /// Open issues and pull requests.
    #[serde(default)]
    pub open_issues_count: u64,
    /// Topics.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Last push.
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
    /// Last update.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// An issue label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label name.
    pub name: String,
    /// Hex color without `#`.
    #[serde(default)]
    pub color: Option<String>,
    /// Label description.
    #[serde(default)]
    pub description: Option<String>,
}

/// `open` or `closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Open.
    Open,
    /// Closed.
    Closed,
}

/// An issue.
///
/// The issues endpoint also lists pull requests; those carry a
/// `pull_request` member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Numeric issue ID.
    pub id: u64,
    /// Issue number within the repository.
    pub number: u64,
    /// Title.
    pub title: String,
    /// Markdown body.
    #[serde(default)]
    pub body: Option<String>,
    /// Open or closed.
    pub state: State,
    /// Author.
    pub user: User,
    /// Labels.
    #[serde(default)]
    pub labels: Vec<Label>,
    /// Assignees.
    #[serde(default)]
    pub assignees: Vec<User>,
    /// Comment count.
    #[serde(default)]
    pub comments: u64,
    /// Web page.
    pub html_url: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub updated_at: DateTime<Utc>,
    /// Close time.
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// Present when this entry is a pull request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<Value>,
}

impl Issue {
    /// Returns whether this entry is a pull request.
    #[must_use]
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// One side of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    /// `owner:branch`.
    pub label: String,
    /// Branch name.
    #[serde(rename = "ref")]
    pub ref_name: String,
    /// Head commit SHA.
    pub sha: String,
}

/// A pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Numeric pull request ID.
    pub id: u64,
    /// Number within the repository.
    pub number: u64,
    /// Title.
    pub title: String,
    /// Markdown body.
    #[serde(default)]
    pub body: Option<String>,
    /// Open or closed.
    pub state: State,
    /// Whether it is a draft.
    #[serde(default)]
    pub draft: bool,
    /// Whether it was merged.
    #[serde(default)]
    pub merged: bool,
    /// Author.
    pub user: User,
    /// Source branch.
    pub head: BranchRef,
    /// Target branch.
    pub base: BranchRef,
    /// Web page.
    pub html_url: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub updated_at: DateTime<Utc>,
    /// Merge time.
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

/// A page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults<T> {
    /// Total matches (not just this page).
    pub total_count: u64,
    /// Whether the search timed out and results may be partial.
    #[serde(default)]
    pub incomplete_results: bool,
    /// The matches on this page.
    pub items: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> Value {
        json!({"id": 1, "login": "octocat", "type": "User", "html_url": "https://github.com/octocat"})
    }

    #[test]
    fn repository_tolerates_missing_optional_fields() {
        let repo: Repository = serde_json::from_value(json!({
            "id": 42,
            "name": "demo",
            "full_name": "octo/demo",
            "owner": user(),
            "private": false,
            "html_url": "https://github.com/octo/demo",
            "stargazers_count": 7,
            "extra": {"ignored": true}
        }))
        .unwrap();
        assert_eq!(repo.full_name, "octo/demo");
        assert_eq!(repo.stargazers_count, 7);
        assert!(repo.description.is_none());
        assert!(repo.topics.is_empty());
    }

    #[test]
    fn issue_detects_pull_requests() {
        let issue: Issue = serde_json::from_value(json!({
            "id": 1,
            "number": 5,
            "title": "Add thing",
            "state": "open",
            "user": user(),
            "html_url": "https://github.com/octo/demo/pull/5",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z",
            "pull_request": {"url": "https://api.github.com/repos/octo/demo/pulls/5"}
        }))
        .unwrap();
        assert!(issue.is_pull_request());
        assert_eq!(issue.state, State::Open);
    }

    #[test]
    fn branch_ref_uses_ref_key() {
        let branch: BranchRef =
            serde_json::from_value(json!({"label": "octo:main", "ref": "main", "sha": "abc123"}))
                .unwrap();
        assert_eq!(branch.ref_name, "main");
    }
}
