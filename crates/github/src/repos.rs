//! Repository and pull request lookups.

use tracing::{debug, instrument};

use crate::client::GitHubClient;
use crate::error::{Error, Result};
use crate::models::{PullRequest, Repository};
use crate::request::Request;

/// Checks an owner or repository name before it is spliced into a path.
///
/// Rejects empty values and anything that could escape its path segment.
pub(crate) fn validate_segment(param: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid_input(param, "must not be empty"));
    }
    if value.contains(['/', '\\', '?', '#', '%']) || value.chars().any(char::is_whitespace) {
        return Err(Error::invalid_input(
            param,
            format!("`{value}` is not a valid name"),
        ));
    }
    if value == "." || value == ".." {
        return Err(Error::invalid_input(param, "must not be a relative path"));
    }
    Ok(())
}

impl GitHubClient {
    /// Fetches a repository.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationFailed`] for an invalid owner or name
    /// (with the parameter name as path), [`Error::NotFound`] if the
    /// repository does not exist or is not visible, or any other typed
    /// [`Error`] from the call.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hubkit_config::Config;
    /// use hubkit_github::GitHubClient;
    ///
    /// # async fn example() -> hubkit_github::Result<()> {
    /// let client = GitHubClient::new(&Config::default())?;
    /// let repo = client.get_repository("octocat", "Hello-World").await?;
    /// println!("default branch: {:?}", repo.default_branch);
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(owner = %owner, repo = %name))]
    pub async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository> {
        validate_segment("owner", owner)?;
        validate_segment("name", name)?;

        let repo: Repository = self
            .execute(Request::get("repos.get", format!("/repos/{owner}/{name}")))
            .await?;
        debug!(id = repo.id, "fetched repository");
        Ok(repo)
    }

    /// Fetches a pull request by number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationFailed`] for invalid input (a zero number
    /// included), [`Error::NotFound`] if there is no such pull request, or
    /// any other typed [`Error`] from the call.
    #[instrument(skip(self), fields(owner = %owner, repo = %name))]
    pub async fn get_pull_request(
        &self,
        owner: &str,
        name: &str,
        number: u64,
    ) -> Result<PullRequest> {
        validate_segment("owner", owner)?;
        validate_segment("name", name)?;
        if number == 0 {
            return Err(Error::invalid_input("number", "must be at least 1"));
        }

        self.execute(Request::get(
            "pulls.get",
            format!("/repos/{owner}/{name}/pulls/{number}"),
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_names() {
        for name in ["octocat", "Hello-World", "rust.vim", "a_b", "x"] {
            assert!(validate_segment("name", name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_path_tricks() {
        for name in ["", "  ", "a/b", "..", ".", "a b", "a?x", "a#b", "%2e"] {
            let err = validate_segment("name", name).unwrap_err();
            assert!(
                matches!(err, Error::ValidationFailed { ref path, .. } if path == "name"),
                "{name}"
            );
        }
    }
}
