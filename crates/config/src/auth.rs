//! Credential resolution.
//!
//! Credentials are resolved with a fallback chain:
//!
//! 1. The configured [`TokenSourceConfig`] (file or environment)
//! 2. `gh auth token` (GitHub CLI)
//! 3. Unauthenticated (returns `None`)

use crate::error::{ConfigError, Result};
use crate::token::TokenSourceConfig;

/// Resolves the credential source to use.
///
/// # Examples
///
/// ```no_run
/// use hubkit_config::{Config, auth::resolve_token_source};
///
/// # async fn example() -> hubkit_config::Result<()> {
/// let config = Config::load().await?;
/// match resolve_token_source(config.token.as_ref()).await {
///     Some(_) => println!("authenticated access"),
///     None => println!("unauthenticated access"),
/// }
/// # Ok(())
/// # }
/// ```
pub async fn resolve_token_source(
    configured: Option<&TokenSourceConfig>,
) -> Option<TokenSourceConfig> {
    if let Some(source) = configured {
        return Some(source.clone());
    }

    get_gh_token()
        .await
        .ok()
        .flatten()
        .map(TokenSourceConfig::StaticToken)
}

/// Gets a GitHub token from the `gh` CLI.
///
/// # Returns
///
/// - `Ok(Some(token))` if the command succeeds and returns a token
/// - `Ok(None)` if `gh` is not installed or not logged in
/// - `Err(...)` if the command exists but fails otherwise
///
/// # Errors
///
/// Returns an error if `gh` cannot be spawned for a reason other than not
/// being installed, or if it exits with an unexpected failure.
pub async fn get_gh_token() -> Result<Option<String>> {
    use tokio::process::Command;

    let output = match Command::new("gh").args(["auth", "token"]).output().await {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::GhAuthFailed(e)),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if stderr.contains("not logged in") || stderr.contains("no oauth token") {
            return Ok(None);
        }
        return Err(ConfigError::GhAuthError {
            code: output.status.code(),
            stderr,
        });
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok((!token.is_empty()).then_some(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::AppCredentialsConfig;

    #[tokio::test]
    async fn configured_static_token_wins() {
        let source = TokenSourceConfig::StaticToken("ghp_config".to_string());
        let resolved = resolve_token_source(Some(&source)).await;
        assert_eq!(resolved, Some(source));
    }

    #[tokio::test]
    async fn configured_app_credentials_win() {
        let source = TokenSourceConfig::App(AppCredentialsConfig::with_inline_key(1, 2, "pem"));
        let resolved = resolve_token_source(Some(&source)).await;
        assert_eq!(resolved, Some(source));
    }

    #[tokio::test]
    async fn gh_cli_fallback_does_not_panic() {
        // Whether gh is installed or logged in depends on the machine.
        let _resolved = resolve_token_source(None).await;
    }
}
