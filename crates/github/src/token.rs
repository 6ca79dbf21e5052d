//! Credential lifecycle.
//!
//! The [`TokenManager`] owns the client's credential and hands out a
//! currently valid bearer token on demand.
//!
//! - **Anonymous**: no token; requests go out unauthenticated.
//! - **Static**: a personal access token; always fresh, never refreshed.
//! - **Installation**: short-lived GitHub App installation tokens minted
//!   from a private key. A token is refreshed once it is within the safety
//!   margin of its expiry (`Fresh -> NearExpiry -> Refreshing -> Fresh`).
//!   Refreshes go through a [`SingleFlight`], so concurrent callers share
//!   one mint instead of racing to create duplicate tokens.
//!
//! Tokens are stored as [`SecretString`] and never logged.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hubkit_config::{AppCredentialsConfig, TokenSourceConfig};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::rate_limit::Resource;
use crate::response::classify_failure;
use crate::single_flight::SingleFlight;
use crate::transport::{HttpRequest, Transport};

/// GitHub rejects app JWTs valid for longer than ten minutes.
const APP_JWT_LIFETIME: Duration = Duration::from_secs(9 * 60);

/// Backdating `iat` tolerates clock drift against GitHub.
const APP_JWT_BACKDATE: Duration = Duration::from_secs(60);

/// Deadline for one mint unless the client sets its own.
const DEFAULT_MINT_TIMEOUT: Duration = Duration::from_secs(30);

/// A bearer token with an optional expiry.
#[derive(Clone)]
pub struct AccessToken {
    secret: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    /// Creates a token.
    #[must_use]
    pub fn new(secret: SecretString, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { secret, expires_at }
    }

    /// Returns the secret.
    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Returns when the token expires, if it does.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

/// Where an installation token stands relative to its expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPhase {
    /// Usable without refreshing.
    Fresh,
    /// Inside the safety margin; the next request refreshes it.
    NearExpiry,
    /// No token yet, or the token was invalidated.
    Missing,
}

/// Produces installation tokens.
#[async_trait]
pub trait TokenMinter: Send + Sync {
    /// Mints a new token.
    async fn mint(&self) -> Result<AccessToken>;
}

enum Credential {
    Anonymous,
    Static(SecretString),
    Installation {
        minter: Arc<dyn TokenMinter>,
        margin: Duration,
    },
}

/// Hands out valid bearer tokens and rotates installation tokens.
pub struct TokenManager {
    credential: Credential,
    current: Arc<Mutex<Option<AccessToken>>>,
    refreshes: SingleFlight<(), AccessToken>,
    refresh_count: Arc<AtomicU64>,
    mint_timeout: Duration,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.credential {
            Credential::Anonymous => "anonymous",
            Credential::Static(_) => "static",
            Credential::Installation { .. } => "installation",
        };
        f.debug_struct("TokenManager")
            .field("kind", &kind)
            .field("refresh_count", &self.refresh_count())
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    fn with_credential(credential: Credential) -> Self {
        Self {
            credential,
            current: Arc::new(Mutex::new(None)),
            refreshes: SingleFlight::new(),
            refresh_count: Arc::new(AtomicU64::new(0)),
            mint_timeout: DEFAULT_MINT_TIMEOUT,
        }
    }

    /// Bounds each mint by `timeout`; a mint that takes longer fails with
    /// a timed-out [`Error::Network`].
    #[must_use]
    pub fn with_mint_timeout(mut self, timeout: Duration) -> Self {
        self.mint_timeout = timeout;
        self
    }

    /// A manager that never produces a token.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::with_credential(Credential::Anonymous)
    }

    /// A manager for a long-lived token.
    #[must_use]
    pub fn from_static(token: SecretString) -> Self {
        Self::with_credential(Credential::Static(token))
    }

    /// A manager for installation tokens produced by `minter`, refreshed
    /// `margin` before they expire.
    #[must_use]
    pub fn installation(minter: Arc<dyn TokenMinter>, margin: Duration) -> Self {
        Self::with_credential(Credential::Installation { minter, margin })
    }

    /// Builds a manager from configuration.
    ///
    /// App credentials use `minter` when given, otherwise an
    /// [`AppTokenMinter`] over `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationFailed`] if the private key cannot be
    /// loaded or parsed.
    pub fn from_config(
        source: Option<&TokenSourceConfig>,
        base_url: &str,
        transport: Arc<dyn Transport>,
        minter: Option<Arc<dyn TokenMinter>>,
    ) -> Result<Self> {
        Ok(match source {
            None => Self::anonymous(),
            Some(TokenSourceConfig::StaticToken(token)) => {
                Self::from_static(SecretString::from(token.clone()))
            }
            Some(TokenSourceConfig::App(app)) => {
                let minter: Arc<dyn TokenMinter> = match minter {
                    Some(minter) => minter,
                    None => Arc::new(AppTokenMinter::from_config(app, base_url, transport)?),
                };
                Self::installation(minter, app.refresh_margin())
            }
        })
    }

    /// Returns whether requests carry a credential.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !matches!(self.credential, Credential::Anonymous)
    }

    /// Returns whether the credential can be replaced by refreshing.
    #[must_use]
    pub fn is_refreshable(&self) -> bool {
        matches!(self.credential, Credential::Installation { .. })
    }

    /// Number of mints performed so far.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    /// Returns the phase of the current installation token.
    ///
    /// Anonymous and static credentials are always [`TokenPhase::Fresh`].
    #[must_use]
    pub fn phase(&self) -> TokenPhase {
        match &self.credential {
            Credential::Anonymous | Credential::Static(_) => TokenPhase::Fresh,
            Credential::Installation { margin, .. } => {
                phase_of(self.current.lock().as_ref(), *margin, Utc::now())
            }
        }
    }

    /// Returns a valid token, refreshing first if needed.
    ///
    /// Returns `Ok(None)` for anonymous access.
    ///
    /// # Errors
    ///
    /// Returns the minting error if a refresh was needed and failed.
    pub async fn token(&self) -> Result<Option<SecretString>> {
        match &self.credential {
            Credential::Anonymous => Ok(None),
            Credential::Static(token) => Ok(Some(token.clone())),
            Credential::Installation { minter, margin } => {
                {
                    let current = self.current.lock();
                    if phase_of(current.as_ref(), *margin, Utc::now()) == TokenPhase::Fresh {
                        if let Some(token) = current.as_ref() {
                            return Ok(Some(token.secret.clone()));
                        }
                    }
                }
                let token = self.refresh(Arc::clone(minter)).await?;
                Ok(Some(token.secret))
            }
        }
    }

    /// Reports that GitHub rejected `rejected`.
    ///
    /// The current installation token is dropped only if it is the rejected
    /// one, so a late rejection of a token that was already rotated keeps
    /// its replacement. Returns whether retrying with [`token`](Self::token)
    /// can yield a different credential; static and anonymous credentials
    /// cannot be refreshed.
    pub fn invalidate(&self, rejected: &SecretString) -> bool {
        if !self.is_refreshable() {
            return false;
        }
        let mut current = self.current.lock();
        let is_current = current
            .as_ref()
            .is_some_and(|token| token.secret.expose_secret() == rejected.expose_secret());
        if is_current {
            current.take();
            debug!("installation token invalidated");
        } else {
            debug!("rejected token was already rotated");
        }
        true
    }

    #[instrument(skip_all)]
    async fn refresh(&self, minter: Arc<dyn TokenMinter>) -> Result<AccessToken> {
        let current = Arc::clone(&self.current);
        let count = Arc::clone(&self.refresh_count);
        let timeout = self.mint_timeout;
        let (outcome, _role) = self
            .refreshes
            .run((), move || async move {
                debug!("minting installation token");
                count.fetch_add(1, Ordering::Relaxed);
                let minted = match tokio::time::timeout(timeout, minter.mint()).await {
                    Ok(minted) => minted,
                    Err(_) => Err(Error::Network {
                        message: format!(
                            "installation token request timed out after {}ms",
                            timeout.as_millis()
                        ),
                        timed_out: true,
                    }),
                };
                match minted {
                    Ok(token) => {
                        debug!(expires_at = ?token.expires_at, "installation token refreshed");
                        *current.lock() = Some(token.clone());
                        Ok(token)
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to mint installation token");
                        Err(err)
                    }
                }
            })
            .await;
        outcome
    }
}

fn phase_of(token: Option<&AccessToken>, margin: Duration, now: DateTime<Utc>) -> TokenPhase {
    let Some(token) = token else {
        return TokenPhase::Missing;
    };
    let Some(expires_at) = token.expires_at else {
        return TokenPhase::Fresh;
    };
    let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::MAX);
    match expires_at.checked_sub_signed(margin) {
        Some(refresh_at) if now < refresh_at => TokenPhase::Fresh,
        _ => TokenPhase::NearExpiry,
    }
}

#[derive(Debug, Serialize)]
struct AppClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Debug, Deserialize)]
struct InstallationTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Mints installation tokens for a GitHub App.
///
/// Signs an RS256 JWT with the app's private key and exchanges it at
/// `POST /app/installations/{id}/access_tokens`.
pub struct AppTokenMinter {
    app_id: u64,
    installation_id: u64,
    key: EncodingKey,
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for AppTokenMinter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppTokenMinter")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AppTokenMinter {
    /// Creates a minter from a PEM-encoded RSA private key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationFailed`] if the key is not valid RSA
    /// PEM.
    pub fn new(
        app_id: u64,
        installation_id: u64,
        private_key_pem: &str,
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).map_err(|e| {
            Error::AuthenticationFailed {
                reason: format!("invalid GitHub App private key: {e}"),
            }
        })?;
        Ok(Self {
            app_id,
            installation_id,
            key,
            base_url: base_url.into(),
            transport,
        })
    }

    /// Creates a minter from configuration, reading the key file if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationFailed`] if the key cannot be read or
    /// parsed.
    pub fn from_config(
        app: &AppCredentialsConfig,
        base_url: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let pem = app
            .load_private_key()
            .map_err(|e| Error::AuthenticationFailed {
                reason: e.to_string(),
            })?;
        Self::new(app.app_id, app.installation_id, &pem, base_url, transport)
    }

    fn app_jwt(&self, now: DateTime<Utc>) -> Result<String> {
        let backdate = chrono::Duration::from_std(APP_JWT_BACKDATE).unwrap_or_default();
        let lifetime = chrono::Duration::from_std(APP_JWT_LIFETIME).unwrap_or_default();
        let claims = AppClaims {
            iat: (now - backdate).timestamp(),
            exp: (now + lifetime).timestamp(),
            iss: self.app_id.to_string(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key).map_err(|e| {
            Error::AuthenticationFailed {
                reason: format!("failed to sign app JWT: {e}"),
            }
        })
    }
}

#[async_trait]
impl TokenMinter for AppTokenMinter {
    #[instrument(skip(self), fields(app_id = self.app_id, installation_id = self.installation_id))]
    async fn mint(&self) -> Result<AccessToken> {
        let jwt = self.app_jwt(Utc::now())?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {jwt}")).map_err(|_| {
            Error::AuthenticationFailed {
                reason: "app JWT is not a valid header value".to_string(),
            }
        })?;
        headers.insert(AUTHORIZATION, bearer);

        let request = HttpRequest {
            method: Method::POST,
            url: format!(
                "{}/app/installations/{}/access_tokens",
                self.base_url.trim_end_matches('/'),
                self.installation_id
            ),
            query: Vec::new(),
            headers,
            body: None,
        };

        let response = self.transport.send(request).await?;
        if !response.status.is_success() {
            return Err(classify_failure(
                &response,
                "installation access token",
                Resource::Core,
            ));
        }

        let parsed: InstallationTokenResponse =
            serde_json::from_slice(&response.body).map_err(|e| Error::AuthenticationFailed {
                reason: format!("malformed installation token response: {e}"),
            })?;
        Ok(AccessToken::new(
            SecretString::from(parsed.token),
            Some(parsed.expires_at),
        ))
    }
}
