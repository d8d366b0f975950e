//! OAuth2 access tokens for the Compute API: implements `AccessTokenSource`.
//!
//! Three sources are supported: a token handed over through the environment,
//! the gcloud SDK credentials cache (refreshed with its refresh token), and
//! the `gcloud` CLI itself.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::application::ports::{AccessTokenSource, CommandRunner};
use crate::domain::CredentialsError;
use crate::domain::config::{CredentialsConfig, CredentialsSource};

/// Environment variable carrying a ready-made access token.
pub const TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Token endpoint used when the cache does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens expiring sooner than this are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 300;

/// Default timeout for token endpoint requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ── Environment ───────────────────────────────────────────────────────────────

/// A token supplied from outside, used as-is.
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    /// `None` when `token` is absent or blank.
    #[must_use]
    pub fn from_value(token: Option<String>) -> Option<Self> {
        token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(|token| Self { token })
    }
}

impl AccessTokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

// ── gcloud credentials cache ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CacheFile {
    #[serde(default)]
    data: Vec<CacheEntry>,
}

#[derive(Debug, Deserialize)]
struct CacheEntry {
    credential: CachedCredential,
}

/// One OAuth2 user credential as stored by the gcloud SDK.
#[derive(Debug, Clone, Deserialize)]
pub struct CachedCredential {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub access_token: Option<String>,
    pub refresh_token: String,
    #[serde(default)]
    pub token_expiry: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl CachedCredential {
    /// Whether the cached access token is missing or about to expire.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        let has_token = self.access_token.as_deref().is_some_and(|t| !t.is_empty());
        match self.token_expiry.as_deref().and_then(parse_expiry) {
            Some(expiry) if has_token => {
                expiry - now < TimeDelta::seconds(REFRESH_MARGIN_SECS)
            }
            _ => true,
        }
    }
}

/// gcloud writes either RFC 3339 or a bare `YYYY-MM-DDTHH:MM:SSZ`.
fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ")
                .ok()
                .map(|t| t.and_utc())
        })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Reads the first credential of the gcloud cache and refreshes it on demand.
///
/// The cache file itself is never rewritten.
pub struct CredentialsCacheTokenSource {
    path: PathBuf,
    client: reqwest::Client,
    token_uri: Option<String>,
}

impl CredentialsCacheTokenSource {
    /// Read credentials from the cache at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(path: PathBuf) -> Result<Self> {
        Ok(Self {
            path,
            client: token_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
            token_uri: None,
        })
    }

    /// Give up on the token endpoint after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = token_client(timeout)?;
        Ok(self)
    }

    /// Use `uri` instead of the endpoint recorded in the cache.
    #[must_use]
    pub fn with_token_uri(mut self, uri: impl Into<String>) -> Self {
        self.token_uri = Some(uri.into());
        self
    }

    /// Parse the cache file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// holds no credential.
    pub fn read_credential(&self) -> Result<CachedCredential> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read {}", self.path.display()))?;
        let malformed = |reason: String| CredentialsError::MalformedCache {
            path: self.path.display().to_string(),
            reason,
        };
        let file: CacheFile =
            serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;
        file.data
            .into_iter()
            .next()
            .map(|entry| entry.credential)
            .ok_or_else(|| malformed("no credentials stored".to_string()).into())
    }

    async fn refresh(&self, credential: &CachedCredential) -> Result<String> {
        let uri = self
            .token_uri
            .as_deref()
            .or(credential.token_uri.as_deref())
            .unwrap_or(DEFAULT_TOKEN_URI);
        debug!(token_uri = uri, "refreshing access token");
        let response = self
            .client
            .post(uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", credential.client_id.as_str()),
                ("client_secret", credential.client_secret.as_str()),
                ("refresh_token", credential.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CredentialsError::Refresh(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CredentialsError::Refresh(e.to_string()))?;
        if !status.is_success() {
            let reason = format!("{}: {}", status.as_u16(), text.trim());
            return Err(CredentialsError::Refresh(reason).into());
        }
        let token: TokenResponse =
            serde_json::from_str(&text).map_err(|e| CredentialsError::Refresh(e.to_string()))?;
        info!(expires_in = ?token.expires_in, "access token refreshed");
        Ok(token.access_token)
    }
}

fn token_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("docker-cloud/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building token endpoint client")
}

impl AccessTokenSource for CredentialsCacheTokenSource {
    async fn access_token(&self) -> Result<String> {
        let credential = self.read_credential()?;
        match credential.access_token.clone() {
            Some(token) if !credential.needs_refresh(Utc::now()) => Ok(token),
            _ => self.refresh(&credential).await,
        }
    }
}

// ── gcloud CLI ────────────────────────────────────────────────────────────────

/// Asks `gcloud auth print-access-token`.
pub struct GcloudTokenSource<'a, R> {
    runner: &'a R,
}

impl<'a, R: CommandRunner> GcloudTokenSource<'a, R> {
    #[must_use]
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> AccessTokenSource for GcloudTokenSource<'_, R> {
    async fn access_token(&self) -> Result<String> {
        let output = self
            .runner
            .run("gcloud", &["auth", "print-access-token"])
            .await?;
        anyhow::ensure!(
            output.status.success(),
            "gcloud auth print-access-token failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        anyhow::ensure!(!token.is_empty(), "gcloud printed an empty access token");
        Ok(token)
    }
}

// ── Resolution ────────────────────────────────────────────────────────────────

/// Obtain an access token according to `config.source`.
///
/// `env_token` is the value of [`TOKEN_ENV`]; `home` locates the default
/// credentials cache.
///
/// # Errors
///
/// Returns the pinned source's error, or [`CredentialsError::NoSource`] when
/// `auto` finds no usable source.
pub async fn resolve_access_token(
    config: &CredentialsConfig,
    env_token: Option<String>,
    home: Option<&Path>,
    runner: &impl CommandRunner,
) -> Result<String> {
    let cache_path = config
        .cache_path
        .clone()
        .or_else(|| home.map(default_cache_path));
    match config.source {
        CredentialsSource::Env => StaticTokenSource::from_value(env_token)
            .ok_or(CredentialsError::NoSource)?
            .access_token()
            .await,
        CredentialsSource::Cache => {
            let path = cache_path.ok_or(CredentialsError::NoSource)?;
            CredentialsCacheTokenSource::new(path)?.access_token().await
        }
        CredentialsSource::Gcloud => GcloudTokenSource::new(runner).access_token().await,
        CredentialsSource::Auto => {
            if let Some(source) = StaticTokenSource::from_value(env_token) {
                debug!("using access token from {TOKEN_ENV}");
                return source.access_token().await;
            }
            if let Some(path) = cache_path.filter(|p| p.exists()) {
                match CredentialsCacheTokenSource::new(path.clone())?
                    .access_token()
                    .await
                {
                    Ok(token) => return Ok(token),
                    Err(e) => warn!(path = %path.display(), error = %e, "credentials cache unusable"),
                }
            }
            match GcloudTokenSource::new(runner).access_token().await {
                Ok(token) => Ok(token),
                Err(e) => {
                    debug!(error = %e, "gcloud token unavailable");
                    Err(CredentialsError::NoSource.into())
                }
            }
        }
    }
}

/// `~/.config/gcloud/credentials`.
#[must_use]
pub fn default_cache_path(home: &Path) -> PathBuf {
    home.join(".config").join("gcloud").join("credentials")
}
