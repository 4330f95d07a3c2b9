//! OAuth2 client-credentials token provider for the fleet API.
//!
//! Tokens are cached until the configured expiry skew is reached. Reads are
//! optimistic (shared lock); a miss takes the exclusive section, re-checks
//! validity, and only then refreshes, so concurrent first uses trigger a
//! single network exchange.

use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use crate::config::AuthConfig;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token request rejected (status={0})")]
    Status(u16),
    #[error("token response did not include an access token")]
    MissingToken,
}

#[derive(Debug, Clone)]
struct Token {
    value: String,
    expires_at_epoch_secs: i64,
}

impl Token {
    fn is_valid(&self, now_epoch_secs: i64, skew_secs: i64) -> bool {
        now_epoch_secs + skew_secs < self.expires_at_epoch_secs
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

/// Retrieves and caches access tokens using the client-credentials grant.
pub struct TokenProvider {
    config: AuthConfig,
    http: reqwest::blocking::Client,
    cached: RwLock<Option<Token>>,
}

impl TokenProvider {
    pub fn new(config: AuthConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            config,
            http,
            cached: RwLock::new(None),
        })
    }

    /// Returns a valid access token, refreshing it when the cached one is
    /// absent or inside the expiry skew.
    pub fn access_token(&self) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let skew = self.config.token_expiry_skew_secs as i64;

        {
            let cached = self.cached.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(token) = cached.as_ref() {
                if token.is_valid(now, skew) {
                    return Ok(token.value.clone());
                }
            }
        }

        let mut cached = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = cached.as_ref() {
            if token.is_valid(now, skew) {
                return Ok(token.value.clone());
            }
        }

        let refreshed = self.fetch_token()?;
        let value = refreshed.value.clone();
        *cached = Some(refreshed);
        Ok(value)
    }

    fn fetch_token(&self) -> Result<Token, AuthError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status(status.as_u16()));
        }

        let body: TokenResponse = response.json()?;
        if body.access_token.trim().is_empty() {
            return Err(AuthError::MissingToken);
        }

        let expires_in = if body.expires_in > 0 {
            body.expires_in
        } else {
            60
        };
        debug!(expires_in, "fetched access token");
        Ok(Token {
            value: body.access_token,
            expires_at_epoch_secs: Utc::now().timestamp() + expires_in,
        })
    }
}
