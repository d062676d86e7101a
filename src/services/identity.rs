//! Identity-provider client
//!
//! Proxies email/password sign-in and session lookups to the external
//! identity provider. Provider error codes never reach the user raw;
//! they are folded into the canonical sign-in failure categories.

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::domain::auth::{
    ProviderAuthResponse, ProviderErrorResponse, ProviderUser, SignInErrorKind,
};

/// Client for the identity provider's auth API.
#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    base_url: String,
    api_key: String,
}

/// A sign-in attempt that the provider rejected, already categorized.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("{}", .kind.user_message())]
pub struct SignInFailure {
    pub kind: SignInErrorKind,
}

impl IdentityClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(base_url = base_url, "Identity client initialized");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Exchange email/password credentials for a session.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderAuthResponse, SignInFailure> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        debug!(url = %url, "Identity sign-in request");

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Identity provider unreachable");
                SignInFailure {
                    kind: SignInErrorKind::NetworkFailure,
                }
            })?;

        if !response.status().is_success() {
            let kind = response
                .json::<ProviderErrorResponse>()
                .await
                .map(|body| body.kind())
                .unwrap_or(SignInErrorKind::Unknown);
            return Err(SignInFailure { kind });
        }

        response.json::<ProviderAuthResponse>().await.map_err(|e| {
            tracing::warn!(error = %e, "Unexpected identity provider response shape");
            SignInFailure {
                kind: SignInErrorKind::Unknown,
            }
        })
    }

    /// Invalidate the provider-side session for a token. Failures are
    /// logged and swallowed; the local session is gone either way.
    pub async fn sign_out(&self, token: &str) {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let result = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "Provider sign-out failed");
        }
    }

    /// Fetch the user record behind a session token.
    pub async fn get_user(&self, token: &str) -> Result<ProviderUser> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .context("Failed to reach identity provider")?;

        if !response.status().is_success() {
            anyhow::bail!("identity provider rejected the session token");
        }

        response
            .json::<ProviderUser>()
            .await
            .context("Failed to parse user response")
    }
}
