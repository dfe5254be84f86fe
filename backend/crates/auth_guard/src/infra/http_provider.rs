//! HTTP authentication provider
//!
//! Forwards credentials to `{base_url}/signin` and `{base_url}/signup` as
//! JSON. Any 2xx is an acceptance; 4xx other than 429 is a rejection of the
//! credentials; everything else is a provider failure.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::json;

use crate::domain::credentials::{Credentials, ProviderOutcome};
use crate::domain::repository::Authenticator;
use crate::error::{GuardError, GuardResult};

/// reqwest-backed [`Authenticator`]
#[derive(Debug, Clone)]
pub struct HttpAuthenticator {
    client: Client,
    base_url: String,
}

impl HttpAuthenticator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> GuardResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(GuardError::Configuration(
                "AUTH_PROVIDER_URL must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GuardError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn forward(
        &self,
        path: &str,
        credentials: &Credentials,
    ) -> GuardResult<ProviderOutcome> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "email": credentials.email,
                "password": credentials.password.as_str(),
            }))
            .send()
            .await
            .map_err(|e| GuardError::Provider(format!("request to {path} failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| GuardError::Provider(format!("reading {path} response: {e}")))?;
            let body = if bytes.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::from_slice(&bytes)
                    .map_err(|e| GuardError::Provider(format!("invalid {path} response: {e}")))?
            };
            return Ok(ProviderOutcome::Authenticated(body));
        }

        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            return Ok(ProviderOutcome::Rejected {
                status: status.as_u16(),
            });
        }

        Err(GuardError::Provider(format!(
            "{path} returned unexpected status {status}"
        )))
    }
}

impl Authenticator for HttpAuthenticator {
    async fn sign_in(&self, credentials: &Credentials) -> GuardResult<ProviderOutcome> {
        self.forward("signin", credentials).await
    }

    async fn sign_up(&self, credentials: &Credentials) -> GuardResult<ProviderOutcome> {
        self.forward("signup", credentials).await
    }
}
