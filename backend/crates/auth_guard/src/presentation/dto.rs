//! API DTOs (Data Transfer Objects)

use serde::{Deserialize, Serialize};

use crate::domain::credentials::Credentials;

/// Request for POST /signin and POST /signup
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

impl CredentialsRequest {
    pub fn into_credentials(self) -> Credentials {
        Credentials::new(self.email, self.password)
    }
}

/// Response body for an accepted attempt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedResponse {
    pub authenticated: bool,
    /// Provider response, passed through untouched
    pub provider: serde_json::Value,
}
