use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{EnrichError, EnrichmentPort};
use crate::account::{Account, AccountStatus};

/// Body of `GET /v1/accounts/{id}`. Extra keys are ignored.
#[derive(Debug, Default, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: Value,
    #[serde(default)]
    created_on: Value,
}

/// Blocking client for the account status service
#[derive(Debug, Clone)]
pub struct StatusClient {
    base_url: String,
    client: Client,
}

impl StatusClient {
    /// Create a client for a service root such as `http://localhost:8080`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for the status service")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn account_url(&self, id: i64) -> String {
        format!("{}/v1/accounts/{}", self.base_url, id)
    }

    /// Extract status fields from a response body. Non-string values are
    /// kept as their JSON text; null or missing values are skipped.
    pub fn parse_status(body: &str) -> Result<AccountStatus, EnrichError> {
        let response: StatusResponse = serde_json::from_str(body).map_err(|e| {
            EnrichError::RemoteFailure(format!("Invalid response from status service: {}", e))
        })?;

        Ok(AccountStatus {
            status: value_text(response.status),
            status_set_on: value_text(response.created_on),
        })
    }
}

fn value_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl EnrichmentPort for StatusClient {
    fn enrich(&self, account: &Account) -> Result<AccountStatus, EnrichError> {
        let id = account.id.ok_or_else(|| {
            EnrichError::InvalidInput(
                "Account passed to the status service has no id.".to_string(),
            )
        })?;

        let url = self.account_url(id);
        debug!(%url, "requesting account status");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| EnrichError::RemoteFailure(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| EnrichError::RemoteFailure(e.to_string()))?;

        if !status.is_success() {
            warn!(id, %status, "status service returned an error");
            let body = body.trim();
            return Err(EnrichError::RemoteFailure(if body.is_empty() {
                status.to_string()
            } else {
                format!("{} {}", status, body)
            }));
        }

        if body.trim().is_empty() {
            return Err(EnrichError::InvalidInput(format!(
                "No body from API request received for account={}",
                id
            )));
        }

        Self::parse_status(&body)
    }
}
