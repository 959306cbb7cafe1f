//! ETA bridge - HTTP client for the courier estimate service

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::error::{AppError, Result};

/// Client asking the estimate service to recompute an order's arrival time
#[derive(Clone)]
pub struct EtaClient {
    client: Client,
    url: String,
}

impl EtaClient {
    /// Every request made through this client gives up after `timeout`
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build ETA client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Ask for a fresh estimate for an order
    pub async fn request_estimate(&self, order_id: i64) -> Result<Estimate> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("order_id", order_id)])
            .send()
            .await
            .map_err(|e| AppError::Eta(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Eta(format!(
                "Failed to request estimate: {} - {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Eta(e.to_string()))
    }
}

/// Body returned by the estimate service. Every field is optional since the
/// estimate is informational only.
#[derive(Debug, Default, Deserialize)]
pub struct Estimate {
    #[serde(default)]
    pub eta_minutes: Option<i64>,
}
