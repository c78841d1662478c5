//! Web push delivery client
//!
//! Sends notification payloads to per-device subscription endpoints.
//! A 404/410 from the provider means the subscription is gone and must be
//! marked inactive by the caller.

use reqwest::Client;
use serde::Serialize;

use crate::config::PushConfig;
use crate::error::{AppError, AppResult};

/// Push API client
#[derive(Clone)]
pub struct PushClient {
    client: Client,
    api_endpoint: String,
    api_key: String,
}

/// Notification payload delivered to a device
#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Outcome of a single delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushDelivery {
    Delivered,
    /// The subscription no longer exists at the provider
    SubscriptionGone,
}

impl PushClient {
    /// Build a client from configuration; absent when push is not configured
    pub fn from_config(config: &PushConfig) -> Option<Self> {
        if config.api_key.is_empty() || config.api_endpoint.is_empty() {
            return None;
        }
        Some(Self {
            client: Client::new(),
            api_endpoint: config.api_endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Deliver a payload to one subscription endpoint
    pub async fn send(&self, endpoint: &str, payload: &PushPayload) -> AppResult<PushDelivery> {
        let response = self
            .client
            .post(format!("{}/send", self.api_endpoint))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "endpoint": endpoint,
                "payload": payload,
            }))
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Push API error: {}", e)))?;

        match response.status().as_u16() {
            404 | 410 => Ok(PushDelivery::SubscriptionGone),
            s if (200..300).contains(&s) => Ok(PushDelivery::Delivered),
            s => Err(AppError::ExternalService(format!(
                "Push API returned {}",
                s
            ))),
        }
    }
}
