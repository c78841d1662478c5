//! Transactional email client
//!
//! Minimal client for a Resend-style HTTP email API. All callers treat
//! delivery as best-effort: failures are logged by the caller, never
//! propagated to the customer-facing request.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::EmailConfig;
use crate::error::{AppError, AppResult};

/// Email API client
#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    api_endpoint: String,
    api_key: String,
    from_address: String,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

impl EmailClient {
    /// Build a client from configuration; absent when no API key is set
    pub fn from_config(config: &EmailConfig) -> Option<Self> {
        if config.api_key.is_empty() {
            return None;
        }
        Some(Self {
            client: Client::new(),
            api_endpoint: config.api_endpoint.clone(),
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
        })
    }

    /// Send one email; returns the provider message id
    pub async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<String> {
        let request = SendEmailRequest {
            from: &self.from_address,
            to: vec![to],
            subject,
            html,
        };

        let response = self
            .client
            .post(&self.api_endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Email API error: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalService(format!(
                "Email API returned {}",
                status
            )));
        }

        let body = response
            .json::<SendEmailResponse>()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid email API response: {}", e)))?;

        Ok(body.id)
    }
}
