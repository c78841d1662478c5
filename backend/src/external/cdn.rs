//! CDN image store client
//!
//! Image uploads happen from the storefront directly; the backend only
//! needs deletion, used when a product is hard-deleted.

use reqwest::Client;

use crate::config::CdnConfig;
use crate::error::{AppError, AppResult};

/// CDN management API client
#[derive(Clone)]
pub struct CdnClient {
    client: Client,
    api_endpoint: String,
    api_key: String,
}

impl CdnClient {
    /// Build a client from configuration; absent when cleanup is not configured
    pub fn from_config(config: &CdnConfig) -> Option<Self> {
        if config.api_key.is_empty() || config.api_endpoint.is_empty() {
            return None;
        }
        Some(Self {
            client: Client::new(),
            api_endpoint: config.api_endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Delete one stored image by its public id
    pub async fn delete_image(&self, public_id: &str) -> AppResult<()> {
        let response = self
            .client
            .delete(format!("{}/images/{}", self.api_endpoint, public_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("CDN API error: {}", e)))?;

        // Already-deleted images are fine
        if !response.status().is_success() && response.status().as_u16() != 404 {
            let status = response.status();
            return Err(AppError::ExternalService(format!(
                "CDN API returned {}",
                status
            )));
        }

        Ok(())
    }
}
