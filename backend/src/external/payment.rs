//! Payment provider client for hosted checkout sessions
//!
//! Talks to a Stripe-compatible REST API: form-encoded requests
//! authenticated with the secret key, JSON responses.

use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::PaymentConfig;
use crate::error::{AppError, AppResult};

/// Payment provider API client
#[derive(Clone)]
pub struct PaymentClient {
    client: Client,
    api_base: String,
    secret_key: String,
}

/// A hosted checkout session as returned by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Redirect URL for the customer; absent on retrieval of completed sessions
    pub url: Option<String>,
    /// "paid", "unpaid" or "no_payment_required"
    pub payment_status: Option<String>,
    /// Payment intent created for the session once payment is attempted
    pub payment_intent: Option<String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }
}

/// One checkout line, built from the order's item snapshot
#[derive(Debug, Clone)]
pub struct CheckoutLineItem {
    pub name: String,
    /// Unit amount in the currency's minor unit (cents)
    pub unit_amount_cents: i64,
    pub quantity: i64,
}

impl PaymentClient {
    /// Build a client from configuration; absent when no secret key is set
    pub fn from_config(config: &PaymentConfig) -> Option<Self> {
        if config.secret_key.is_empty() {
            return None;
        }
        Some(Self {
            client: Client::new(),
            api_base: config.api_base.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    /// Create a hosted checkout session for an order
    pub async fn create_checkout_session(
        &self,
        order_id: Uuid,
        currency: &str,
        line_items: &[CheckoutLineItem],
        success_url: &str,
        cancel_url: &str,
    ) -> AppResult<CheckoutSession> {
        let mut params: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), success_url.to_string()),
            ("cancel_url".to_string(), cancel_url.to_string()),
            ("metadata[order_id]".to_string(), order_id.to_string()),
        ];

        for (i, item) in line_items.iter().enumerate() {
            params.push((
                format!("line_items[{}][price_data][currency]", i),
                currency.to_string(),
            ));
            params.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                item.name.clone(),
            ));
            params.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                item.unit_amount_cents.to_string(),
            ));
            params.push((
                format!("line_items[{}][quantity]", i),
                item.quantity.to_string(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Payment provider error: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Payment provider returned {}: {}",
                status, body
            )));
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid provider response: {}", e)))
    }

    /// Retrieve a checkout session to check its payment status
    pub async fn retrieve_session(&self, session_id: &str) -> AppResult<CheckoutSession> {
        let response = self
            .client
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.api_base, session_id
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Payment provider error: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound("Checkout session".to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalService(format!(
                "Payment provider returned {}",
                status
            )));
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid provider response: {}", e)))
    }
}
