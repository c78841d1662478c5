//! Configuration management for the Mercato Marketplace Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with MERCATO_ prefix
//!
//! Provider, email and push credentials are optional: services built from a
//! configuration without them run with the corresponding client absent.

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Payment provider (checkout sessions + webhooks)
    pub payment: PaymentConfig,

    /// Transactional email configuration
    pub email: EmailConfig,

    /// Web push configuration
    pub push: PushConfig,

    /// CDN image store configuration
    pub cdn: CdnConfig,

    /// Marketplace business rules
    pub market: MarketConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    /// Provider API base URL
    pub api_base: String,

    /// Provider secret API key; empty means payments are not configured
    pub secret_key: String,

    /// Shared secret for webhook signature verification
    pub webhook_secret: String,

    /// ISO currency code for checkout sessions
    pub currency: String,

    /// Redirect target after a successful checkout
    pub success_url: String,

    /// Redirect target after an abandoned checkout
    pub cancel_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    /// Email API endpoint
    pub api_endpoint: String,

    /// Email API key; empty means email is not configured
    pub api_key: String,

    /// Sender address
    pub from_address: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PushConfig {
    /// Push API endpoint
    pub api_endpoint: String,

    /// Push API key; empty means push is not configured
    pub api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CdnConfig {
    /// CDN management API endpoint
    pub api_endpoint: String,

    /// CDN API key; empty means image cleanup is not configured
    pub api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketConfig {
    /// Default commission rate for new producers, in percent
    pub default_commission_rate: Decimal,

    /// Promotional commission rate granted by the referral bonus, in percent
    pub referral_bonus_rate: Decimal,

    /// Referral bonus window length in days
    pub referral_bonus_days: i64,

    /// Flat shipping fee per order
    pub shipping_fee: Decimal,

    /// Bank transfer instructions returned with bank-transfer orders
    pub bank_account_holder: String,
    pub bank_name: String,
    pub bank_iban: String,
    pub bank_bic: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("MERCATO_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("payment.api_base", "https://api.stripe.com")?
            .set_default("payment.secret_key", "")?
            .set_default("payment.webhook_secret", "")?
            .set_default("payment.currency", "eur")?
            .set_default("payment.success_url", "http://localhost:5173/checkout/success")?
            .set_default("payment.cancel_url", "http://localhost:5173/checkout/cancel")?
            .set_default("email.api_endpoint", "https://api.resend.com/emails")?
            .set_default("email.api_key", "")?
            .set_default("email.from_address", "orders@mercato.example")?
            .set_default("push.api_endpoint", "")?
            .set_default("push.api_key", "")?
            .set_default("cdn.api_endpoint", "")?
            .set_default("cdn.api_key", "")?
            .set_default("market.default_commission_rate", "15")?
            .set_default("market.referral_bonus_rate", "10")?
            .set_default("market.referral_bonus_days", 90)?
            .set_default("market.shipping_fee", "3.00")?
            .set_default("market.bank_account_holder", "Mercato SRL")?
            .set_default("market.bank_name", "Banca Mercato")?
            .set_default("market.bank_iban", "IT60X0542811101000000123456")?
            .set_default("market.bank_bic", "MERCITRR")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (MERCATO_ prefix)
            .add_source(
                Environment::with_prefix("MERCATO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
