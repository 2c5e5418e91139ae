// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment
//! (Cloud Run secret bindings) and read once at startup.

use std::env;

/// Deployment environment. Controls log formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn from_str_lossy(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Server port
    pub port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// GCP project ID (also the Firebase project that issues ID tokens)
    pub gcp_project_id: String,
    /// Web/mobile frontend URL, used for CORS and checkout redirects
    pub frontend_url: String,
    /// Stripe price id for the Pro subscription
    pub stripe_price_pro: String,
    /// Stripe price id for the Elite subscription
    pub stripe_price_elite: String,
    /// OpenAI model used by the coach proxy
    pub openai_model: String,
    /// Base URL of the pose-estimation service
    pub pose_service_url: Option<String>,
    /// Firebase uids that always receive the admin role
    pub admin_user_ids: Vec<String>,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Stripe API secret key
    pub stripe_secret_key: String,
    /// Stripe webhook endpoint secret (`whsec_...`)
    pub stripe_webhook_secret: String,
    /// RevenueCat webhook HMAC secret
    pub revenuecat_webhook_secret: String,
    /// OpenAI API key; the AI coach is disabled without it
    pub openai_api_key: Option<String>,
    /// Expo access token for push sends (optional)
    pub expo_access_token: Option<String>,
}

impl Config {
    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            environment: Environment::Development,
            gcp_project_id: "test-project".to_string(),
            frontend_url: "http://localhost:8081".to_string(),
            stripe_price_pro: "price_test_pro".to_string(),
            stripe_price_elite: "price_test_elite".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            pose_service_url: None,
            admin_user_ids: vec!["admin-uid".to_string()],
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            stripe_secret_key: "sk_test_123".to_string(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
            revenuecat_webhook_secret: "rc_test_secret".to_string(),
            openai_api_key: None,
            expo_access_token: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            environment: Environment::from_str_lossy(
                &env::var("APP_ENV").unwrap_or_default(),
            ),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
            stripe_price_pro: env::var("STRIPE_PRICE_PRO").unwrap_or_default(),
            stripe_price_elite: env::var("STRIPE_PRICE_ELITE").unwrap_or_default(),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            pose_service_url: optional_var("POSE_SERVICE_URL"),
            admin_user_ids: env::var("ADMIN_USER_IDS")
                .map(|raw| parse_id_list(&raw))
                .unwrap_or_default(),

            jwt_signing_key: required_var("JWT_SIGNING_KEY")?.into_bytes(),
            stripe_secret_key: required_var("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: required_var("STRIPE_WEBHOOK_SECRET")?,
            revenuecat_webhook_secret: required_var("REVENUECAT_WEBHOOK_SECRET")?,
            openai_api_key: optional_var("OPENAI_API_KEY"),
            expo_access_token: optional_var("EXPO_ACCESS_TOKEN"),
        })
    }

    /// Whether a uid is configured as an administrator.
    pub fn is_admin_uid(&self, user_id: &str) -> bool {
        self.admin_user_ids.iter().any(|id| id == user_id)
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
