// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! REPZ API Server
//!
//! Backend for the REPZ mobile app: plans, XP, wager challenges, gym
//! social features and payments on top of Firestore.

use repz_api::{
    config::Config,
    db::FirestoreDb,
    services::{
        ChatRateLimiter, ExpoPushClient, FirebaseTokenVerifier, FormAnalyzer,
        NotificationService, OpenAiClient, StripeClient,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let config = Config::from_env()?;

    init_logging(config.environment.is_production());
    tracing::info!(
        port = config.port,
        environment = ?config.environment,
        "Starting REPZ API"
    );

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    let firebase_verifier = Arc::new(FirebaseTokenVerifier::new(&config)?);
    let form_analyzer = FormAnalyzer::from_service_url(config.pose_service_url.as_deref())?;
    let stripe = StripeClient::new(&config.stripe_secret_key)?;

    let openai = match config.openai_api_key.as_deref() {
        Some(key) => Some(OpenAiClient::new(key, &config.openai_model)?),
        None => {
            tracing::warn!("OPENAI_API_KEY not set; AI coach disabled");
            None
        }
    };

    let push = Arc::new(ExpoPushClient::new(config.expo_access_token.clone())?);
    let notifications = NotificationService::new(db.clone(), push);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        firebase_verifier,
        form_analyzer,
        stripe,
        openai,
        chat_limiter: ChatRateLimiter::default(),
        notifications,
    });

    // Build router
    let app = repz_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize logging: flattened JSON in production, human-readable otherwise.
fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("repz_api=debug,info"));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
