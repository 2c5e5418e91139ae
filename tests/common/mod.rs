// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use jsonwebtoken::DecodingKey;
use repz_api::config::Config;
use repz_api::db::FirestoreDb;
use repz_api::middleware::auth::create_jwt;
use repz_api::models::Role;
use repz_api::routes::create_router;
use repz_api::services::form::UnavailablePoseEstimator;
use repz_api::services::{
    ChatRateLimiter, ExpoPushClient, FirebaseTokenVerifier, FormAnalyzer, NotificationService,
    StripeClient,
};
use repz_api::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Build app state around `db` with offline collaborators.
#[allow(dead_code)]
pub fn test_state(db: FirestoreDb) -> Arc<AppState> {
    let config = Config::test_default();

    let firebase_verifier = Arc::new(
        FirebaseTokenVerifier::new_with_static_key(
            &config,
            "test-kid",
            DecodingKey::from_secret(b"not-an-rsa-key"),
        )
        .expect("verifier"),
    );
    let push = Arc::new(ExpoPushClient::new(None).expect("push client"));
    let stripe = StripeClient::new(&config.stripe_secret_key).expect("stripe client");

    Arc::new(AppState {
        notifications: NotificationService::new(db.clone(), push),
        config,
        db,
        firebase_verifier,
        form_analyzer: FormAnalyzer::new(Arc::new(UnavailablePoseEstimator)),
        stripe,
        openai: None,
        chat_limiter: ChatRateLimiter::default(),
    })
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = test_state(FirestoreDb::new_mock());
    (create_router(state.clone()), state)
}

/// Session token for `user_id` signed with the test config key.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, role: Role) -> String {
    create_jwt(user_id, role, &Config::test_default().jwt_signing_key).expect("jwt")
}

/// `Authorization` header value for a session token.
#[allow(dead_code)]
pub fn bearer(user_id: &str, role: Role) -> String {
    format!("Bearer {}", create_test_jwt(user_id, role))
}
