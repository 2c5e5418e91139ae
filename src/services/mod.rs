// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Service layer: external APIs and business logic.

pub mod expo;
pub mod firebase_auth;
pub mod form;
pub mod notifications;
pub mod openai;
pub mod rate_limit;
pub mod revenuecat;
pub mod stripe;

pub use expo::ExpoPushClient;
pub use firebase_auth::FirebaseTokenVerifier;
pub use form::FormAnalyzer;
pub use notifications::NotificationService;
pub use openai::OpenAiClient;
pub use rate_limit::ChatRateLimiter;
pub use stripe::StripeClient;
