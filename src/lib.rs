// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! REPZ: backend API for a fitness and social training app.
//!
//! This crate serves the mobile client: profiles, a workout/meal plan
//! marketplace, XP and streaks, wager challenges with AI form checks, gym
//! feeds and partner matching, push notifications and payments.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{
    ChatRateLimiter, FirebaseTokenVerifier, FormAnalyzer, NotificationService, OpenAiClient,
    StripeClient,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub firebase_verifier: Arc<FirebaseTokenVerifier>,
    pub form_analyzer: FormAnalyzer,
    pub stripe: StripeClient,
    /// `None` when no OpenAI key is configured
    pub openai: Option<OpenAiClient>,
    pub chat_limiter: ChatRateLimiter,
    pub notifications: NotificationService,
}
