// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod admin;
pub mod ai;
pub mod auth;
pub mod challenges;
pub mod form;
pub mod gyms;
pub mod leaderboard;
pub mod notifications;
pub mod payments;
pub mod plans;
pub mod users;
pub mod webhooks;
pub mod workouts;

use crate::middleware::auth::{require_admin, require_auth};
use crate::AppState;
use axum::http::{header, Method, Uri};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "mobile/src/generated/")
)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
    })
}

/// Origins allowed to call the API with credentials: the configured
/// frontend plus local and Expo development servers on any port.
fn is_allowed_origin(origin: &str, frontend_url: &str) -> bool {
    if origin == frontend_url {
        return true;
    }
    let Ok(uri) = origin.parse::<Uri>() else {
        return false;
    };
    match (uri.scheme_str(), uri.host()) {
        (Some("http"), Some("localhost" | "127.0.0.1")) => true,
        (Some("exp"), Some(_)) => true,
        _ => false,
    }
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let frontend_url = state.config.frontend_url.clone();
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::predicate(
            move |origin: &axum::http::HeaderValue, _request_parts: &axum::http::request::Parts| {
                is_allowed_origin(origin.to_str().unwrap_or(""), &frontend_url)
            },
        ))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .merge(auth::routes())
        .merge(webhooks::routes());

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .merge(users::routes())
        .merge(plans::routes())
        .merge(workouts::routes())
        .merge(leaderboard::routes())
        .merge(challenges::routes())
        .merge(form::routes())
        .merge(gyms::routes())
        .merge(notifications::routes())
        .merge(payments::routes())
        .merge(ai::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Admin routes: the auth layer is added last so it runs first
    let admin_routes = admin::routes()
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_origins() {
        let frontend = "https://app.repz.fit";
        assert!(is_allowed_origin("https://app.repz.fit", frontend));
        assert!(is_allowed_origin("http://localhost:8081", frontend));
        assert!(is_allowed_origin("exp://192.168.1.5:8081", frontend));
        assert!(!is_allowed_origin("https://evil.example", frontend));
        assert!(!is_allowed_origin("https://app.repz.fit.evil.example", frontend));
        assert!(!is_allowed_origin("http://localhost.evil.example", frontend));
        assert!(!is_allowed_origin("http://127.0.0.1.evil.example", frontend));
        assert!(!is_allowed_origin("http://localhost@evil.example", frontend));
        assert!(!is_allowed_origin("https://localhost:8081", frontend));
        assert!(is_allowed_origin("http://127.0.0.1:19006", frontend));
        assert!(is_allowed_origin("http://localhost", frontend));
    }
}
