// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment webhook authentication tests.
//!
//! Signed events that need no database work are acknowledged with 200 even
//! against the offline mock; unsigned or mis-signed ones never get that far.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use repz_api::services::{revenuecat, stripe};
use tower::ServiceExt;

mod common;

const STRIPE_SECRET: &str = "whsec_test_secret";
const REVENUECAT_SECRET: &str = "rc_test_secret";

async fn post_webhook(uri: &str, signature: Option<(&str, String)>, body: &str) -> StatusCode {
    let (app, _) = common::create_test_app();

    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some((name, value)) = signature {
        request = request.header(name, value);
    }

    app.oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
        .status()
}

fn stripe_header(body: &str) -> (&'static str, String) {
    let t = stripe::now_unix();
    (
        "stripe-signature",
        format!("t={},v1={}", t, stripe::sign_payload(t, body.as_bytes(), STRIPE_SECRET)),
    )
}

#[tokio::test]
async fn test_stripe_missing_signature() {
    let body = r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;
    let status = post_webhook("/webhooks/stripe", None, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stripe_wrong_secret() {
    let body = r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;
    let t = stripe::now_unix();
    let forged = format!("t={},v1={}", t, stripe::sign_payload(t, body.as_bytes(), "whsec_other"));
    let status = post_webhook("/webhooks/stripe", Some(("stripe-signature", forged)), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stripe_replayed_signature() {
    let body = r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;
    let t = stripe::now_unix() - 3600;
    let stale = format!("t={},v1={}", t, stripe::sign_payload(t, body.as_bytes(), STRIPE_SECRET));
    let status = post_webhook("/webhooks/stripe", Some(("stripe-signature", stale)), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stripe_ignored_event_acknowledged() {
    let body = r#"{"id":"evt_2","type":"invoice.paid","data":{"object":{"id":"in_1"}}}"#;
    let status = post_webhook("/webhooks/stripe", Some(stripe_header(body)), body).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_stripe_checkout_without_metadata_acknowledged() {
    let body = r#"{"id":"evt_3","type":"checkout.session.completed","data":{"object":{"id":"cs_1"}}}"#;
    let status = post_webhook("/webhooks/stripe", Some(stripe_header(body)), body).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_stripe_signed_garbage_is_bad_request() {
    let body = r#"{"not":"an event"}"#;
    let status = post_webhook("/webhooks/stripe", Some(stripe_header(body)), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stripe_grant_reaches_database() {
    let body = r#"{"id":"evt_4","type":"checkout.session.completed","data":{"object":{
        "id":"cs_2","client_reference_id":"user-1","customer":"cus_1",
        "metadata":{"kind":"subscription","tier":"pro","user_id":"user-1"}}}}"#;
    let status = post_webhook("/webhooks/stripe", Some(stripe_header(body)), body).await;
    // Offline database: a 5xx makes Stripe retry later.
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_revenuecat_bad_signature_unauthorized() {
    let body = r#"{"event":{"id":"rc_1","type":"INITIAL_PURCHASE","app_user_id":"user-1"}}"#;

    let status = post_webhook("/webhooks/revenuecat", None, body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = revenuecat::sign(body.as_bytes(), "not-the-secret");
    let status = post_webhook(
        "/webhooks/revenuecat",
        Some(("x-revenuecat-signature", forged)),
        body,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_revenuecat_informational_event_acknowledged() {
    let body = r#"{"event":{"id":"rc_2","type":"CANCELLATION","app_user_id":"user-1"}}"#;
    let sig = revenuecat::sign(body.as_bytes(), REVENUECAT_SECRET);
    let status = post_webhook(
        "/webhooks/revenuecat",
        Some(("x-revenuecat-signature", sig)),
        body,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_revenuecat_grant_without_entitlement_acknowledged() {
    let body = r#"{"event":{"id":"rc_3","type":"RENEWAL","app_user_id":"user-1","entitlement_ids":["stickers"]}}"#;
    let sig = revenuecat::sign(body.as_bytes(), REVENUECAT_SECRET);
    let status = post_webhook(
        "/webhooks/revenuecat",
        Some(("x-revenuecat-signature", sig)),
        body,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
