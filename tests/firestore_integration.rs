// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Run with FIRESTORE_EMULATOR_HOST pointing at a local emulator.
//!
//! Every test uses fresh uuid-based ids, so they can share one emulator.

use chrono::{Duration, Utc};
use repz_api::db::payments::{GrantOutcome, StripeIds};
use repz_api::db::FirestoreDb;
use repz_api::error::AppError;
use repz_api::models::{
    FeedCursor, Gym, GymFeedPost, Notification, PartnerSlot, PaymentProvider, Plan, PlanKind,
    PostReport, PurchaseKind, PurchaseRecord, ReportStatus, Tier, User,
};
use std::collections::BTreeMap;

mod common;
use common::test_db;

fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

async fn new_user(db: &FirestoreDb, name: &str) -> User {
    let user = User::new(&unique_id(name), Some(format!("{}@example.com", name)), None, Utc::now());
    db.upsert_user(&user).await.unwrap();
    user
}

fn test_plan(price_cents: u32, required_tier: Tier) -> Plan {
    Plan {
        plan_id: unique_id("plan"),
        creator_id: "coach".to_string(),
        title: "Strength Block".to_string(),
        description: "Four weeks of compound lifts".to_string(),
        kind: PlanKind::Workout,
        price_cents,
        required_tier,
        tags: vec!["strength".to_string()],
        items: vec!["Week 1: 5x5 squat".to_string()],
        purchase_count: 0,
        published: true,
        created_at: Utc::now(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// USERS & XP
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_new_user_creation() {
    require_emulator!();

    let db = test_db().await;
    let user = new_user(&db, "sam").await;

    let fetched = db.get_user(&user.user_id).await.unwrap().unwrap();
    assert_eq!(fetched.display_name, "sam");
    assert_eq!(fetched.tier, Tier::Free);
    assert!(!fetched.banned);
}

#[tokio::test]
async fn test_workout_streak_and_leaderboard() {
    require_emulator!();

    let db = test_db().await;
    let user = new_user(&db, "runner").await;
    let day1 = Utc::now() - Duration::days(2);

    let (award, _) = db.record_workout(&user.user_id, 30, day1).await.unwrap();
    assert_eq!(award.xp_awarded, 80);
    assert_eq!(award.current_streak, 1);

    // Same day: XP but no streak change
    let (award, _) = db.record_workout(&user.user_id, 120, day1).await.unwrap();
    assert_eq!(award.xp_awarded, 110);
    assert_eq!(award.current_streak, 1);

    let (award, xp) = db
        .record_workout(&user.user_id, 10, day1 + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(award.current_streak, 2);
    assert!(award.streak_extended);
    assert_eq!(xp.lifetime_xp, 80 + 110 + 60);

    let board = db.list_leaderboard(None, 100).await.unwrap();
    assert!(board.iter().any(|e| e.user_id == user.user_id));
}

#[tokio::test]
async fn test_delete_user_data() {
    require_emulator!();

    let db = test_db().await;
    let user = new_user(&db, "leaver").await;
    db.record_workout(&user.user_id, 30, Utc::now()).await.unwrap();

    let deleted = db.delete_user_data(&user.user_id).await.unwrap();
    assert!(deleted >= 2);
    assert!(db.get_user(&user.user_id).await.unwrap().is_none());
    assert!(db.get_xp(&user.user_id).await.unwrap().is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// PLANS & PAYMENTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_free_plan_acquisition() {
    require_emulator!();

    let db = test_db().await;
    let user = new_user(&db, "lifter").await;
    let plan = test_plan(0, Tier::Free);
    db.upsert_plan(&plan).await.unwrap();

    let acquired = db
        .acquire_free_plan(&user.user_id, Tier::Free, false, &plan.plan_id, Utc::now())
        .await
        .unwrap();
    assert_eq!(acquired.purchase_count, 1);
    assert!(db.owns_plan(&user.user_id, &plan.plan_id).await.unwrap());

    let again = db
        .acquire_free_plan(&user.user_id, Tier::Free, false, &plan.plan_id, Utc::now())
        .await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    let mine = db.list_user_plans(&user.user_id).await.unwrap();
    assert_eq!(mine.len(), 1);
}

#[tokio::test]
async fn test_plan_acquisition_rules() {
    require_emulator!();

    let db = test_db().await;
    let user = new_user(&db, "lifter").await;

    let paid = test_plan(999, Tier::Free);
    db.upsert_plan(&paid).await.unwrap();
    let result = db
        .acquire_free_plan(&user.user_id, Tier::Free, false, &paid.plan_id, Utc::now())
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let elite_only = test_plan(0, Tier::Elite);
    db.upsert_plan(&elite_only).await.unwrap();
    let result = db
        .acquire_free_plan(&user.user_id, Tier::Pro, false, &elite_only.plan_id, Utc::now())
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    db.unpublish_plan(&elite_only.plan_id).await.unwrap();
    let result = db
        .acquire_free_plan(&user.user_id, Tier::Elite, false, &elite_only.plan_id, Utc::now())
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_purchase_is_idempotent() {
    require_emulator!();

    let db = test_db().await;
    let user = new_user(&db, "payer").await;
    let purchase = PurchaseRecord {
        purchase_id: unique_id("cs"),
        provider: PaymentProvider::Stripe,
        user_id: user.user_id.clone(),
        kind: PurchaseKind::Subscription,
        tier: Some(Tier::Pro),
        plan_id: None,
        amount_cents: Some(999),
        created_at: Utc::now(),
    };
    let ids = StripeIds {
        customer_id: Some("cus_1".to_string()),
        subscription_id: Some(unique_id("sub")),
    };

    let first = db.apply_purchase(purchase.clone(), ids.clone()).await.unwrap();
    assert_eq!(first, GrantOutcome::Applied);
    let second = db.apply_purchase(purchase, ids.clone()).await.unwrap();
    assert_eq!(second, GrantOutcome::Duplicate);

    let upgraded = db.get_user(&user.user_id).await.unwrap().unwrap();
    assert_eq!(upgraded.tier, Tier::Pro);
    assert_eq!(upgraded.stripe_customer_id.as_deref(), Some("cus_1"));

    let subscription_id = ids.subscription_id.unwrap();
    let cancelled = db.cancel_subscription(&subscription_id).await.unwrap().unwrap();
    assert_eq!(cancelled.tier, Tier::Free);
    assert!(cancelled.subscription_id.is_none());
}

#[tokio::test]
async fn test_store_expiry_respects_stripe_subscription() {
    require_emulator!();

    let db = test_db().await;

    let mut web = new_user(&db, "web").await;
    web.tier = Tier::Elite;
    web.subscription_id = Some(unique_id("sub"));
    db.upsert_user(&web).await.unwrap();

    let after = db.expire_store_subscription(&web.user_id).await.unwrap();
    assert_eq!(after.tier, Tier::Elite);
    let stored = db.get_user(&web.user_id).await.unwrap().unwrap();
    assert_eq!(stored.tier, Tier::Elite);

    let mut mobile = new_user(&db, "mobile").await;
    mobile.tier = Tier::Pro;
    db.upsert_user(&mobile).await.unwrap();

    db.expire_store_subscription(&mobile.user_id).await.unwrap();
    let stored = db.get_user(&mobile.user_id).await.unwrap().unwrap();
    assert_eq!(stored.tier, Tier::Free);
}

#[tokio::test]
async fn test_purchase_for_unknown_user() {
    require_emulator!();

    let db = test_db().await;
    let purchase = PurchaseRecord {
        purchase_id: unique_id("rc"),
        provider: PaymentProvider::RevenueCat,
        user_id: unique_id("ghost"),
        kind: PurchaseKind::Subscription,
        tier: Some(Tier::Elite),
        plan_id: None,
        amount_cents: None,
        created_at: Utc::now(),
    };

    let result = db.apply_purchase(purchase, StripeIds::default()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

// ═══════════════════════════════════════════════════════════════════════════
// GYMS, FEED & SLOTS
// ═══════════════════════════════════════════════════════════════════════════

async fn new_gym(db: &FirestoreDb) -> Gym {
    let gym = Gym {
        gym_id: unique_id("gym"),
        name: "Iron Temple".to_string(),
        city: "Oakland".to_string(),
        member_count: 0,
        created_at: Utc::now(),
    };
    db.upsert_gym(&gym).await.unwrap();
    gym
}

#[tokio::test]
async fn test_join_gym_moves_member_count() {
    require_emulator!();

    let db = test_db().await;
    let user = new_user(&db, "member").await;
    let first = new_gym(&db).await;
    let second = new_gym(&db).await;

    let joined = db.join_gym(&user.user_id, &first.gym_id).await.unwrap();
    assert_eq!(joined.gym_id.as_deref(), Some(first.gym_id.as_str()));
    assert_eq!(db.get_gym(&first.gym_id).await.unwrap().unwrap().member_count, 1);

    db.join_gym(&user.user_id, &second.gym_id).await.unwrap();
    assert_eq!(db.get_gym(&first.gym_id).await.unwrap().unwrap().member_count, 0);
    assert_eq!(db.get_gym(&second.gym_id).await.unwrap().unwrap().member_count, 1);
}

#[tokio::test]
async fn test_feed_pagination_and_moderation() {
    require_emulator!();

    let db = test_db().await;
    let gym = new_gym(&db).await;
    let base = Utc::now() - Duration::minutes(10);

    let mut ids = Vec::new();
    for i in 0..3 {
        let post = GymFeedPost {
            post_id: unique_id("post"),
            gym_id: gym.gym_id.clone(),
            author_id: "author".to_string(),
            author_name: "Author".to_string(),
            content: format!("post {}", i),
            media_url: None,
            liked_by: Vec::new(),
            like_count: 0,
            hidden: false,
            created_at: base + Duration::minutes(i),
        };
        db.create_post(&post).await.unwrap();
        ids.push(post.post_id);
    }

    let page = db.list_feed(&gym.gym_id, None, 2).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].post_id, ids[2]);

    let rest = db
        .list_feed(&gym.gym_id, Some(&FeedCursor::after(&page[1])), 2)
        .await
        .unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].post_id, ids[0]);

    let (liked, count) = db.toggle_post_like(&ids[0], "fan").await.unwrap();
    assert!(liked);
    assert_eq!(count, 1);

    db.hide_post(&ids[2]).await.unwrap();
    let visible = db.list_feed(&gym.gym_id, None, 10).await.unwrap();
    assert_eq!(visible.len(), 2);
    assert!(visible.iter().all(|p| p.post_id != ids[2]));
}

fn feed_post(gym_id: &str, created_at: chrono::DateTime<Utc>) -> GymFeedPost {
    GymFeedPost {
        post_id: unique_id("post"),
        gym_id: gym_id.to_string(),
        author_id: "author".to_string(),
        author_name: "Author".to_string(),
        content: "same instant".to_string(),
        media_url: None,
        liked_by: Vec::new(),
        like_count: 0,
        hidden: false,
        created_at,
    }
}

#[tokio::test]
async fn test_feed_pages_through_equal_timestamps() {
    require_emulator!();

    let db = test_db().await;
    let gym = new_gym(&db).await;
    let at = Utc::now() - Duration::minutes(5);

    let mut expected = Vec::new();
    for _ in 0..4 {
        let post = feed_post(&gym.gym_id, at);
        db.create_post(&post).await.unwrap();
        expected.push(post.post_id);
    }
    expected.sort();
    expected.reverse();

    let mut seen = Vec::new();
    let mut cursor: Option<FeedCursor> = None;
    loop {
        let page = db.list_feed(&gym.gym_id, cursor.as_ref(), 1).await.unwrap();
        let Some(last) = page.last() else { break };
        seen.push(last.post_id.clone());
        cursor = Some(FeedCursor::after(last));
        assert!(seen.len() <= expected.len(), "feed pagination did not terminate");
    }

    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_hide_post_closes_open_reports() {
    require_emulator!();

    let db = test_db().await;
    let gym = new_gym(&db).await;
    let post = feed_post(&gym.gym_id, Utc::now());
    db.create_post(&post).await.unwrap();

    let report = |status: ReportStatus| PostReport {
        report_id: unique_id("report"),
        post_id: post.post_id.clone(),
        gym_id: gym.gym_id.clone(),
        reporter_id: unique_id("reporter"),
        reason: "spam".to_string(),
        status,
        created_at: Utc::now(),
    };
    let open = [report(ReportStatus::Open), report(ReportStatus::Open)];
    let dismissed = report(ReportStatus::Dismissed);
    for r in open.iter().chain(std::iter::once(&dismissed)) {
        db.create_report(r).await.unwrap();
    }

    let closed = db.hide_post(&post.post_id).await.unwrap();
    assert_eq!(closed, 2);

    assert!(db.get_post(&post.post_id).await.unwrap().unwrap().hidden);
    for r in &open {
        let stored = db.get_report(&r.report_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReportStatus::Actioned);
    }
    let stored = db.get_report(&dismissed.report_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReportStatus::Dismissed);

    let missing = db.hide_post("no-such-post").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_one_upcoming_slot_per_user() {
    require_emulator!();

    let db = test_db().await;
    let gym = new_gym(&db).await;
    let now = Utc::now();

    let slot_a = PartnerSlot::new(
        unique_id("slot"),
        &gym.gym_id,
        "host-a",
        "legs".to_string(),
        now + Duration::hours(3),
        2,
        now,
    )
    .unwrap();
    let slot_b = PartnerSlot::new(
        unique_id("slot"),
        &gym.gym_id,
        "host-b",
        "push".to_string(),
        now + Duration::hours(5),
        2,
        now,
    )
    .unwrap();
    let slot_a = db.create_slot(slot_a, now).await.unwrap();
    let slot_b = db.create_slot(slot_b, now).await.unwrap();

    let joiner = unique_id("joiner");
    let joined = db.join_slot(&slot_a.slot_id, &joiner, now).await.unwrap();
    assert_eq!(joined.members.len(), 2);

    let other = db.join_slot(&slot_b.slot_id, &joiner, now).await;
    assert!(matches!(other, Err(AppError::Conflict(_))));

    // Full
    let late = db.join_slot(&slot_a.slot_id, &unique_id("late"), now).await;
    assert!(matches!(late, Err(AppError::Conflict(_))));

    db.leave_slot(&slot_a.slot_id, &joiner, now).await.unwrap();
    db.join_slot(&slot_b.slot_id, &joiner, now).await.unwrap();

    let upcoming = db
        .list_upcoming_slots(&gym.gym_id, now, 10)
        .await
        .unwrap();
    assert_eq!(upcoming.len(), 2);
    assert_eq!(upcoming[0].slot_id, slot_a.slot_id);
}

// ═══════════════════════════════════════════════════════════════════════════
// NOTIFICATIONS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_notification_read_is_owner_only() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_id("owner");
    let notification = Notification {
        notification_id: unique_id("n"),
        user_id: owner.clone(),
        kind: "admin".to_string(),
        title: "Hello".to_string(),
        body: "Welcome to REPZ".to_string(),
        data: BTreeMap::new(),
        read: false,
        created_at: Utc::now(),
    };
    db.create_notification(&notification).await.unwrap();

    let unread = db.list_notifications(&owner, true, 10).await.unwrap();
    assert_eq!(unread.len(), 1);

    let stranger = db
        .mark_notification_read(&notification.notification_id, "someone-else")
        .await;
    assert!(matches!(stranger, Err(AppError::NotFound(_))));

    let read = db
        .mark_notification_read(&notification.notification_id, &owner)
        .await
        .unwrap();
    assert!(read.read);
    assert!(db.list_notifications(&owner, true, 10).await.unwrap().is_empty());
}
