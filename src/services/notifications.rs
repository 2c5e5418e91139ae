// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notification delivery: persist, then push when the user has a token.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Notification, Resolution, WagerChallenge};
use crate::services::expo::{ExpoPushClient, PushMessage};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A notification to deliver.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub kind: &'static str,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct NotificationService {
    db: FirestoreDb,
    push: Arc<ExpoPushClient>,
}

impl NotificationService {
    pub fn new(db: FirestoreDb, push: Arc<ExpoPushClient>) -> Self {
        Self { db, push }
    }

    /// Store a notification and push it. Push failures are logged only.
    pub async fn send(&self, user_id: &str, request: NotificationRequest) -> Result<Notification, AppError> {
        let notification = Notification {
            notification_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind: request.kind.to_string(),
            title: request.title,
            body: request.body,
            data: request.data,
            read: false,
            created_at: Utc::now(),
        };
        self.db.create_notification(&notification).await?;

        let token = self
            .db
            .get_user(user_id)
            .await
            .ok()
            .flatten()
            .and_then(|u| u.push_token);

        if let Some(token) = token {
            let message = PushMessage {
                to: &token,
                title: &notification.title,
                body: &notification.body,
                data: &notification.data,
                sound: "default",
            };
            if let Err(e) = self.push.send(&message).await {
                tracing::warn!(user_id, kind = %notification.kind, error = %e, "Push delivery failed");
            }
        }

        Ok(notification)
    }

    /// Deliver in a background task, for side-channel notifications whose
    /// delivery must neither fail nor delay the caller.
    pub fn notify(&self, user_id: &str, request: NotificationRequest) -> JoinHandle<()> {
        let service = self.clone();
        let user_id = user_id.to_string();

        tokio::spawn(async move {
            let kind = request.kind;
            if let Err(e) = service.send(&user_id, request).await {
                tracing::warn!(user_id = %user_id, kind, error = %e, "Failed to store notification");
            }
        })
    }

    pub fn challenge_accepted(&self, challenge: &WagerChallenge, joiner_name: &str) {
        self.notify(
            &challenge.creator_id,
            NotificationRequest {
                kind: "challenge_accepted",
                title: "Challenge accepted".to_string(),
                body: format!(
                    "{} joined your {} challenge ({} XP pot)",
                    joiner_name,
                    challenge.exercise.as_str(),
                    challenge.pot
                ),
                data: challenge_data(challenge),
            },
        );
    }

    /// Tell every participant how a challenge ended.
    pub fn challenge_resolved(&self, challenge: &WagerChallenge, resolution: &Resolution) {
        for participant in &challenge.participants {
            let body = match resolution {
                Resolution::Winner { winner_id, pot, .. } if winner_id == participant => {
                    format!("You won the {} challenge and {} XP!", challenge.exercise.as_str(), pot)
                }
                Resolution::Winner { .. } => {
                    format!("The {} challenge has a winner. Better luck next time!", challenge.exercise.as_str())
                }
                Resolution::NoWinner { stake, .. } => format!(
                    "Nobody submitted to the {} challenge; your {} XP stake was refunded",
                    challenge.exercise.as_str(),
                    stake
                ),
                Resolution::Unresolved => format!(
                    "The {} challenge needs a manual review",
                    challenge.exercise.as_str()
                ),
            };

            self.notify(
                participant,
                NotificationRequest {
                    kind: "challenge_resolved",
                    title: "Challenge finished".to_string(),
                    body,
                    data: challenge_data(challenge),
                },
            );
        }
    }

    pub fn slot_joined(&self, host_id: &str, slot_id: &str, member_name: &str, workout_type: &str) {
        let mut data = BTreeMap::new();
        data.insert("slot_id".to_string(), slot_id.to_string());

        self.notify(
            host_id,
            NotificationRequest {
                kind: "slot_joined",
                title: "New workout partner".to_string(),
                body: format!("{} joined your {} session", member_name, workout_type),
                data,
            },
        );
    }
}

fn challenge_data(challenge: &WagerChallenge) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();
    data.insert("challenge_id".to_string(), challenge.challenge_id.clone());
    data.insert("status".to_string(), challenge.status.as_str().to_string());
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_service() -> NotificationService {
        let push = Arc::new(ExpoPushClient::new(None).unwrap());
        NotificationService::new(FirestoreDb::new_mock(), push)
    }

    #[tokio::test]
    async fn test_notify_failure_stays_in_background() {
        let service = offline_service();
        let handle = service.notify(
            "user-1",
            NotificationRequest {
                kind: "test",
                title: "Hi".to_string(),
                body: "Body".to_string(),
                data: BTreeMap::new(),
            },
        );
        // The store fails offline; the task logs it and finishes cleanly.
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_send_reports_storage_failure() {
        let service = offline_service();
        let result = service
            .send(
                "user-1",
                NotificationRequest {
                    kind: "test",
                    title: "Hi".to_string(),
                    body: "Body".to_string(),
                    data: BTreeMap::new(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }
}
