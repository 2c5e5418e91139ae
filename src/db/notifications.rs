// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use crate::db::collections;
use crate::db::firestore::FirestoreDb;
use crate::error::AppError;
use crate::models::Notification;
use firestore::FirestoreQueryDirection;

impl FirestoreDb {
    pub async fn create_notification(&self, notification: &Notification) -> Result<(), AppError> {
        self.set_doc(
            collections::NOTIFICATIONS,
            &notification.notification_id,
            notification,
        )
        .await
    }

    /// A user's notifications, newest first.
    pub async fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<Notification>, AppError> {
        let user_id = user_id.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::NOTIFICATIONS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    unread_only.then(|| q.field("read").eq(false)).flatten(),
                ])
            })
            .order_by([("created_at", FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark a notification read. Other users' notifications look missing.
    pub async fn mark_notification_read(
        &self,
        notification_id: &str,
        user_id: &str,
    ) -> Result<Notification, AppError> {
        let mut notification = self
            .get_doc::<Notification>(collections::NOTIFICATIONS, notification_id)
            .await?
            .filter(|n| n.user_id == user_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Notification {} not found", notification_id))
            })?;

        if !notification.read {
            notification.read = true;
            self.create_notification(&notification).await?;
        }
        Ok(notification)
    }
}
