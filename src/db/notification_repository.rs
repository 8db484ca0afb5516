use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};

use crate::auth::models::Role;
use crate::error::AppError;
use crate::models::notification::Notification;

/// Repository trait for dashboard notifications.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &Notification) -> Result<(), AppError>;

    /// Notifications addressed to the user or their role, newest first.
    async fn list_for(
        &self,
        username: &str,
        role: Role,
        unread_only: bool,
    ) -> Result<Vec<Notification>, AppError>;

    /// Returns `false` if no notification with `id` is addressed to the caller.
    async fn mark_read(&self, id: &str, username: &str, role: Role) -> Result<bool, AppError>;

    async fn count_unread(&self, username: &str, role: Role) -> Result<u64, AppError>;
}

/// MongoDB implementation of the NotificationRepository.
pub struct MongoNotificationRepository {
    collection: mongodb::Collection<Notification>,
}

impl MongoNotificationRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("notifications"),
        }
    }
}

fn addressed_to(username: &str, role: Role) -> Document {
    doc! {
        "$or": [
            { "recipient_user": username },
            { "recipient_role": role.to_string() },
        ]
    }
}

#[async_trait]
impl NotificationRepository for MongoNotificationRepository {
    async fn insert(&self, notification: &Notification) -> Result<(), AppError> {
        self.collection
            .insert_one(notification)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_for(
        &self,
        username: &str,
        role: Role,
        unread_only: bool,
    ) -> Result<Vec<Notification>, AppError> {
        let mut filter = addressed_to(username, role);
        if unread_only {
            filter.insert("read", false);
        }

        let cursor = self
            .collection
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn mark_read(&self, id: &str, username: &str, role: Role) -> Result<bool, AppError> {
        let mut filter = addressed_to(username, role);
        filter.insert("_id", id);

        let result = self
            .collection
            .update_one(filter, doc! { "$set": { "read": true } })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.matched_count > 0)
    }

    async fn count_unread(&self, username: &str, role: Role) -> Result<u64, AppError> {
        let mut filter = addressed_to(username, role);
        filter.insert("read", false);

        self.collection
            .count_documents(filter)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
