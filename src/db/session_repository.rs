use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};

use crate::auth::models::AuthenticatedUser;
use crate::error::AppError;

/// A login session. Only the SHA-256 of the cookie token is stored.
///
/// `expires_at` is a BSON date so the TTL index on it can remove sessions
/// whose cookie is never presented again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "_id")]
    pub token_hash: String,
    pub user: AuthenticatedUser,
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

/// Collection holding [`SessionRecord`]s.
pub const SESSIONS_COLLECTION: &str = "sessions";

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Repository trait for login sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &SessionRecord) -> Result<(), AppError>;

    async fn find(&self, token_hash: &str) -> Result<Option<SessionRecord>, AppError>;

    async fn delete(&self, token_hash: &str) -> Result<(), AppError>;
}

/// MongoDB implementation of the SessionRepository.
pub struct MongoSessionRepository {
    collection: mongodb::Collection<SessionRecord>,
}

impl MongoSessionRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection(SESSIONS_COLLECTION),
        }
    }
}

#[async_trait]
impl SessionRepository for MongoSessionRepository {
    async fn create(&self, session: &SessionRecord) -> Result<(), AppError> {
        self.collection
            .insert_one(session)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find(&self, token_hash: &str) -> Result<Option<SessionRecord>, AppError> {
        self.collection
            .find_one(doc! { "_id": token_hash })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete(&self, token_hash: &str) -> Result<(), AppError> {
        self.collection
            .delete_one(doc! { "_id": token_hash })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Role;

    fn session(now: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            token_hash: "abc".to_string(),
            user: AuthenticatedUser {
                user_id: "u".to_string(),
                username: "admin".to_string(),
                name: "Admin".to_string(),
                role: Role::Admin,
            },
            created_at: now,
            expires_at: now + chrono::Duration::hours(1),
        }
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let session = session(now);
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + chrono::Duration::hours(2)));
    }

    #[test]
    fn test_expires_at_is_stored_as_date() {
        let session = session(Utc::now());
        let stored = bson::to_document(&session).unwrap();
        let expires_at = stored.get_datetime("expires_at").unwrap();
        assert_eq!(
            expires_at.timestamp_millis(),
            session.expires_at.timestamp_millis()
        );

        let back: SessionRecord = bson::from_document(stored).unwrap();
        assert_eq!(back.token_hash, "abc");
    }
}
