use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ReturnDocument;

use crate::error::AppError;
use crate::models::record::{Record, RejectedRecord};

/// Precondition for claiming a pending record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimGuard {
    /// Claim regardless of verification.
    Any,
    /// Claim only if the record has been verified.
    Verified,
}

/// Storage for one record kind, split across pending, confirmed and
/// rejected collections.
///
/// This trait allows mocking the database layer in tests.
#[async_trait]
pub trait StagedRepository<T: Record>: Send + Sync {
    /// Insert a newly submitted record into the pending collection.
    async fn insert_pending(&self, record: &T) -> Result<(), AppError>;

    async fn find_pending(&self, id: &str) -> Result<Option<T>, AppError>;

    /// Find a pending record whose top-level `field` equals `value`.
    async fn find_pending_by(&self, field: &str, value: &str) -> Result<Option<T>, AppError>;

    /// Pending records, oldest submission first.
    async fn list_pending(&self) -> Result<Vec<T>, AppError>;

    async fn count_pending(&self) -> Result<u64, AppError>;

    /// Stamp the verifier on a pending, not yet verified record.
    ///
    /// Returns the updated record, or `None` if no such unverified record exists.
    async fn mark_verified(
        &self,
        id: &str,
        verifier: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<T>, AppError>;

    /// Atomically remove a pending record and hand it to the caller.
    ///
    /// Of two concurrent claims on the same id, at most one gets `Some`.
    async fn claim_pending(&self, id: &str, guard: ClaimGuard) -> Result<Option<T>, AppError>;

    /// Put a claimed record back into the pending collection.
    async fn restore_pending(&self, record: &T) -> Result<(), AppError>;

    /// Insert or replace a confirmed record (matched by id).
    async fn upsert_confirmed(&self, record: &T) -> Result<(), AppError>;

    async fn remove_confirmed(&self, id: &str) -> Result<(), AppError>;

    async fn find_confirmed(&self, id: &str) -> Result<Option<T>, AppError>;

    /// Find a confirmed record whose top-level `field` equals `value`.
    async fn find_confirmed_by(&self, field: &str, value: &str) -> Result<Option<T>, AppError>;

    async fn list_confirmed(&self) -> Result<Vec<T>, AppError>;

    async fn count_confirmed(&self) -> Result<u64, AppError>;

    async fn insert_rejected(&self, rejected: &RejectedRecord<T>) -> Result<(), AppError>;

    /// Rejected records, most recent first.
    async fn list_rejected(&self) -> Result<Vec<RejectedRecord<T>>, AppError>;
}

/// MongoDB implementation of the StagedRepository.
pub struct MongoStagedRepository<T: Record> {
    pending: mongodb::Collection<T>,
    confirmed: mongodb::Collection<T>,
    rejected: mongodb::Collection<RejectedRecord<T>>,
}

impl<T: Record> MongoStagedRepository<T> {
    pub fn new(db: &mongodb::Database) -> Self {
        let kind = T::KIND;
        Self {
            pending: db.collection(&kind.pending_collection()),
            confirmed: db.collection(&kind.confirmed_collection()),
            rejected: db.collection(&kind.rejected_collection()),
        }
    }
}

fn field_filter(field: &str, value: &str) -> Document {
    let mut filter = Document::new();
    filter.insert(field, value);
    filter
}

#[async_trait]
impl<T: Record> StagedRepository<T> for MongoStagedRepository<T> {
    async fn insert_pending(&self, record: &T) -> Result<(), AppError> {
        self.pending
            .insert_one(record)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_pending(&self, id: &str) -> Result<Option<T>, AppError> {
        self.pending
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_pending_by(&self, field: &str, value: &str) -> Result<Option<T>, AppError> {
        self.pending
            .find_one(field_filter(field, value))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_pending(&self) -> Result<Vec<T>, AppError> {
        let cursor = self
            .pending
            .find(doc! {})
            .sort(doc! { "audit.submitted_at": 1 })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn count_pending(&self) -> Result<u64, AppError> {
        self.pending
            .count_documents(doc! {})
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn mark_verified(
        &self,
        id: &str,
        verifier: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<T>, AppError> {
        // Same string encoding as the serde-derived audit trail.
        let at = mongodb::bson::to_bson(&at).map_err(|e| AppError::Internal(e.to_string()))?;

        self.pending
            .find_one_and_update(
                doc! { "_id": id, "audit.verified_by": null },
                doc! { "$set": { "audit.verified_by": verifier, "audit.verified_at": at } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn claim_pending(&self, id: &str, guard: ClaimGuard) -> Result<Option<T>, AppError> {
        let filter = match guard {
            ClaimGuard::Any => doc! { "_id": id },
            ClaimGuard::Verified => doc! { "_id": id, "audit.verified_by": { "$ne": null } },
        };

        self.pending
            .find_one_and_delete(filter)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn restore_pending(&self, record: &T) -> Result<(), AppError> {
        self.pending
            .replace_one(doc! { "_id": record.id() }, record)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn upsert_confirmed(&self, record: &T) -> Result<(), AppError> {
        self.confirmed
            .replace_one(doc! { "_id": record.id() }, record)
            .upsert(true)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn remove_confirmed(&self, id: &str) -> Result<(), AppError> {
        self.confirmed
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_confirmed(&self, id: &str) -> Result<Option<T>, AppError> {
        self.confirmed
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_confirmed_by(&self, field: &str, value: &str) -> Result<Option<T>, AppError> {
        self.confirmed
            .find_one(field_filter(field, value))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_confirmed(&self) -> Result<Vec<T>, AppError> {
        let cursor = self
            .confirmed
            .find(doc! {})
            .sort(doc! { "audit.approved_at": -1 })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn count_confirmed(&self) -> Result<u64, AppError> {
        self.confirmed
            .count_documents(doc! {})
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn insert_rejected(&self, rejected: &RejectedRecord<T>) -> Result<(), AppError> {
        self.rejected
            .replace_one(doc! { "_id": &rejected.id }, rejected)
            .upsert(true)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_rejected(&self) -> Result<Vec<RejectedRecord<T>>, AppError> {
        let cursor = self
            .rejected
            .find(doc! {})
            .sort(doc! { "rejected_at": -1 })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
