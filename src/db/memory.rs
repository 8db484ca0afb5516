//! In-memory repositories for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::models::Role;
use crate::db::notification_repository::NotificationRepository;
use crate::db::session_repository::{SessionRecord, SessionRepository};
use crate::db::staged_repository::{ClaimGuard, StagedRepository};
use crate::db::stock_repository::StockRepository;
use crate::error::AppError;
use crate::models::asset::{AssetItem, StockDelta, StockEntry};
use crate::models::notification::Notification;
use crate::models::record::{Record, RejectedRecord};

pub struct MemoryStagedRepository<T> {
    pub pending: Mutex<Vec<T>>,
    pub confirmed: Mutex<Vec<T>>,
    pub rejected: Mutex<Vec<RejectedRecord<T>>>,
    /// When set, `upsert_confirmed` fails (to exercise compensation).
    pub fail_confirm: Mutex<bool>,
    /// When set, `insert_rejected` fails.
    pub fail_reject: Mutex<bool>,
}

impl<T> MemoryStagedRepository<T> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(vec![]),
            confirmed: Mutex::new(vec![]),
            rejected: Mutex::new(vec![]),
            fail_confirm: Mutex::new(false),
            fail_reject: Mutex::new(false),
        }
    }
}

fn field_matches<T: Record>(record: &T, field: &str, value: &str) -> bool {
    serde_json::to_value(record)
        .ok()
        .and_then(|v| v.get(field).and_then(|f| f.as_str()).map(|s| s == value))
        .unwrap_or(false)
}

#[async_trait]
impl<T: Record> StagedRepository<T> for MemoryStagedRepository<T> {
    async fn insert_pending(&self, record: &T) -> Result<(), AppError> {
        self.pending.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn find_pending(&self, id: &str) -> Result<Option<T>, AppError> {
        Ok(self.pending.lock().unwrap().iter().find(|r| r.id() == id).cloned())
    }

    async fn find_pending_by(&self, field: &str, value: &str) -> Result<Option<T>, AppError> {
        Ok(self
            .pending
            .lock()
            .unwrap()
            .iter()
            .find(|r| field_matches(*r, field, value))
            .cloned())
    }

    async fn list_pending(&self) -> Result<Vec<T>, AppError> {
        Ok(self.pending.lock().unwrap().clone())
    }

    async fn count_pending(&self) -> Result<u64, AppError> {
        Ok(self.pending.lock().unwrap().len() as u64)
    }

    async fn mark_verified(
        &self,
        id: &str,
        verifier: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<T>, AppError> {
        let mut pending = self.pending.lock().unwrap();
        let Some(record) = pending
            .iter_mut()
            .find(|r| r.id() == id && !r.audit().is_verified())
        else {
            return Ok(None);
        };
        record.audit_mut().verified_by = Some(verifier.to_string());
        record.audit_mut().verified_at = Some(at);
        Ok(Some(record.clone()))
    }

    async fn claim_pending(&self, id: &str, guard: ClaimGuard) -> Result<Option<T>, AppError> {
        let mut pending = self.pending.lock().unwrap();
        let position = pending.iter().position(|r| {
            r.id() == id && (guard == ClaimGuard::Any || r.audit().is_verified())
        });
        Ok(position.map(|i| pending.remove(i)))
    }

    async fn restore_pending(&self, record: &T) -> Result<(), AppError> {
        let mut pending = self.pending.lock().unwrap();
        pending.retain(|r| r.id() != record.id());
        pending.push(record.clone());
        Ok(())
    }

    async fn upsert_confirmed(&self, record: &T) -> Result<(), AppError> {
        if *self.fail_confirm.lock().unwrap() {
            return Err(AppError::Database("confirmed collection unavailable".into()));
        }
        let mut confirmed = self.confirmed.lock().unwrap();
        confirmed.retain(|r| r.id() != record.id());
        confirmed.push(record.clone());
        Ok(())
    }

    async fn remove_confirmed(&self, id: &str) -> Result<(), AppError> {
        self.confirmed.lock().unwrap().retain(|r| r.id() != id);
        Ok(())
    }

    async fn find_confirmed(&self, id: &str) -> Result<Option<T>, AppError> {
        Ok(self.confirmed.lock().unwrap().iter().find(|r| r.id() == id).cloned())
    }

    async fn find_confirmed_by(&self, field: &str, value: &str) -> Result<Option<T>, AppError> {
        Ok(self
            .confirmed
            .lock()
            .unwrap()
            .iter()
            .find(|r| field_matches(*r, field, value))
            .cloned())
    }

    async fn list_confirmed(&self) -> Result<Vec<T>, AppError> {
        Ok(self.confirmed.lock().unwrap().clone())
    }

    async fn count_confirmed(&self) -> Result<u64, AppError> {
        Ok(self.confirmed.lock().unwrap().len() as u64)
    }

    async fn insert_rejected(&self, rejected: &RejectedRecord<T>) -> Result<(), AppError> {
        if *self.fail_reject.lock().unwrap() {
            return Err(AppError::Database("rejected collection unavailable".into()));
        }
        self.rejected.lock().unwrap().push(rejected.clone());
        Ok(())
    }

    async fn list_rejected(&self) -> Result<Vec<RejectedRecord<T>>, AppError> {
        Ok(self.rejected.lock().unwrap().clone())
    }
}

pub struct MemoryStockRepository {
    pub entries: Mutex<HashMap<String, StockEntry>>,
}

impl MemoryStockRepository {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl StockRepository for MemoryStockRepository {
    async fn apply(
        &self,
        item: &AssetItem,
        delta: &StockDelta,
    ) -> Result<Option<StockEntry>, AppError> {
        let mut entries = self.entries.lock().unwrap();
        let key = item.stock_key();
        if !entries.contains_key(&key) {
            if !delta.is_additive() {
                return Ok(None);
            }
            entries.insert(key.clone(), StockEntry::empty(item));
        }
        let Some(entry) = entries.get_mut(&key) else {
            return Ok(None);
        };
        if entry.apply(delta) {
            Ok(Some(entry.clone()))
        } else {
            Ok(None)
        }
    }

    async fn find(&self, item: &AssetItem) -> Result<Option<StockEntry>, AppError> {
        Ok(self.entries.lock().unwrap().get(&item.stock_key()).cloned())
    }

    async fn list(&self) -> Result<Vec<StockEntry>, AppError> {
        let mut entries: Vec<StockEntry> = self.entries.lock().unwrap().values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

pub struct MemoryNotificationRepository {
    pub notifications: Mutex<Vec<Notification>>,
}

impl MemoryNotificationRepository {
    pub fn new() -> Self {
        Self {
            notifications: Mutex::new(vec![]),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationRepository for MemoryNotificationRepository {
    async fn insert(&self, notification: &Notification) -> Result<(), AppError> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn list_for(
        &self,
        username: &str,
        role: Role,
        unread_only: bool,
    ) -> Result<Vec<Notification>, AppError> {
        let mut found: Vec<Notification> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.is_addressed_to(username, role) && (!unread_only || !n.read))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn mark_read(&self, id: &str, username: &str, role: Role) -> Result<bool, AppError> {
        let mut notifications = self.notifications.lock().unwrap();
        match notifications
            .iter_mut()
            .find(|n| n.id == id && n.is_addressed_to(username, role))
        {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_unread(&self, username: &str, role: Role) -> Result<u64, AppError> {
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.is_addressed_to(username, role) && !n.read)
            .count() as u64)
    }
}

pub struct MemorySessionRepository {
    pub sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn create(&self, session: &SessionRecord) -> Result<(), AppError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn find(&self, token_hash: &str) -> Result<Option<SessionRecord>, AppError> {
        Ok(self.sessions.lock().unwrap().get(token_hash).cloned())
    }

    async fn delete(&self, token_hash: &str) -> Result<(), AppError> {
        self.sessions.lock().unwrap().remove(token_hash);
        Ok(())
    }
}
