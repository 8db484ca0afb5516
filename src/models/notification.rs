use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::models::Role;
use crate::models::record::{new_record_id, RecordKind};

/// A message shown on a user's dashboard.
///
/// Addressed either to one user (`recipient_user`) or to everyone holding
/// `recipient_role`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub recipient_user: Option<String>,
    #[serde(default)]
    pub recipient_role: Option<Role>,
    pub kind: RecordKind,
    pub record_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Notification {
    pub fn to_user(username: &str, kind: RecordKind, record_id: &str, message: String) -> Self {
        Self {
            id: new_record_id(),
            recipient_user: Some(username.to_string()),
            recipient_role: None,
            kind,
            record_id: record_id.to_string(),
            message,
            created_at: Utc::now(),
            read: false,
        }
    }

    pub fn to_role(role: Role, kind: RecordKind, record_id: &str, message: String) -> Self {
        Self {
            id: new_record_id(),
            recipient_user: None,
            recipient_role: Some(role),
            kind,
            record_id: record_id.to_string(),
            message,
            created_at: Utc::now(),
            read: false,
        }
    }

    pub fn is_addressed_to(&self, username: &str, role: Role) -> bool {
        self.recipient_user.as_deref() == Some(username) || self.recipient_role == Some(role)
    }
}
