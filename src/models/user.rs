use serde::{Deserialize, Serialize};

use crate::auth::models::Role;
use crate::models::record::{AuditTrail, Record, RecordKind};

/// A portal account. Pending until an admin approves the registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    /// `salt$key`, see [`crate::auth::password`].
    pub password_hash: String,
    pub audit: AuditTrail,
}

impl Record for User {
    const KIND: RecordKind = RecordKind::User;

    fn id(&self) -> &str {
        &self.id
    }

    fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut AuditTrail {
        &mut self.audit
    }

    fn describe(&self) -> String {
        format!("registration of '{}' as {}", self.username, self.role)
    }
}

/// A user as returned by the API: never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub audit: AuditTrail,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            name: user.name,
            email: user.email,
            phone: user.phone,
            role: user.role,
            audit: user.audit,
        }
    }
}

/// Body of `POST /api/users/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: String,
}
