use serde::{Deserialize, Serialize};
use std::fmt;

/// Portal roles. Each role owns one dashboard.
///
/// Serialized in snake_case both in MongoDB and on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Manages user registrations.
    Admin,
    /// Enters purchases, issues, returns, services and disposal requests.
    Storekeeper,
    /// Approves asset movements.
    AssetManager,
    /// Head of Office: approves disposals, may verify faculty records.
    HeadOfOffice,
    /// Final approver of faculty records.
    Principal,
    /// Enters faculty records and conduct updates.
    FacultyEntryStaff,
    /// Verifies faculty records before they reach the principal.
    FacultyVerifier,
    /// Read-only access to confirmed records.
    Viewer,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Admin,
        Role::Storekeeper,
        Role::AssetManager,
        Role::HeadOfOffice,
        Role::Principal,
        Role::FacultyEntryStaff,
        Role::FacultyVerifier,
        Role::Viewer,
    ];

    /// Parse a role from a string (case-insensitive, `-`/`_`/space agnostic).
    pub fn from_str_ci(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "admin" => Some(Role::Admin),
            "storekeeper" => Some(Role::Storekeeper),
            "assetmanager" => Some(Role::AssetManager),
            "headofoffice" | "hoo" => Some(Role::HeadOfOffice),
            "principal" => Some(Role::Principal),
            "facultyentrystaff" => Some(Role::FacultyEntryStaff),
            "facultyverifier" => Some(Role::FacultyVerifier),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    /// Roles a visitor may request when self-registering.
    pub fn is_self_registrable(&self) -> bool {
        *self != Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Storekeeper => "storekeeper",
            Role::AssetManager => "asset_manager",
            Role::HeadOfOffice => "head_of_office",
            Role::Principal => "principal",
            Role::FacultyEntryStaff => "faculty_entry_staff",
            Role::FacultyVerifier => "faculty_verifier",
            Role::Viewer => "viewer",
        };
        write!(f, "{s}")
    }
}

/// The user behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Id of the confirmed user record.
    pub user_id: String,
    pub username: String,
    pub name: String,
    pub role: Role,
}

impl AuthenticatedUser {
    /// Returns `true` if the user holds one of `roles`.
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    /// Fails with `Forbidden` unless the user holds one of `roles`.
    pub fn require_any(&self, roles: &[Role], action: &str) -> Result<(), crate::error::AppError> {
        if self.has_any_role(roles) {
            Ok(())
        } else {
            Err(crate::error::AppError::Forbidden(format!(
                "Role '{}' may not {}",
                self.role, action
            )))
        }
    }
}
