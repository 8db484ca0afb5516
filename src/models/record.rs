use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::models::Role;

/// Every workflow-managed record type.
///
/// Each kind owns three collections named `<prefix>_pending`,
/// `<prefix>_confirmed` and `<prefix>_rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    User,
    Faculty,
    FacultyUpdate,
    AssetPurchase,
    AssetIssue,
    AssetReturn,
    AssetService,
    AssetDisposal,
}

impl RecordKind {
    pub const ALL: [RecordKind; 8] = [
        RecordKind::User,
        RecordKind::Faculty,
        RecordKind::FacultyUpdate,
        RecordKind::AssetPurchase,
        RecordKind::AssetIssue,
        RecordKind::AssetReturn,
        RecordKind::AssetService,
        RecordKind::AssetDisposal,
    ];

    pub fn collection_prefix(&self) -> &'static str {
        match self {
            RecordKind::User => "users",
            RecordKind::Faculty => "faculty",
            RecordKind::FacultyUpdate => "faculty_updates",
            RecordKind::AssetPurchase => "asset_purchases",
            RecordKind::AssetIssue => "asset_issues",
            RecordKind::AssetReturn => "asset_returns",
            RecordKind::AssetService => "asset_services",
            RecordKind::AssetDisposal => "asset_disposals",
        }
    }

    pub fn pending_collection(&self) -> String {
        format!("{}_pending", self.collection_prefix())
    }

    pub fn confirmed_collection(&self) -> String {
        format!("{}_confirmed", self.collection_prefix())
    }

    pub fn rejected_collection(&self) -> String {
        format!("{}_rejected", self.collection_prefix())
    }

    /// Human-readable name used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::User => "user registration",
            RecordKind::Faculty => "faculty record",
            RecordKind::FacultyUpdate => "faculty update",
            RecordKind::AssetPurchase => "asset purchase",
            RecordKind::AssetIssue => "asset issue",
            RecordKind::AssetReturn => "asset return",
            RecordKind::AssetService => "asset service",
            RecordKind::AssetDisposal => "asset disposal",
        }
    }

    /// Whether a pending record must be verified before it can be approved.
    pub fn requires_verification(&self) -> bool {
        matches!(self, RecordKind::Faculty | RecordKind::FacultyUpdate)
    }

    /// Roles allowed to submit. Empty for self-registration.
    pub fn submitter_roles(&self) -> &'static [Role] {
        match self {
            RecordKind::User => &[],
            RecordKind::Faculty | RecordKind::FacultyUpdate => &[Role::FacultyEntryStaff],
            RecordKind::AssetPurchase
            | RecordKind::AssetIssue
            | RecordKind::AssetReturn
            | RecordKind::AssetService => &[Role::Storekeeper],
            RecordKind::AssetDisposal => &[Role::Storekeeper, Role::AssetManager],
        }
    }

    pub fn verifier_roles(&self) -> &'static [Role] {
        match self {
            RecordKind::Faculty | RecordKind::FacultyUpdate => {
                &[Role::FacultyVerifier, Role::HeadOfOffice]
            }
            _ => &[],
        }
    }

    pub fn approver_roles(&self) -> &'static [Role] {
        match self {
            RecordKind::User => &[Role::Admin],
            RecordKind::Faculty | RecordKind::FacultyUpdate => &[Role::Principal],
            RecordKind::AssetPurchase
            | RecordKind::AssetIssue
            | RecordKind::AssetReturn
            | RecordKind::AssetService => &[Role::AssetManager],
            RecordKind::AssetDisposal => &[Role::HeadOfOffice],
        }
    }

    /// Roles allowed to reject: anyone who verifies or approves.
    pub fn reviewer_roles(&self) -> Vec<Role> {
        let mut roles = self.verifier_roles().to_vec();
        for role in self.approver_roles() {
            if !roles.contains(role) {
                roles.push(*role);
            }
        }
        roles
    }

    /// Roles that take part in the workflow and may see its pending queue.
    pub fn participant_roles(&self) -> Vec<Role> {
        let mut roles = self.reviewer_roles();
        for role in self.submitter_roles() {
            if !roles.contains(role) {
                roles.push(*role);
            }
        }
        roles
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Where a record sits in its approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    Verified,
    Confirmed,
    Rejected,
}

impl Stage {
    /// Legal transitions. `Confirmed` and `Rejected` are terminal.
    pub fn can_transition_to(self, next: Stage, requires_verification: bool) -> bool {
        match (self, next) {
            (Stage::Pending, Stage::Verified) => requires_verification,
            (Stage::Pending, Stage::Confirmed) => !requires_verification,
            (Stage::Verified, Stage::Confirmed) => true,
            (Stage::Pending | Stage::Verified, Stage::Rejected) => true,
            _ => false,
        }
    }
}

/// Who moved a record through the workflow, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub verified_by: Option<String>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
}

impl AuditTrail {
    pub fn submitted(by: &str) -> Self {
        Self {
            submitted_by: by.to_string(),
            submitted_at: Utc::now(),
            verified_by: None,
            verified_at: None,
            approved_by: None,
            approved_at: None,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verified_by.is_some()
    }
}

/// A document that moves through the pending/confirmed/rejected split.
///
/// The `_id` is assigned at submission and preserved across collections.
pub trait Record:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + Unpin + 'static
{
    const KIND: RecordKind;

    fn id(&self) -> &str;

    fn audit(&self) -> &AuditTrail;

    fn audit_mut(&mut self) -> &mut AuditTrail;

    /// Short description used in notification messages.
    fn describe(&self) -> String;

    /// Stage of a record that is still in the pending collection.
    fn pending_stage(&self) -> Stage {
        if self.audit().is_verified() {
            Stage::Verified
        } else {
            Stage::Pending
        }
    }
}

/// A record moved to the rejected collection, with the reviewer's remarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedRecord<T> {
    #[serde(rename = "_id")]
    pub id: String,
    pub record: T,
    pub remarks: String,
    pub rejected_by: String,
    pub rejected_at: DateTime<Utc>,
}

impl<T> RejectedRecord<T> {
    /// Convert the wrapped record, e.g. into its API view.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RejectedRecord<U> {
        RejectedRecord {
            id: self.id,
            record: f(self.record),
            remarks: self.remarks,
            rejected_by: self.rejected_by,
            rejected_at: self.rejected_at,
        }
    }
}

/// Generate a new record id.
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
