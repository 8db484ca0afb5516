use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::auth::models::AuthenticatedUser;
use crate::error::AppError;
use crate::models::record::{new_record_id, AuditTrail, Record, RecordKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Permanent,
    Consumable,
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetType::Permanent => write!(f, "permanent"),
            AssetType::Consumable => write!(f, "consumable"),
        }
    }
}

/// Identifies one line of stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetItem {
    pub asset_type: AssetType,
    pub category: String,
    pub item_name: String,
}

impl AssetItem {
    /// Stock key: case-insensitive on category and item name.
    pub fn stock_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.asset_type,
            self.category.trim().to_lowercase(),
            self.item_name.trim().to_lowercase()
        )
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.category.trim().is_empty() {
            return Err(AppError::BadRequest("Category cannot be empty".into()));
        }
        if self.item_name.trim().is_empty() {
            return Err(AppError::BadRequest("Item name cannot be empty".into()));
        }
        Ok(())
    }
}

impl std::fmt::Display for AssetItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.item_name, self.category, self.asset_type)
    }
}

fn validate_quantity(quantity: u32) -> Result<(), AppError> {
    if quantity == 0 {
        return Err(AppError::BadRequest("Quantity must be positive".into()));
    }
    Ok(())
}

fn require_text(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Signed change to the counters of one stock entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockDelta {
    pub in_stock: i64,
    pub issued: i64,
    pub under_service: i64,
    pub awaiting_disposal: i64,
    pub disposed: i64,
}

impl StockDelta {
    /// `(counter, delta)` pairs for every non-zero counter.
    pub fn changes(&self) -> Vec<(&'static str, i64)> {
        [
            ("in_stock", self.in_stock),
            ("issued", self.issued),
            ("under_service", self.under_service),
            ("awaiting_disposal", self.awaiting_disposal),
            ("disposed", self.disposed),
        ]
        .into_iter()
        .filter(|(_, delta)| *delta != 0)
        .collect()
    }

    /// Counters that decrease, with the minimum value each must currently hold.
    pub fn guards(&self) -> Vec<(&'static str, i64)> {
        self.changes()
            .into_iter()
            .filter(|(_, delta)| *delta < 0)
            .map(|(field, delta)| (field, -delta))
            .collect()
    }

    /// A delta that only adds may create the stock entry.
    pub fn is_additive(&self) -> bool {
        self.guards().is_empty()
    }
}

/// Running counters for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEntry {
    #[serde(rename = "_id")]
    pub key: String,
    pub asset_type: AssetType,
    pub category: String,
    pub item_name: String,
    #[serde(default)]
    pub in_stock: i64,
    #[serde(default)]
    pub issued: i64,
    #[serde(default)]
    pub under_service: i64,
    #[serde(default)]
    pub awaiting_disposal: i64,
    #[serde(default)]
    pub disposed: i64,
}

impl StockEntry {
    pub fn empty(item: &AssetItem) -> Self {
        Self {
            key: item.stock_key(),
            asset_type: item.asset_type,
            category: item.category.clone(),
            item_name: item.item_name.clone(),
            in_stock: 0,
            issued: 0,
            under_service: 0,
            awaiting_disposal: 0,
            disposed: 0,
        }
    }

    /// Returns `false` (leaving `self` untouched) if a counter would go negative.
    pub fn apply(&mut self, delta: &StockDelta) -> bool {
        let next = [
            self.in_stock + delta.in_stock,
            self.issued + delta.issued,
            self.under_service + delta.under_service,
            self.awaiting_disposal + delta.awaiting_disposal,
            self.disposed + delta.disposed,
        ];
        if next.iter().any(|v| *v < 0) {
            return false;
        }
        [
            self.in_stock,
            self.issued,
            self.under_service,
            self.awaiting_disposal,
            self.disposed,
        ] = next;
        true
    }
}

// -- Purchase --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseSubmission {
    pub item: AssetItem,
    pub quantity: u32,
    pub unit_price: f64,
    pub supplier_name: String,
    pub bill_no: String,
    pub purchase_date: NaiveDate,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form accessory details, e.g. `{"charger": "65W"}`.
    #[serde(default)]
    pub accessories: BTreeMap<String, String>,
    /// Upload name of the scanned bill.
    #[serde(default)]
    pub bill_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetPurchase {
    #[serde(rename = "_id")]
    pub id: String,
    pub item: AssetItem,
    pub quantity: u32,
    pub unit_price: f64,
    pub total_price: f64,
    pub supplier_name: String,
    pub bill_no: String,
    pub purchase_date: NaiveDate,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub accessories: BTreeMap<String, String>,
    #[serde(default)]
    pub bill_file: Option<String>,
    pub audit: AuditTrail,
}

impl AssetPurchase {
    pub fn from_submission(
        sub: PurchaseSubmission,
        actor: &AuthenticatedUser,
    ) -> Result<Self, AppError> {
        sub.item.validate()?;
        validate_quantity(sub.quantity)?;
        if !(sub.unit_price.is_finite() && sub.unit_price >= 0.0) {
            return Err(AppError::BadRequest("Unit price must be non-negative".into()));
        }
        require_text(&sub.supplier_name, "Supplier name")?;
        require_text(&sub.bill_no, "Bill number")?;
        Ok(Self {
            id: new_record_id(),
            total_price: f64::from(sub.quantity) * sub.unit_price,
            item: sub.item,
            quantity: sub.quantity,
            unit_price: sub.unit_price,
            supplier_name: sub.supplier_name,
            bill_no: sub.bill_no,
            purchase_date: sub.purchase_date,
            location: sub.location,
            description: sub.description,
            accessories: sub.accessories,
            bill_file: sub.bill_file,
            audit: AuditTrail::submitted(&actor.username),
        })
    }

    pub fn stock_delta(&self) -> StockDelta {
        StockDelta {
            in_stock: i64::from(self.quantity),
            ..Default::default()
        }
    }
}

// -- Issue --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueSubmission {
    pub item: AssetItem,
    pub quantity: u32,
    pub issued_to: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetIssue {
    #[serde(rename = "_id")]
    pub id: String,
    pub item: AssetItem,
    pub quantity: u32,
    pub issued_to: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    pub audit: AuditTrail,
}

impl AssetIssue {
    pub fn from_submission(
        sub: IssueSubmission,
        actor: &AuthenticatedUser,
    ) -> Result<Self, AppError> {
        sub.item.validate()?;
        validate_quantity(sub.quantity)?;
        require_text(&sub.issued_to, "Recipient")?;
        Ok(Self {
            id: new_record_id(),
            item: sub.item,
            quantity: sub.quantity,
            issued_to: sub.issued_to,
            location: sub.location,
            purpose: sub.purpose,
            audit: AuditTrail::submitted(&actor.username),
        })
    }

    pub fn stock_delta(&self) -> StockDelta {
        let q = i64::from(self.quantity);
        StockDelta {
            in_stock: -q,
            issued: q,
            ..Default::default()
        }
    }
}

// -- Return --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnCondition {
    Good,
    ServiceRequired,
    Dispose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnSubmission {
    pub item: AssetItem,
    pub quantity: u32,
    pub returned_by: String,
    pub condition: ReturnCondition,
    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetReturn {
    #[serde(rename = "_id")]
    pub id: String,
    pub item: AssetItem,
    pub quantity: u32,
    pub returned_by: String,
    pub condition: ReturnCondition,
    #[serde(default)]
    pub remark: Option<String>,
    pub audit: AuditTrail,
}

impl AssetReturn {
    pub fn from_submission(
        sub: ReturnSubmission,
        actor: &AuthenticatedUser,
    ) -> Result<Self, AppError> {
        sub.item.validate()?;
        validate_quantity(sub.quantity)?;
        require_text(&sub.returned_by, "Returned by")?;
        Ok(Self {
            id: new_record_id(),
            item: sub.item,
            quantity: sub.quantity,
            returned_by: sub.returned_by,
            condition: sub.condition,
            remark: sub.remark,
            audit: AuditTrail::submitted(&actor.username),
        })
    }

    pub fn stock_delta(&self) -> StockDelta {
        let q = i64::from(self.quantity);
        let mut delta = StockDelta {
            issued: -q,
            ..Default::default()
        };
        match self.condition {
            ReturnCondition::Good => delta.in_stock = q,
            ReturnCondition::ServiceRequired => delta.under_service = q,
            ReturnCondition::Dispose => delta.awaiting_disposal = q,
        }
        delta
    }
}

// -- Service --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSubmission {
    pub item: AssetItem,
    pub quantity: u32,
    pub service_provider: String,
    #[serde(default)]
    pub service_cost: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub service_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetService {
    #[serde(rename = "_id")]
    pub id: String,
    pub item: AssetItem,
    pub quantity: u32,
    pub service_provider: String,
    pub service_cost: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub service_date: NaiveDate,
    pub audit: AuditTrail,
}

impl AssetService {
    pub fn from_submission(
        sub: ServiceSubmission,
        actor: &AuthenticatedUser,
    ) -> Result<Self, AppError> {
        sub.item.validate()?;
        validate_quantity(sub.quantity)?;
        require_text(&sub.service_provider, "Service provider")?;
        if !(sub.service_cost.is_finite() && sub.service_cost >= 0.0) {
            return Err(AppError::BadRequest("Service cost must be non-negative".into()));
        }
        Ok(Self {
            id: new_record_id(),
            item: sub.item,
            quantity: sub.quantity,
            service_provider: sub.service_provider,
            service_cost: sub.service_cost,
            description: sub.description,
            service_date: sub.service_date,
            audit: AuditTrail::submitted(&actor.username),
        })
    }

    pub fn stock_delta(&self) -> StockDelta {
        let q = i64::from(self.quantity);
        StockDelta {
            under_service: -q,
            in_stock: q,
            ..Default::default()
        }
    }
}

// -- Disposal --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisposalSource {
    /// Unissued items still in the store.
    Stock,
    /// Items returned in a condition marked for disposal.
    Returned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisposalSubmission {
    pub item: AssetItem,
    pub quantity: u32,
    pub source: DisposalSource,
    pub method: String,
    #[serde(default)]
    pub disposal_value: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetDisposal {
    #[serde(rename = "_id")]
    pub id: String,
    pub item: AssetItem,
    pub quantity: u32,
    pub source: DisposalSource,
    pub method: String,
    pub disposal_value: f64,
    pub reason: String,
    pub audit: AuditTrail,
}

impl AssetDisposal {
    pub fn from_submission(
        sub: DisposalSubmission,
        actor: &AuthenticatedUser,
    ) -> Result<Self, AppError> {
        sub.item.validate()?;
        validate_quantity(sub.quantity)?;
        require_text(&sub.method, "Disposal method")?;
        require_text(&sub.reason, "Disposal reason")?;
        Ok(Self {
            id: new_record_id(),
            item: sub.item,
            quantity: sub.quantity,
            source: sub.source,
            method: sub.method,
            disposal_value: sub.disposal_value,
            reason: sub.reason,
            audit: AuditTrail::submitted(&actor.username),
        })
    }

    pub fn stock_delta(&self) -> StockDelta {
        let q = i64::from(self.quantity);
        let mut delta = StockDelta {
            disposed: q,
            ..Default::default()
        };
        match self.source {
            DisposalSource::Stock => delta.in_stock = -q,
            DisposalSource::Returned => delta.awaiting_disposal = -q,
        }
        delta
    }
}

macro_rules! impl_asset_record {
    ($ty:ty, $kind:expr, $verb:literal) => {
        impl Record for $ty {
            const KIND: RecordKind = $kind;

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
                format!("{} of {} x {}", $verb, self.quantity, self.item)
            }
        }
    };
}

impl_asset_record!(AssetPurchase, RecordKind::AssetPurchase, "purchase");
impl_asset_record!(AssetIssue, RecordKind::AssetIssue, "issue");
impl_asset_record!(AssetReturn, RecordKind::AssetReturn, "return");
impl_asset_record!(AssetService, RecordKind::AssetService, "service");
impl_asset_record!(AssetDisposal, RecordKind::AssetDisposal, "disposal");
