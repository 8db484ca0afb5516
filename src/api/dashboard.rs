use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::staged::StagedResource;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::error::AppError;
use crate::models::asset::{
    AssetDisposal, AssetIssue, AssetPurchase, AssetReturn, AssetService, StockEntry,
};
use crate::models::faculty::{Faculty, FacultyUpdate};
use crate::models::record::RecordKind;
use crate::models::user::User;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct KindCounts {
    pub kind: RecordKind,
    pub label: &'static str,
    /// Only present for kinds the caller's role verifies or approves.
    pub pending: Option<u64>,
    pub confirmed: u64,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct StockTotals {
    pub items: usize,
    pub in_stock: i64,
    pub issued: i64,
    pub under_service: i64,
    pub awaiting_disposal: i64,
    pub disposed: i64,
}

impl StockTotals {
    pub fn from_entries(entries: &[StockEntry]) -> Self {
        entries.iter().fold(
            StockTotals {
                items: entries.len(),
                ..Default::default()
            },
            |mut totals, entry| {
                totals.in_stock += entry.in_stock;
                totals.issued += entry.issued;
                totals.under_service += entry.under_service;
                totals.awaiting_disposal += entry.awaiting_disposal;
                totals.disposed += entry.disposed;
                totals
            },
        )
    }
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub user: AuthenticatedUser,
    pub kinds: Vec<KindCounts>,
    pub stock: StockTotals,
    pub unread_notifications: u64,
}

async fn kind_counts<T: StagedResource>(
    state: &AppState,
    role: Role,
) -> Result<KindCounts, AppError> {
    let repository = T::repository(state);
    let pending = if T::KIND.reviewer_roles().contains(&role) {
        Some(repository.count_pending().await?)
    } else {
        None
    };
    Ok(KindCounts {
        kind: T::KIND,
        label: T::KIND.label(),
        pending,
        confirmed: repository.count_confirmed().await?,
    })
}

/// `GET /api/dashboard` — counters for the caller's role.
pub async fn dashboard_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Dashboard>, AppError> {
    let role = user.role;
    let counts = tokio::try_join!(
        kind_counts::<User>(&state, role),
        kind_counts::<Faculty>(&state, role),
        kind_counts::<FacultyUpdate>(&state, role),
        kind_counts::<AssetPurchase>(&state, role),
        kind_counts::<AssetIssue>(&state, role),
        kind_counts::<AssetReturn>(&state, role),
        kind_counts::<AssetService>(&state, role),
        kind_counts::<AssetDisposal>(&state, role),
    )?;
    let (users, faculty, updates, purchases, issues, returns, services, disposals) = counts;

    let stock = state.stock.list().await?;
    let unread_notifications = state
        .notifications
        .count_unread(&user.username, user.role)
        .await?;

    Ok(Json(Dashboard {
        kinds: vec![
            users, faculty, updates, purchases, issues, returns, services, disposals,
        ],
        stock: StockTotals::from_entries(&stock),
        unread_notifications,
        user,
    }))
}
