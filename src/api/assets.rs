use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::staged::{list_confirmed, staged_routes, submit, StagedResource, Submittable};
use crate::auth::models::AuthenticatedUser;
use crate::db::staged_repository::StagedRepository;
use crate::error::AppError;
use crate::models::asset::{
    AssetDisposal, AssetIssue, AssetItem, AssetPurchase, AssetReturn, AssetService,
    DisposalSubmission, IssueSubmission, PurchaseSubmission, ReturnSubmission, ServiceSubmission,
    StockDelta, StockEntry,
};
use crate::state::AppState;

/// Apply a stock delta, failing with `Conflict` if a counter would go negative.
async fn apply_stock(state: &AppState, item: &AssetItem, delta: StockDelta) -> Result<(), AppError> {
    if let Some(entry) = state.stock.apply(item, &delta).await? {
        tracing::info!(
            stock_key = %entry.key,
            in_stock = entry.in_stock,
            issued = entry.issued,
            under_service = entry.under_service,
            awaiting_disposal = entry.awaiting_disposal,
            disposed = entry.disposed,
            "Stock updated"
        );
        return Ok(());
    }

    let current = state.stock.find(item).await?;
    let shortages: Vec<String> = delta
        .guards()
        .into_iter()
        .map(|(counter, needed)| {
            let available = current.as_ref().map(|entry| counter_value(entry, counter)).unwrap_or(0);
            format!("{needed} {} needed, {available} available", counter.replace('_', " "))
        })
        .collect();

    Err(AppError::Conflict(format!(
        "Insufficient stock for {}: {}",
        item,
        shortages.join("; ")
    )))
}

fn counter_value(entry: &StockEntry, counter: &str) -> i64 {
    match counter {
        "in_stock" => entry.in_stock,
        "issued" => entry.issued,
        "under_service" => entry.under_service,
        "awaiting_disposal" => entry.awaiting_disposal,
        "disposed" => entry.disposed,
        _ => 0,
    }
}

macro_rules! asset_resource {
    ($ty:ty, $submission:ty, $field:ident) => {
        #[async_trait]
        impl StagedResource for $ty {
            type View = $ty;

            fn repository(state: &AppState) -> Arc<dyn StagedRepository<Self>> {
                state.$field.clone()
            }

            async fn on_approve(state: &AppState, record: Self) -> Result<(), AppError> {
                apply_stock(state, &record.item, record.stock_delta()).await
            }
        }

        impl Submittable for $ty {
            type Submission = $submission;

            fn from_submission(
                submission: Self::Submission,
                actor: &AuthenticatedUser,
            ) -> Result<Self, AppError> {
                <$ty>::from_submission(submission, actor)
            }
        }
    };
}

asset_resource!(AssetPurchase, PurchaseSubmission, purchases);
asset_resource!(AssetIssue, IssueSubmission, issues);
asset_resource!(AssetReturn, ReturnSubmission, returns);
asset_resource!(AssetService, ServiceSubmission, services);
asset_resource!(AssetDisposal, DisposalSubmission, disposals);

/// `GET /api/assets/stock` — all stock entries, any logged-in user.
pub async fn list_stock_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<StockEntry>>, AppError> {
    Ok(Json(state.stock.list().await?))
}

fn asset_routes<T: Submittable>() -> Router<AppState> {
    staged_routes::<T>(post(submit::<T>).get(list_confirmed::<T>))
}

/// Routes nested under `/api/assets`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/purchases", asset_routes::<AssetPurchase>())
        .nest("/issues", asset_routes::<AssetIssue>())
        .nest("/returns", asset_routes::<AssetReturn>())
        .nest("/services", asset_routes::<AssetService>())
        .nest("/disposals", asset_routes::<AssetDisposal>())
        .route("/stock", get(list_stock_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::staged::approve;
    use crate::auth::models::Role;
    use crate::models::asset::fixtures::{chair, issue, keeper, purchase};
    use crate::models::asset::{DisposalSource, ReturnCondition};
    use crate::state::testing::memory_state;
    use axum::extract::Path;

    fn user(role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: format!("id-{role}"),
            username: role.to_string(),
            name: role.to_string(),
            role,
        }
    }

    async fn stock(state: &AppState) -> StockEntry {
        state.stock.find(&chair()).await.unwrap().unwrap()
    }

    async fn approve_purchase(state: &AppState, quantity: u32) {
        let record = purchase(quantity);
        state.purchases.insert_pending(&record).await.unwrap();
        approve::<AssetPurchase>(State(state.clone()), user(Role::AssetManager), Path(record.id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_purchase_approval_adds_stock() {
        let (state, _dir) = memory_state().await;
        approve_purchase(&state, 5).await;

        assert_eq!(stock(&state).await.in_stock, 5);
        assert_eq!(state.purchases.list_confirmed().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_issue_beyond_stock_conflicts_and_stays_pending() {
        let (state, _dir) = memory_state().await;
        approve_purchase(&state, 2).await;

        let record = issue(3);
        state.issues.insert_pending(&record).await.unwrap();
        let result = approve::<AssetIssue>(
            State(state.clone()),
            user(Role::AssetManager),
            Path(record.id.clone()),
        )
        .await;

        let Err(AppError::Conflict(msg)) = result else {
            panic!("expected conflict");
        };
        assert!(msg.contains("3 in stock needed, 2 available"), "{msg}");
        assert!(state.issues.find_pending(&record.id).await.unwrap().is_some());
        assert!(state.issues.list_confirmed().await.unwrap().is_empty());
        assert_eq!(stock(&state).await.in_stock, 2);
    }

    #[tokio::test]
    async fn test_issue_of_unknown_item_conflicts() {
        let (state, _dir) = memory_state().await;
        let record = issue(1);
        state.issues.insert_pending(&record).await.unwrap();

        let result =
            approve::<AssetIssue>(State(state), user(Role::AssetManager), Path(record.id)).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_full_asset_lifecycle_counters() {
        let (state, _dir) = memory_state().await;
        let manager = user(Role::AssetManager);
        approve_purchase(&state, 5).await;

        let issued = issue(3);
        state.issues.insert_pending(&issued).await.unwrap();
        approve::<AssetIssue>(State(state.clone()), manager.clone(), Path(issued.id))
            .await
            .unwrap();

        let returned = AssetReturn::from_submission(
            ReturnSubmission {
                item: chair(),
                quantity: 2,
                returned_by: "Library".to_string(),
                condition: ReturnCondition::ServiceRequired,
                remark: Some("broken wheel".to_string()),
            },
            &keeper(),
        )
        .unwrap();
        state.returns.insert_pending(&returned).await.unwrap();
        approve::<AssetReturn>(State(state.clone()), manager.clone(), Path(returned.id))
            .await
            .unwrap();

        let serviced = AssetService::from_submission(
            ServiceSubmission {
                item: chair(),
                quantity: 1,
                service_provider: "Chair Repairs".to_string(),
                service_cost: 300.0,
                description: None,
                service_date: chrono::NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            },
            &keeper(),
        )
        .unwrap();
        state.services.insert_pending(&serviced).await.unwrap();
        approve::<AssetService>(State(state.clone()), manager.clone(), Path(serviced.id))
            .await
            .unwrap();

        let disposal = AssetDisposal::from_submission(
            DisposalSubmission {
                item: chair(),
                quantity: 1,
                source: DisposalSource::Stock,
                method: "Auction".to_string(),
                disposal_value: 200.0,
                reason: "Obsolete".to_string(),
            },
            &keeper(),
        )
        .unwrap();
        state.disposals.insert_pending(&disposal).await.unwrap();

        let wrong_role =
            approve::<AssetDisposal>(State(state.clone()), manager, Path(disposal.id.clone()))
                .await;
        assert!(matches!(wrong_role, Err(AppError::Forbidden(_))));

        approve::<AssetDisposal>(
            State(state.clone()),
            user(Role::HeadOfOffice),
            Path(disposal.id),
        )
        .await
        .unwrap();

        let entry = stock(&state).await;
        assert_eq!(entry.in_stock, 5 - 3 + 1 - 1);
        assert_eq!(entry.issued, 1);
        assert_eq!(entry.under_service, 1);
        assert_eq!(entry.awaiting_disposal, 0);
        assert_eq!(entry.disposed, 1);
    }

    #[tokio::test]
    async fn test_storekeeper_cannot_approve() {
        let (state, _dir) = memory_state().await;
        let record = purchase(1);
        state.purchases.insert_pending(&record).await.unwrap();

        let result =
            approve::<AssetPurchase>(State(state.clone()), keeper(), Path(record.id)).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert!(state.stock.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stock_list() {
        let (state, _dir) = memory_state().await;
        approve_purchase(&state, 4).await;

        let Json(entries) = list_stock_handler(State(state), user(Role::Viewer)).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, chair().stock_key());
    }
}
