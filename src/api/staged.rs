//! Generic handlers shared by every workflow-managed record kind.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put, MethodRouter};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::models::AuthenticatedUser;
use crate::db::staged_repository::StagedRepository;
use crate::error::AppError;
use crate::models::record::{Record, RejectedRecord};
use crate::state::AppState;
use crate::workflow;

/// A record kind exposed over the API.
#[async_trait]
pub trait StagedResource: Record {
    /// Shape returned to clients.
    type View: Serialize + Send + From<Self>;

    fn repository(state: &AppState) -> Arc<dyn StagedRepository<Self>>;

    /// Whether `user` may list confirmed records of this kind.
    fn can_read_confirmed(_user: &AuthenticatedUser) -> bool {
        true
    }

    /// Runs once the record is in the confirmed collection. An error moves
    /// the record back to pending.
    async fn on_approve(_state: &AppState, _record: Self) -> Result<(), AppError> {
        Ok(())
    }
}

/// A record kind created from a JSON body by an authenticated submitter.
pub trait Submittable: StagedResource {
    type Submission: DeserializeOwned + Send + 'static;

    fn from_submission(
        submission: Self::Submission,
        actor: &AuthenticatedUser,
    ) -> Result<Self, AppError>;
}

/// Body of every reject endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default, alias = "rejectionRemarks")]
    pub remarks: String,
}

fn require_participant<T: Record>(user: &AuthenticatedUser, what: &str) -> Result<(), AppError> {
    user.require_any(
        &T::KIND.participant_roles(),
        &format!("view {} {} records", what, T::KIND.label()),
    )
}

/// `POST /` — submit a new record into the pending collection.
pub async fn submit<T: Submittable>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(submission): Json<T::Submission>,
) -> Result<(StatusCode, Json<T::View>), AppError> {
    user.require_any(T::KIND.submitter_roles(), &format!("submit a {}", T::KIND.label()))?;

    let record = T::from_submission(submission, &user)?;
    let record = workflow::submit(
        T::repository(&state).as_ref(),
        state.notifications.as_ref(),
        record,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// `GET /` — confirmed records.
pub async fn list_confirmed<T: StagedResource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<T::View>>, AppError> {
    if !T::can_read_confirmed(&user) {
        return Err(AppError::Forbidden(format!(
            "Role '{}' may not view confirmed {} records",
            user.role,
            T::KIND.label()
        )));
    }
    let records = T::repository(&state).list_confirmed().await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// `GET /pending`
pub async fn list_pending<T: StagedResource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<T::View>>, AppError> {
    require_participant::<T>(&user, "pending")?;
    let records = T::repository(&state).list_pending().await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// `GET /rejected`
pub async fn list_rejected<T: StagedResource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<RejectedRecord<T::View>>>, AppError> {
    require_participant::<T>(&user, "rejected")?;
    let records = T::repository(&state).list_rejected().await?;
    Ok(Json(
        records
            .into_iter()
            .map(|rejected| rejected.map(Into::into))
            .collect(),
    ))
}

/// `PUT /verify/{id}`
pub async fn verify<T: StagedResource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<T::View>, AppError> {
    let record = workflow::verify(
        T::repository(&state).as_ref(),
        state.notifications.as_ref(),
        &id,
        &user,
    )
    .await?;
    Ok(Json(record.into()))
}

/// `PUT /approve/{id}`
pub async fn approve<T: StagedResource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<T::View>, AppError> {
    let repository = T::repository(&state);
    let record = workflow::approve_with(
        repository.as_ref(),
        state.notifications.as_ref(),
        &id,
        &user,
        |record| T::on_approve(&state, record),
    )
    .await?;
    Ok(Json(record.into()))
}

/// `PUT /reject/{id}`
pub async fn reject<T: StagedResource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<RejectedRecord<T::View>>, AppError> {
    let rejected = workflow::reject(
        T::repository(&state).as_ref(),
        state.notifications.as_ref(),
        &id,
        &user,
        &req.remarks,
    )
    .await?;
    Ok(Json(rejected.map(Into::into)))
}

/// Routes for one record kind, to be nested under its base path.
///
/// `root` serves the base path itself (typically submit and the confirmed list).
pub fn staged_routes<T: StagedResource>(root: MethodRouter<AppState>) -> Router<AppState> {
    let router = Router::new()
        .route("/", root)
        .route("/pending", get(list_pending::<T>))
        .route("/rejected", get(list_rejected::<T>))
        .route("/approve/{id}", put(approve::<T>))
        .route("/reject/{id}", put(reject::<T>));

    if T::KIND.requires_verification() {
        router.route("/verify/{id}", put(verify::<T>))
    } else {
        router
    }
}
