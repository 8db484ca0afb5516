use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::api::staged::{
    list_confirmed, reject, staged_routes, submit, StagedResource, Submittable,
};
use crate::auth::models::AuthenticatedUser;
use crate::db::staged_repository::StagedRepository;
use crate::error::AppError;
use crate::models::faculty::{
    Faculty, FacultyChanges, FacultyFilter, FacultySubmission, FacultyUpdate,
};
use crate::models::record::{new_record_id, AuditTrail, Record, RecordKind};
use crate::state::AppState;
use crate::workflow;

#[async_trait]
impl StagedResource for Faculty {
    type View = Faculty;

    fn repository(state: &AppState) -> Arc<dyn StagedRepository<Self>> {
        state.faculty.clone()
    }
}

impl Submittable for Faculty {
    type Submission = FacultySubmission;

    fn from_submission(
        submission: FacultySubmission,
        actor: &AuthenticatedUser,
    ) -> Result<Self, AppError> {
        submission.validate()?;
        Ok(Faculty {
            id: new_record_id(),
            details: submission,
            conduct: vec![],
            audit: AuditTrail::submitted(&actor.username),
        })
    }
}

#[async_trait]
impl StagedResource for FacultyUpdate {
    type View = FacultyUpdate;

    fn repository(state: &AppState) -> Arc<dyn StagedRepository<Self>> {
        state.faculty_updates.clone()
    }

    /// Apply the approved changes to the confirmed faculty record.
    async fn on_approve(state: &AppState, update: Self) -> Result<(), AppError> {
        let mut faculty = state
            .faculty
            .find_confirmed(&update.faculty_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Confirmed faculty record '{}' not found",
                    update.faculty_id
                ))
            })?;

        let approved_by = update
            .audit()
            .approved_by
            .clone()
            .unwrap_or_else(|| update.audit().submitted_by.clone());
        update.apply_to(&mut faculty, &approved_by);
        state.faculty.upsert_confirmed(&faculty).await?;

        tracing::info!(faculty_id = %faculty.id, update_id = %update.id, "Faculty record updated");
        Ok(())
    }
}

/// `GET /api/faculty` — confirmed faculty, optionally filtered by `name` and `faculty_type`.
pub async fn list_faculty_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(filter): Query<FacultyFilter>,
) -> Result<Json<Vec<Faculty>>, AppError> {
    let mut records: Vec<Faculty> = state
        .faculty
        .list_confirmed()
        .await?
        .into_iter()
        .filter(|faculty| filter.matches(faculty))
        .collect();
    records.sort_by(|a, b| a.details.name.to_lowercase().cmp(&b.details.name.to_lowercase()));
    Ok(Json(records))
}

/// `GET /api/faculty/{id}` — one confirmed record.
pub async fn get_faculty_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<Faculty>, AppError> {
    state
        .faculty
        .find_confirmed(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Faculty record '{id}' not found")))
}

fn validate_changes(changes: &FacultyChanges) -> Result<(), AppError> {
    if changes.is_empty() {
        return Err(AppError::BadRequest("An update must change something".into()));
    }
    if let Some(email) = &changes.email {
        if !email.contains('@') {
            return Err(AppError::BadRequest(format!("Invalid email address '{email}'")));
        }
    }
    if let Some(mobile) = &changes.mobile {
        if mobile.trim().is_empty() || !mobile.chars().all(|c| c.is_ascii_digit() || c == '+') {
            return Err(AppError::BadRequest(format!("Invalid mobile number '{mobile}'")));
        }
    }
    if changes.tours_attended.iter().any(|tour| tour.end < tour.start) {
        return Err(AppError::BadRequest("A tour ends before it starts".into()));
    }
    if changes
        .courses_handled
        .iter()
        .any(|course| matches!(course.to, Some(to) if to < course.from))
    {
        return Err(AppError::BadRequest("A course ends before it starts".into()));
    }
    Ok(())
}

/// `POST /api/faculty/{id}/updates` — propose changes to a confirmed record.
pub async fn submit_update_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(faculty_id): Path<String>,
    Json(changes): Json<FacultyChanges>,
) -> Result<(StatusCode, Json<FacultyUpdate>), AppError> {
    let kind = RecordKind::FacultyUpdate;
    user.require_any(kind.submitter_roles(), &format!("submit a {}", kind.label()))?;
    validate_changes(&changes)?;

    let faculty = state
        .faculty
        .find_confirmed(&faculty_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Faculty record '{faculty_id}' not found")))?;

    let update = FacultyUpdate {
        id: new_record_id(),
        faculty_id: faculty.id,
        faculty_name: faculty.details.name,
        changes,
        audit: AuditTrail::submitted(&user.username),
    };

    let update = workflow::submit(
        state.faculty_updates.as_ref(),
        state.notifications.as_ref(),
        update,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(update)))
}

/// Routes nested under `/api/faculty`.
pub fn routes() -> Router<AppState> {
    staged_routes::<Faculty>(post(submit::<Faculty>).get(list_faculty_handler))
        .route("/rejectFacultyApproval/{id}", put(reject::<Faculty>))
        .route("/{id}", get(get_faculty_handler))
        .route("/{id}/updates", post(submit_update_handler))
}

/// Routes nested under `/api/faculty-updates`.
pub fn update_routes() -> Router<AppState> {
    staged_routes::<FacultyUpdate>(get(list_confirmed::<FacultyUpdate>))
}
