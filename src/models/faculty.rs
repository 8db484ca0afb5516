use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::record::{AuditTrail, Record, RecordKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacultyType {
    Internal,
    External,
    Contract,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub title: String,
    #[serde(default)]
    pub journal: Option<String>,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseHandled {
    pub course_name: String,
    #[serde(default)]
    pub batch: Option<String>,
    pub from: NaiveDate,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourAttended {
    pub name: String,
    pub location: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A remark on a faculty member's conduct, added through an approved update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConductEntry {
    pub date: NaiveDate,
    pub remark: String,
    pub recorded_by: String,
}

/// Fields of a faculty record as entered by staff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacultySubmission {
    pub name: String,
    pub faculty_type: FacultyType,
    pub designation: String,
    pub email: String,
    pub mobile: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub domain_knowledge: Vec<String>,
    #[serde(default)]
    pub area_of_specialization: Option<String>,
    /// Upload name returned by `POST /api/uploads`.
    #[serde(default)]
    pub photograph: Option<String>,
    #[serde(default)]
    pub publications: Vec<Publication>,
    #[serde(default)]
    pub courses_handled: Vec<CourseHandled>,
    #[serde(default)]
    pub tours_attended: Vec<TourAttended>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faculty {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub details: FacultySubmission,
    #[serde(default)]
    pub conduct: Vec<ConductEntry>,
    pub audit: AuditTrail,
}

impl Record for Faculty {
    const KIND: RecordKind = RecordKind::Faculty;

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
        format!("faculty record of '{}'", self.details.name)
    }
}

impl FacultySubmission {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("Faculty name cannot be empty".into()));
        }
        if self.designation.trim().is_empty() {
            return Err(AppError::BadRequest("Designation cannot be empty".into()));
        }
        if !self.email.contains('@') {
            return Err(AppError::BadRequest(format!(
                "Invalid email address '{}'",
                self.email
            )));
        }
        let mobile_valid = self.mobile.chars().all(|c| c.is_ascii_digit() || c == '+');
        if self.mobile.trim().is_empty() || !mobile_valid {
            return Err(AppError::BadRequest(format!(
                "Invalid mobile number '{}'",
                self.mobile
            )));
        }
        for tour in &self.tours_attended {
            if tour.end < tour.start {
                return Err(AppError::BadRequest(format!(
                    "Tour '{}' ends before it starts",
                    tour.name
                )));
            }
        }
        for course in &self.courses_handled {
            if matches!(course.to, Some(to) if to < course.from) {
                return Err(AppError::BadRequest(format!(
                    "Course '{}' ends before it starts",
                    course.course_name
                )));
            }
        }
        Ok(())
    }
}

/// Changes proposed against a confirmed faculty record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacultyChanges {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub publications: Vec<Publication>,
    #[serde(default)]
    pub courses_handled: Vec<CourseHandled>,
    #[serde(default)]
    pub tours_attended: Vec<TourAttended>,
    #[serde(default)]
    pub conduct_remark: Option<String>,
}

impl FacultyChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.mobile.is_none()
            && self.publications.is_empty()
            && self.courses_handled.is_empty()
            && self.tours_attended.is_empty()
            && self.conduct_remark.as_deref().is_none_or(|r| r.trim().is_empty())
    }
}

/// A pending conduct/profile update for a confirmed faculty member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacultyUpdate {
    #[serde(rename = "_id")]
    pub id: String,
    pub faculty_id: String,
    pub faculty_name: String,
    pub changes: FacultyChanges,
    pub audit: AuditTrail,
}

impl Record for FacultyUpdate {
    const KIND: RecordKind = RecordKind::FacultyUpdate;

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
        format!("update to the faculty record of '{}'", self.faculty_name)
    }
}

impl FacultyUpdate {
    /// Apply the approved changes. Arrays are appended, contacts replaced.
    pub fn apply_to(&self, faculty: &mut Faculty, approved_by: &str) {
        let changes = &self.changes;
        if let Some(email) = &changes.email {
            faculty.details.email = email.clone();
        }
        if let Some(mobile) = &changes.mobile {
            faculty.details.mobile = mobile.clone();
        }
        faculty
            .details
            .publications
            .extend(changes.publications.iter().cloned());
        faculty
            .details
            .courses_handled
            .extend(changes.courses_handled.iter().cloned());
        faculty
            .details
            .tours_attended
            .extend(changes.tours_attended.iter().cloned());
        if let Some(remark) = changes.conduct_remark.as_deref().map(str::trim) {
            if !remark.is_empty() {
                faculty.conduct.push(ConductEntry {
                    date: Utc::now().date_naive(),
                    remark: remark.to_string(),
                    recorded_by: approved_by.to_string(),
                });
            }
        }
    }
}

/// Query parameters of `GET /api/faculty`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FacultyFilter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub faculty_type: Option<FacultyType>,
}

impl FacultyFilter {
    pub fn matches(&self, faculty: &Faculty) -> bool {
        let name_ok = self.name.as_deref().is_none_or(|needle| {
            faculty
                .details
                .name
                .to_lowercase()
                .contains(&needle.to_lowercase())
        });
        let type_ok = self
            .faculty_type
            .is_none_or(|t| faculty.details.faculty_type == t);
        name_ok && type_ok
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn submission(name: &str) -> FacultySubmission {
        FacultySubmission {
            name: name.to_string(),
            faculty_type: FacultyType::Internal,
            designation: "Assistant Professor".to_string(),
            email: "faculty@casfos.example".to_string(),
            mobile: "+919876543210".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 5, 17),
            institution: Some("CASFOS Coimbatore".to_string()),
            domain_knowledge: vec!["Silviculture".to_string()],
            area_of_specialization: Some("Forest Ecology".to_string()),
            photograph: None,
            publications: vec![],
            courses_handled: vec![],
            tours_attended: vec![],
        }
    }

    pub fn faculty(name: &str) -> Faculty {
        Faculty {
            id: crate::models::record::new_record_id(),
            details: submission(name),
            conduct: vec![],
            audit: AuditTrail::submitted("entry1"),
        }
    }
}
