// src/models/result.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{paper::PaperSummary, user::UserSummary};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    /// `None` for automatically graded results.
    pub graded_by: Option<Uuid>,
    pub graded_at: Option<DateTime<Utc>>,
    pub remarks: String,
}

/// The student-facing scorecard for one attempt.
/// At most one exists per attempt; it is only ever upserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub student_id: Uuid,
    pub paper_id: Uuid,
    pub total_marks: f64,
    pub obtained_marks: f64,
    pub percentage: f64,
    pub is_passed: bool,
    pub feedback: String,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub metadata: ResultMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input of the result upsert.
///
/// Score, feedback and metadata fields replace whatever is stored.
/// `publish: None` keeps the stored publication state (unpublished for a new result).
#[derive(Debug, Clone, PartialEq)]
pub struct ResultProjection {
    pub attempt_id: Uuid,
    pub student_id: Uuid,
    pub paper_id: Uuid,
    pub total_marks: f64,
    pub obtained_marks: f64,
    pub percentage: f64,
    pub is_passed: bool,
    pub feedback: String,
    pub publish: Option<bool>,
    pub metadata: ResultMetadata,
}

impl ResultProjection {
    /// Applies the projection onto an existing result, or builds a new one.
    pub fn apply(&self, existing: Option<&ExamResult>, now: DateTime<Utc>) -> ExamResult {
        let (id, created_at, stored_publication) = match existing {
            Some(r) => (r.id, r.created_at, (r.is_published, r.published_at)),
            None => (Uuid::new_v4(), now, (false, None)),
        };

        let (is_published, published_at) = match self.publish {
            Some(true) => (true, Some(now)),
            Some(false) => (false, None),
            None => stored_publication,
        };

        ExamResult {
            id,
            attempt_id: self.attempt_id,
            student_id: self.student_id,
            paper_id: self.paper_id,
            total_marks: self.total_marks,
            obtained_marks: self.obtained_marks,
            percentage: self.percentage,
            is_passed: self.is_passed,
            feedback: self.feedback.clone(),
            is_published,
            published_at,
            metadata: self.metadata.clone(),
            created_at,
            updated_at: now,
        }
    }
}

/// Result with student and paper expanded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    #[serde(flatten)]
    pub result: ExamResult,
    pub student: Option<UserSummary>,
    pub paper: Option<PaperSummary>,
}

/// DTO for toggling result visibility.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResultRequest {
    pub is_published: bool,
}
