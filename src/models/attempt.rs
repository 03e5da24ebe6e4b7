// src/models/attempt.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    paper::{PaperSummary, QuestionType},
    user::UserSummary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    AutoGraded,
    ManuallyGraded,
    Completed,
}

impl AttemptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::AutoGraded => "auto_graded",
            AttemptStatus::ManuallyGraded => "manually_graded",
            AttemptStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(AttemptStatus::InProgress),
            "submitted" => Ok(AttemptStatus::Submitted),
            "auto_graded" => Ok(AttemptStatus::AutoGraded),
            "manually_graded" => Ok(AttemptStatus::ManuallyGraded),
            "completed" => Ok(AttemptStatus::Completed),
            other => Err(format!("unknown attempt status '{other}'")),
        }
    }
}

/// One slot of the answer sheet.
/// `question_type` and `max_marks` are snapshots taken when the attempt starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: Uuid,
    pub question_type: QuestionType,
    pub answer: String,
    /// `None` until graded.
    pub is_correct: Option<bool>,
    pub obtained_marks: f64,
    pub max_marks: f64,
    pub feedback: Option<String>,
    pub auto_graded: bool,
    pub graded_at: Option<DateTime<Utc>>,
}

impl AnswerRecord {
    pub fn blank(question_id: Uuid, question_type: QuestionType, max_marks: f64) -> Self {
        Self {
            question_id,
            question_type,
            answer: String::new(),
            is_correct: None,
            obtained_marks: 0.0,
            max_marks,
            feedback: None,
            auto_graded: false,
            graded_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scoring {
    pub total_marks: f64,
    pub obtained_marks: f64,
    pub percentage: f64,
    pub is_passed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grading {
    pub auto_graded_questions: i32,
    pub manually_graded_questions: i32,
    pub pending_grading_questions: i32,
    pub graded_by: Option<Uuid>,
    pub graded_at: Option<DateTime<Utc>>,
    pub is_fully_graded: bool,
}

/// A single student's run at a paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: Uuid,
    pub paper_id: Uuid,
    pub student_id: Uuid,
    pub attempt_number: i32,
    pub answers: Vec<AnswerRecord>,
    pub status: AttemptStatus,
    pub start_time: DateTime<Utc>,
    pub submit_time: Option<DateTime<Utc>>,
    /// Whole minutes between start and submit.
    pub time_spent: i64,
    pub scoring: Scoring,
    pub grading: Grading,
    /// Bumped on every write; used for optimistic concurrency.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attempt {
    pub fn answer_mut(&mut self, question_id: Uuid) -> Option<&mut AnswerRecord> {
        self.answers.iter_mut().find(|a| a.question_id == question_id)
    }

    /// True once every answer has a correctness verdict.
    pub fn is_fully_auto_graded(&self) -> bool {
        self.answers.iter().all(|a| a.is_correct.is_some())
    }
}

/// Attempt with its foreign keys expanded, as returned by listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptView {
    #[serde(flatten)]
    pub attempt: Attempt,
    pub student: Option<UserSummary>,
    pub paper: Option<PaperSummary>,
}

/// DTO for one submitted answer.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: Uuid,
    #[serde(default)]
    #[validate(length(max = 20000, message = "Answer cannot exceed 20000 characters"))]
    pub answer: String,
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    #[validate(nested)]
    pub answers: Vec<SubmittedAnswer>,
}

/// Marks may arrive as a JSON number or a numeric string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarksInput {
    Number(f64),
    Text(String),
}

impl MarksInput {
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            MarksInput::Number(n) => Some(*n),
            MarksInput::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

/// DTO for one teacher-graded answer.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswerRequest {
    pub question_id: Uuid,
    pub marks_obtained: MarksInput,
    #[validate(length(max = 1000, message = "Feedback cannot exceed 1000 characters"))]
    pub feedback: Option<String>,
}

/// DTO for manual grading.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GradeAttemptRequest {
    #[validate(length(min = 1, message = "At least one graded answer is required"), nested)]
    pub graded_answers: Vec<GradedAnswerRequest>,
}
