// src/models/paper.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Question type tag as stored on answer sheets ("mcq", "short", "essay").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Mcq,
    Short,
    Essay,
}

/// How a question of a given type gets its marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradingMode {
    /// Scored at submission time by comparing against the answer key.
    Auto,
    /// Left pending until a teacher grades it.
    ManualReview,
}

impl QuestionType {
    pub fn grading_mode(self) -> GradingMode {
        match self {
            QuestionType::Mcq => GradingMode::Auto,
            QuestionType::Short | QuestionType::Essay => GradingMode::ManualReview,
        }
    }
}

/// Type-specific part of a question.
/// Only objective-choice questions carry an answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuestionKind {
    Mcq {
        #[serde(default)]
        options: Vec<String>,
        #[serde(rename = "correctAnswer")]
        correct_answer: String,
    },
    Short,
    Essay,
}

impl QuestionKind {
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionKind::Mcq { .. } => QuestionType::Mcq,
            QuestionKind::Short => QuestionType::Short,
            QuestionKind::Essay => QuestionType::Essay,
        }
    }

    /// Checks an answer against the key.
    /// Returns `None` for question types that need manual review.
    pub fn auto_grade(&self, answer: &str) -> Option<bool> {
        match self {
            QuestionKind::Mcq { correct_answer, .. } => Some(answer == correct_answer),
            QuestionKind::Short | QuestionKind::Essay => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,

    /// The question text shown to students.
    pub question: String,

    #[serde(flatten)]
    pub kind: QuestionKind,

    /// Positive, fractional marks allowed (e.g. 0.5).
    pub marks: f64,

    /// 1-based display order.
    pub order: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperSettings {
    /// Minutes.
    pub time_limit: i32,
    pub total_marks: f64,
    pub passing_marks: Option<f64>,
    pub max_attempts: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_published: bool,
}

/// An exam definition as served by the paper catalog.
/// Read-only to the grading core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub id: Uuid,
    pub title: String,
    pub subject: String,
    pub created_by: Uuid,
    pub questions: Vec<Question>,
    pub settings: PaperSettings,
    pub assigned_to: Vec<Uuid>,
}

impl Paper {
    pub fn is_assigned(&self, student_id: Uuid) -> bool {
        self.assigned_to.contains(&student_id)
    }

    /// Both ends of the window are inclusive.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.settings.start_time && now <= self.settings.end_time
    }

    pub fn question(&self, id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Questions sorted by their `order` field.
    pub fn ordered_questions(&self) -> Vec<&Question> {
        let mut questions: Vec<&Question> = self.questions.iter().collect();
        questions.sort_by_key(|q| q.order);
        questions
    }
}

/// Paper fields joined onto attempt and result listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSummary {
    pub id: Uuid,
    pub title: String,
    pub subject: String,
}
