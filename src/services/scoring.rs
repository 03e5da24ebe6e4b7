// src/services/scoring.rs

use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::models::{
    attempt::{AnswerRecord, Grading, Scoring},
    paper::Question,
};

pub const DEFAULT_MANUAL_PASS_PERCENTAGE: f64 = 50.0;

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `obtained / total * 100`, rounded to two places. A non-positive total yields 0.
pub fn percentage(obtained: f64, total: f64) -> f64 {
    if total > 0.0 {
        round2(obtained / total * 100.0)
    } else {
        0.0
    }
}

pub fn obtained_marks(answers: &[AnswerRecord]) -> f64 {
    answers.iter().map(|a| a.obtained_marks).sum()
}

/// Whole minutes between start and submit, never negative.
pub fn time_spent_minutes(start: DateTime<Utc>, submit: DateTime<Utc>) -> i64 {
    let millis = (submit - start).num_milliseconds() as f64;
    (millis / 60_000.0).round().max(0.0) as i64
}

/// How `is_passed` is decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassRule {
    /// Auto-grading: the paper's passing marks, or always pass when unset.
    PaperPassingMarks(Option<f64>),
    /// Manual grading: a fixed percentage threshold.
    MinimumPercentage(f64),
}

impl PassRule {
    pub fn is_passed(self, obtained: f64, percentage: f64) -> bool {
        match self {
            PassRule::PaperPassingMarks(Some(passing)) => obtained >= passing,
            PassRule::PaperPassingMarks(None) => true,
            PassRule::MinimumPercentage(threshold) => percentage >= threshold,
        }
    }
}

/// Recomputes the scoring block from the answer sheet.
pub fn score(answers: &[AnswerRecord], total_marks: f64, rule: PassRule) -> Scoring {
    let obtained = obtained_marks(answers);
    let percentage = percentage(obtained, total_marks);
    Scoring {
        total_marks,
        obtained_marks: obtained,
        percentage,
        is_passed: rule.is_passed(obtained, percentage),
    }
}

/// Grades one answer against its question if the question type allows it.
/// `submitted` is the raw text as sent; it must equal the key exactly.
/// Returns whether the answer was auto-graded.
pub fn auto_grade(
    record: &mut AnswerRecord,
    question: &Question,
    submitted: &str,
    now: DateTime<Utc>,
) -> bool {
    let Some(correct) = question.kind.auto_grade(submitted) else {
        return false;
    };
    record.is_correct = Some(correct);
    record.obtained_marks = if correct { question.marks } else { 0.0 };
    record.auto_graded = true;
    record.graded_at = Some(now);
    true
}

/// Refreshes the per-question counters of the grading block.
pub fn refresh_counts(grading: &mut Grading, answers: &[AnswerRecord]) {
    let mut auto = 0;
    let mut manual = 0;
    let mut pending = 0;
    for answer in answers {
        match (answer.auto_graded, answer.graded_at) {
            (true, Some(_)) => auto += 1,
            (false, Some(_)) => manual += 1,
            (_, None) => pending += 1,
        }
    }
    grading.auto_graded_questions = auto;
    grading.manually_graded_questions = manual;
    grading.pending_grading_questions = pending;
}

/// What to do with teacher marks outside `[0, max_marks]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarksPolicy {
    Reject,
    Clamp,
}

impl FromStr for MarksPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(MarksPolicy::Reject),
            "clamp" => Ok(MarksPolicy::Clamp),
            other => Err(format!("unknown marks policy '{other}'")),
        }
    }
}

impl MarksPolicy {
    pub fn apply(self, marks: f64, max_marks: f64) -> Result<f64, String> {
        if !marks.is_finite() {
            return Err("marks must be a finite number".to_string());
        }
        match self {
            MarksPolicy::Clamp => Ok(marks.clamp(0.0, max_marks)),
            MarksPolicy::Reject if marks < 0.0 || marks > max_marks => Err(format!(
                "marks {marks} outside the allowed range 0..={max_marks}"
            )),
            MarksPolicy::Reject => Ok(marks),
        }
    }
}

/// Knobs for manual grading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradingPolicy {
    pub manual_pass_percentage: f64,
    pub marks: MarksPolicy,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            manual_pass_percentage: DEFAULT_MANUAL_PASS_PERCENTAGE,
            marks: MarksPolicy::Reject,
        }
    }
}

impl GradingPolicy {
    pub fn manual_rule(&self) -> PassRule {
        PassRule::MinimumPercentage(self.manual_pass_percentage)
    }
}
