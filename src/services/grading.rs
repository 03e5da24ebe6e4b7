// src/services/grading.rs

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    models::{
        attempt::Attempt,
        result::{ExamResult, ResultMetadata, ResultProjection},
        user::Actor,
    },
    services::{
        ExamError,
        results::{self, MANUAL_REMARKS},
        scoring::{self, GradingPolicy},
        workflow::GradingEvent,
    },
    store::Storage,
    utils::html::sanitize_feedback,
};

/// Teacher input for one question. `marks` is already numeric.
#[derive(Debug, Clone, PartialEq)]
pub struct GradedAnswer {
    pub question_id: Uuid,
    pub marks: f64,
    pub feedback: Option<String>,
}

#[derive(Debug)]
pub struct GradedAttempt {
    pub attempt: Attempt,
    pub result: ExamResult,
}

/// Applies teacher marks to an attempt, rescoring it and re-projecting its result.
///
/// Entries for questions the attempt does not contain are skipped. Marks outside
/// `[0, max_marks]` are rejected or clamped according to `policy.marks`; with
/// `Reject`, nothing is written when any entry is out of range.
pub async fn grade_attempt(
    store: &dyn Storage,
    policy: &GradingPolicy,
    attempt_id: Uuid,
    graded: &[GradedAnswer],
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<GradedAttempt, ExamError> {
    let mut attempt = store
        .find_attempt(attempt_id)
        .await?
        .ok_or_else(|| ExamError::NotFound("Attempt not found".to_string()))?;

    attempt.status = attempt.status.apply(GradingEvent::ManuallyGraded)?;

    let mut feedback_parts = Vec::new();
    for entry in graded {
        let Some(record) = attempt.answer_mut(entry.question_id) else {
            tracing::warn!(
                %attempt_id,
                question_id = %entry.question_id,
                "Graded question not found in attempt, skipping"
            );
            continue;
        };

        let marks = policy
            .marks
            .apply(entry.marks, record.max_marks)
            .map_err(|reason| {
                ExamError::Validation(format!("Question {}: {reason}", entry.question_id))
            })?;

        let feedback = entry
            .feedback
            .as_deref()
            .map(sanitize_feedback)
            .unwrap_or_default();
        if !feedback.is_empty() {
            feedback_parts.push(feedback.clone());
        }

        record.obtained_marks = marks;
        record.feedback = Some(feedback);
        record.auto_graded = false;
        record.graded_at = Some(now);
    }

    let total_marks = attempt.scoring.total_marks;
    attempt.scoring = scoring::score(&attempt.answers, total_marks, policy.manual_rule());
    scoring::refresh_counts(&mut attempt.grading, &attempt.answers);
    attempt.grading.graded_by = Some(actor.id);
    attempt.grading.graded_at = Some(now);
    attempt.grading.is_fully_graded = true;

    let expected_version = attempt.version;
    attempt.version += 1;
    attempt.updated_at = now;
    store.update_attempt(&attempt, expected_version).await?;

    tracing::info!(
        %attempt_id,
        grader = %actor.id,
        obtained = attempt.scoring.obtained_marks,
        total = total_marks,
        percentage = attempt.scoring.percentage,
        "Attempt graded manually"
    );

    let projection = ResultProjection {
        attempt_id: attempt.id,
        student_id: attempt.student_id,
        paper_id: attempt.paper_id,
        total_marks,
        obtained_marks: attempt.scoring.obtained_marks,
        percentage: attempt.scoring.percentage,
        is_passed: attempt.scoring.is_passed,
        feedback: results::truncate_feedback(&feedback_parts.join("; ")),
        publish: None,
        metadata: ResultMetadata {
            graded_by: Some(actor.id),
            graded_at: Some(now),
            remarks: MANUAL_REMARKS.to_string(),
        },
    };
    let result = results::project(store, &projection, now).await?;

    Ok(GradedAttempt { attempt, result })
}
