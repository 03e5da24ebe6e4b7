// src/services/results.rs

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    models::{
        attempt::{Attempt, AttemptStatus},
        notification::Notification,
        result::{ExamResult, ResultMetadata, ResultProjection},
        user::Actor,
    },
    services::{
        ExamError, notify_quietly,
        scoring::{self, GradingPolicy, PassRule},
        workflow::GradingEvent,
    },
    store::{Notifier, Storage, StoreResult},
};

pub const AUTO_GRADED_FEEDBACK: &str = "Auto-graded submission";
pub const AUTO_GRADED_REMARKS: &str = "Automatically graded";
pub const MANUAL_REMARKS: &str = "Graded manually";

/// Stored result feedback is capped at this many characters.
pub const MAX_FEEDBACK_CHARS: usize = 1000;

pub fn truncate_feedback(feedback: &str) -> String {
    feedback.chars().take(MAX_FEEDBACK_CHARS).collect()
}

/// The single write path for results: upsert keyed by attempt.
pub async fn project(
    store: &dyn Storage,
    projection: &ResultProjection,
    now: DateTime<Utc>,
) -> StoreResult<ExamResult> {
    let result = store.upsert_result(projection, now).await.inspect_err(|e| {
        tracing::error!(
            attempt_id = %projection.attempt_id,
            error = %e,
            "Failed to project result; attempt stays authoritative"
        );
    })?;

    tracing::info!(
        result_id = %result.id,
        attempt_id = %result.attempt_id,
        published = result.is_published,
        "Result projected"
    );
    Ok(result)
}

#[derive(Debug)]
pub struct Reconciliation {
    pub attempt: Attempt,
    /// Whether the attempt's scoring had drifted and was rewritten.
    pub repaired: bool,
    /// Present when the attempt is graded.
    pub result: Option<ExamResult>,
}

/// Recomputes an attempt's scoring from its answers and re-projects its result.
///
/// Repairs an attempt whose result write failed, or whose scoring block no
/// longer matches the answer sheet.
pub async fn reconcile(
    store: &dyn Storage,
    policy: &GradingPolicy,
    attempt_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Reconciliation, ExamError> {
    let mut attempt = store
        .find_attempt(attempt_id)
        .await?
        .ok_or_else(|| ExamError::NotFound("Attempt not found".to_string()))?;

    let rule = match attempt.status {
        AttemptStatus::AutoGraded | AttemptStatus::Submitted => {
            let paper = store
                .find_paper(attempt.paper_id)
                .await?
                .ok_or_else(|| ExamError::NotFound("Paper not found".to_string()))?;
            PassRule::PaperPassingMarks(paper.settings.passing_marks)
        }
        AttemptStatus::ManuallyGraded | AttemptStatus::Completed => policy.manual_rule(),
        AttemptStatus::InProgress => PassRule::PaperPassingMarks(None),
    };

    let recomputed = scoring::score(&attempt.answers, attempt.scoring.total_marks, rule);
    let repaired = attempt.status != AttemptStatus::InProgress && recomputed != attempt.scoring;
    if repaired {
        tracing::warn!(
            %attempt_id,
            stored = attempt.scoring.obtained_marks,
            recomputed = recomputed.obtained_marks,
            "Attempt scoring drifted, rewriting"
        );
        attempt.scoring = recomputed;
        scoring::refresh_counts(&mut attempt.grading, &attempt.answers);
        let expected_version = attempt.version;
        attempt.version += 1;
        attempt.updated_at = now;
        store.update_attempt(&attempt, expected_version).await?;
    }

    if !attempt.status.is_graded() {
        return Ok(Reconciliation {
            attempt,
            repaired,
            result: None,
        });
    }

    let existing = store.find_result_by_attempt(attempt.id).await?;
    let auto = attempt.status == AttemptStatus::AutoGraded;
    let feedback = match (&existing, auto) {
        (Some(r), _) => r.feedback.clone(),
        (None, true) => AUTO_GRADED_FEEDBACK.to_string(),
        (None, false) => truncate_feedback(
            &attempt
                .answers
                .iter()
                .filter_map(|a| a.feedback.as_deref())
                .filter(|f| !f.is_empty())
                .collect::<Vec<_>>()
                .join("; "),
        ),
    };

    let projection = ResultProjection {
        attempt_id: attempt.id,
        student_id: attempt.student_id,
        paper_id: attempt.paper_id,
        total_marks: attempt.scoring.total_marks,
        obtained_marks: attempt.scoring.obtained_marks,
        percentage: attempt.scoring.percentage,
        is_passed: attempt.scoring.is_passed,
        feedback,
        // A missing auto-graded result would have been published on creation.
        publish: if auto && existing.is_none() { Some(true) } else { None },
        metadata: ResultMetadata {
            graded_by: attempt.grading.graded_by,
            graded_at: attempt.grading.graded_at.or(Some(now)),
            remarks: if auto { AUTO_GRADED_REMARKS } else { MANUAL_REMARKS }.to_string(),
        },
    };
    let result = project(store, &projection, now).await?;

    Ok(Reconciliation {
        attempt,
        repaired,
        result: Some(result),
    })
}

/// Sets a result's visibility. Publishing also completes the attempt.
pub async fn publish_result(
    store: &dyn Storage,
    notifier: &dyn Notifier,
    result_id: Uuid,
    is_published: bool,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<ExamResult, ExamError> {
    let result = store
        .set_publication(result_id, is_published, actor.id, now)
        .await?
        .ok_or_else(|| ExamError::NotFound("Result not found".to_string()))?;

    tracing::info!(%result_id, is_published, by = %actor.id, "Result publication updated");

    if !is_published {
        return Ok(result);
    }

    if let Some(mut attempt) = store.find_attempt(result.attempt_id).await? {
        if attempt.status != AttemptStatus::Completed {
            attempt.status = attempt.status.apply(GradingEvent::Published)?;
            let expected_version = attempt.version;
            attempt.version += 1;
            attempt.updated_at = now;
            store.update_attempt(&attempt, expected_version).await?;
        }
    }

    notify_quietly(
        notifier,
        Notification::result_published(result.student_id, result.paper_id, result.attempt_id, result.id),
    )
    .await;

    Ok(result)
}
