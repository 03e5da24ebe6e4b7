// src/services/attempts.rs

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    models::{
        attempt::{AnswerRecord, Attempt, AttemptStatus, Grading, Scoring, SubmittedAnswer},
        notification::Notification,
        paper::Paper,
        result::{ExamResult, ResultMetadata, ResultProjection},
        user::Actor,
    },
    services::{
        ExamError, notify_quietly,
        results,
        scoring::{self, PassRule},
        workflow::GradingEvent,
    },
    store::{Notifier, Storage},
};

/// Outcome of `start_attempt`.
#[derive(Debug)]
pub enum StartOutcome {
    Created(Attempt),
    /// The student already had an attempt in progress.
    Resumed(Attempt),
}

impl StartOutcome {
    pub fn attempt(&self) -> &Attempt {
        match self {
            StartOutcome::Created(a) | StartOutcome::Resumed(a) => a,
        }
    }
}

/// Outcome of `submit_attempt`. `result` is set when the attempt was fully auto-graded.
#[derive(Debug)]
pub struct Submission {
    pub attempt: Attempt,
    pub result: Option<ExamResult>,
}

/// Builds a fresh attempt with one blank answer per paper question.
pub fn new_attempt(paper: &Paper, student_id: Uuid, attempt_number: i32, now: DateTime<Utc>) -> Attempt {
    let answers: Vec<AnswerRecord> = paper
        .ordered_questions()
        .into_iter()
        .map(|q| AnswerRecord::blank(q.id, q.kind.question_type(), q.marks))
        .collect();

    let mut grading = Grading::default();
    scoring::refresh_counts(&mut grading, &answers);

    Attempt {
        id: Uuid::new_v4(),
        paper_id: paper.id,
        student_id,
        attempt_number,
        answers,
        status: AttemptStatus::InProgress,
        start_time: now,
        submit_time: None,
        time_spent: 0,
        scoring: Scoring {
            total_marks: paper.settings.total_marks,
            obtained_marks: 0.0,
            percentage: 0.0,
            is_passed: false,
        },
        grading,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

/// Starts (or resumes) the actor's attempt at a paper.
pub async fn start_attempt(
    store: &dyn Storage,
    paper_id: Uuid,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<StartOutcome, ExamError> {
    let student_id = actor.id;

    let paper = store
        .find_paper(paper_id)
        .await?
        .ok_or_else(|| ExamError::NotFound("Paper not found".to_string()))?;

    if !paper.is_assigned(student_id) {
        tracing::warn!(%student_id, %paper_id, "Student not assigned to paper");
        return Err(ExamError::Forbidden(
            "You are not assigned to this paper".to_string(),
        ));
    }

    if !paper.is_open_at(now) {
        tracing::warn!(%paper_id, %now, "Paper not active at this time");
        return Err(ExamError::OutOfWindow);
    }

    if let Some(existing) = store.find_in_progress(paper_id, student_id).await? {
        tracing::info!(attempt_id = %existing.id, "Resuming in-progress attempt");
        return Ok(StartOutcome::Resumed(existing));
    }

    let prior = store.count_attempts(paper_id, student_id).await?;
    if prior >= i64::from(paper.settings.max_attempts) {
        tracing::warn!(
            %student_id,
            %paper_id,
            prior,
            max = paper.settings.max_attempts,
            "Attempt limit reached"
        );
        return Err(ExamError::AttemptLimitExceeded);
    }

    let attempt_number = i32::try_from(prior + 1)
        .map_err(|_| ExamError::Validation("attempt number out of range".to_string()))?;
    let attempt = new_attempt(&paper, student_id, attempt_number, now);
    store.insert_attempt(&attempt).await?;

    tracing::info!(
        attempt_id = %attempt.id,
        %student_id,
        %paper_id,
        attempt_number,
        "Attempt started"
    );

    Ok(StartOutcome::Created(attempt))
}

/// Hands in the actor's in-progress attempt and auto-grades what it can.
pub async fn submit_attempt(
    store: &dyn Storage,
    notifier: &dyn Notifier,
    paper_id: Uuid,
    actor: &Actor,
    submitted: &[SubmittedAnswer],
    now: DateTime<Utc>,
) -> Result<Submission, ExamError> {
    let mut attempt = store
        .find_in_progress(paper_id, actor.id)
        .await?
        .ok_or_else(|| ExamError::NotFound("No in-progress attempt found".to_string()))?;

    let paper = store
        .find_paper(paper_id)
        .await?
        .ok_or_else(|| ExamError::NotFound("Paper not found".to_string()))?;

    for record in attempt.answers.iter_mut() {
        let Some(answer) = submitted.iter().find(|s| s.question_id == record.question_id) else {
            continue;
        };
        // Graded on the raw text; only the stored copy is trimmed.
        if let Some(question) = paper.question(record.question_id) {
            scoring::auto_grade(record, question, &answer.answer, now);
        }
        record.answer = answer.answer.trim().to_string();
    }

    attempt.scoring = scoring::score(
        &attempt.answers,
        paper.settings.total_marks,
        PassRule::PaperPassingMarks(paper.settings.passing_marks),
    );
    scoring::refresh_counts(&mut attempt.grading, &attempt.answers);
    attempt.status = attempt.status.apply(GradingEvent::Submitted {
        fully_auto_graded: attempt.is_fully_auto_graded(),
    })?;
    attempt.submit_time = Some(now);
    attempt.time_spent = scoring::time_spent_minutes(attempt.start_time, now);
    if attempt.status == AttemptStatus::AutoGraded {
        attempt.grading.graded_at = Some(now);
        attempt.grading.is_fully_graded = true;
    }

    let expected_version = attempt.version;
    attempt.version += 1;
    attempt.updated_at = now;
    store.update_attempt(&attempt, expected_version).await?;

    tracing::info!(
        attempt_id = %attempt.id,
        status = %attempt.status,
        obtained = attempt.scoring.obtained_marks,
        total = attempt.scoring.total_marks,
        "Attempt submitted"
    );

    if attempt.status != AttemptStatus::AutoGraded {
        notify_quietly(
            notifier,
            Notification::grading_pending(paper.created_by, &paper.title, paper.id, attempt.id),
        )
        .await;
        return Ok(Submission { attempt, result: None });
    }

    let projection = ResultProjection {
        attempt_id: attempt.id,
        student_id: attempt.student_id,
        paper_id: attempt.paper_id,
        total_marks: attempt.scoring.total_marks,
        obtained_marks: attempt.scoring.obtained_marks,
        percentage: attempt.scoring.percentage,
        is_passed: attempt.scoring.is_passed,
        feedback: results::AUTO_GRADED_FEEDBACK.to_string(),
        publish: Some(true),
        metadata: ResultMetadata {
            graded_by: None,
            graded_at: Some(now),
            remarks: results::AUTO_GRADED_REMARKS.to_string(),
        },
    };
    let result = results::project(store, &projection, now).await?;

    notify_quietly(
        notifier,
        Notification::result_published(attempt.student_id, attempt.paper_id, attempt.id, result.id),
    )
    .await;

    Ok(Submission {
        attempt,
        result: Some(result),
    })
}
