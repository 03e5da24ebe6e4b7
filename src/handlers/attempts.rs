// src/handlers/attempts.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::{ApiJson, ApiQuery, parse_uuid},
    models::{
        attempt::{GradeAttemptRequest, SubmitAttemptRequest},
        user::Actor,
    },
    services::{
        attempts::{self, StartOutcome},
        grading::{self, GradedAnswer},
        results,
    },
    state::AppState,
    store::{AttemptStore, Page},
};

/// Starts a new attempt, or hands back the one already in progress.
///
/// * 201 with the fresh attempt when one was created.
/// * 200 with the existing attempt when the student resumes.
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(paper_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let paper_id = parse_uuid(&paper_id, "paper id")?;

    let outcome = attempts::start_attempt(state.store.as_ref(), paper_id, &actor, Utc::now()).await?;

    let (status, message) = match &outcome {
        StartOutcome::Created(_) => (StatusCode::CREATED, "Attempt started"),
        StartOutcome::Resumed(_) => (StatusCode::OK, "Resuming attempt in progress"),
    };

    Ok((
        status,
        Json(json!({
            "success": true,
            "message": message,
            "attempt": outcome.attempt(),
        })),
    ))
}

pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(paper_id): Path<String>,
    ApiJson(payload): ApiJson<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let paper_id = parse_uuid(&paper_id, "paper id")?;
    payload.validate()?;

    let submission = attempts::submit_attempt(
        state.store.as_ref(),
        state.notifier.as_ref(),
        paper_id,
        &actor,
        &payload.answers,
        Utc::now(),
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Attempt submitted successfully",
        "attempt": submission.attempt,
        "result": submission.result,
    })))
}

/// Applies teacher marks to an attempt.
///
/// `marksObtained` may be a number or a numeric string; anything else is a 400.
pub async fn grade_attempt(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(attempt_id): Path<String>,
    ApiJson(payload): ApiJson<GradeAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt_id = parse_uuid(&attempt_id, "attempt id")?;
    payload.validate()?;

    let graded = payload
        .graded_answers
        .iter()
        .map(|entry| {
            let marks = entry.marks_obtained.to_f64().ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Question {}: marksObtained must be a number",
                    entry.question_id
                ))
            })?;
            Ok(GradedAnswer {
                question_id: entry.question_id,
                marks,
                feedback: entry.feedback.clone(),
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let outcome = grading::grade_attempt(
        state.store.as_ref(),
        &state.config.grading,
        attempt_id,
        &graded,
        &actor,
        Utc::now(),
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Attempt graded successfully",
        "attempt": outcome.attempt,
        "result": outcome.result,
    })))
}

pub async fn list_paper_attempts(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
    ApiQuery(page): ApiQuery<Page>,
) -> Result<impl IntoResponse, AppError> {
    let paper_id = parse_uuid(&paper_id, "paper id")?;

    let attempts = state
        .store
        .list_attempts_by_paper(paper_id, page.normalized())
        .await?;

    Ok(Json(json!({
        "success": true,
        "count": attempts.len(),
        "attempts": attempts,
    })))
}

pub async fn list_student_attempts(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(student_id): Path<String>,
    ApiQuery(page): ApiQuery<Page>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = parse_uuid(&student_id, "student id")?;
    if !actor.can_read_student(student_id) {
        return Err(AppError::Forbidden(
            "You can only view your own attempts".to_string(),
        ));
    }

    let attempts = state
        .store
        .list_attempts_by_student(student_id, page.normalized())
        .await?;

    Ok(Json(json!({
        "success": true,
        "count": attempts.len(),
        "attempts": attempts,
    })))
}

pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let attempt_id = parse_uuid(&attempt_id, "attempt id")?;

    let view = state
        .store
        .find_attempt_view(attempt_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    if !actor.can_read_student(view.attempt.student_id) {
        return Err(AppError::Forbidden(
            "You can only view your own attempts".to_string(),
        ));
    }

    Ok(Json(json!({ "success": true, "attempt": view })))
}

/// Recomputes an attempt's scoring and re-projects its result.
pub async fn reconcile_attempt(
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let attempt_id = parse_uuid(&attempt_id, "attempt id")?;

    let outcome = results::reconcile(
        state.store.as_ref(),
        &state.config.grading,
        attempt_id,
        Utc::now(),
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "repaired": outcome.repaired,
        "attempt": outcome.attempt,
        "result": outcome.result,
    })))
}
