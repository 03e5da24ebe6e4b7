// src/handlers/results.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use crate::{
    error::AppError,
    handlers::{ApiJson, ApiQuery, parse_uuid},
    models::{result::PublishResultRequest, user::Actor},
    services::results,
    state::AppState,
    store::{Page, ResultStore},
};

/// Fetches one result. Students see only their own, and only once published.
pub async fn get_result(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(result_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result_id = parse_uuid(&result_id, "result id")?;

    let view = state
        .store
        .find_result_view(result_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Result not found".to_string()))?;

    if !actor.can_read_student(view.result.student_id) {
        return Err(AppError::Forbidden(
            "You can only view your own results".to_string(),
        ));
    }
    if !actor.is_staff() && !view.result.is_published {
        return Err(AppError::Forbidden(
            "Result has not been published yet".to_string(),
        ));
    }

    Ok(Json(json!({ "success": true, "result": view })))
}

pub async fn list_student_results(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(student_id): Path<String>,
    ApiQuery(page): ApiQuery<Page>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = parse_uuid(&student_id, "student id")?;
    if !actor.can_read_student(student_id) {
        return Err(AppError::Forbidden(
            "You can only view your own results".to_string(),
        ));
    }

    // Students only ever see published results.
    let results = state
        .store
        .list_results_by_student(student_id, !actor.is_staff(), page.normalized())
        .await?;

    Ok(Json(json!({
        "success": true,
        "count": results.len(),
        "results": results,
    })))
}

/// Class ranking for a paper, highest marks first.
pub async fn list_class_results(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
    ApiQuery(page): ApiQuery<Page>,
) -> Result<impl IntoResponse, AppError> {
    let paper_id = parse_uuid(&paper_id, "paper id")?;

    let results = state
        .store
        .list_results_by_paper(paper_id, page.normalized())
        .await?;

    Ok(Json(json!({
        "success": true,
        "count": results.len(),
        "results": results,
    })))
}

pub async fn publish_result(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(result_id): Path<String>,
    ApiJson(payload): ApiJson<PublishResultRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result_id = parse_uuid(&result_id, "result id")?;

    let result = results::publish_result(
        state.store.as_ref(),
        state.notifier.as_ref(),
        result_id,
        payload.is_published,
        &actor,
        Utc::now(),
    )
    .await?;

    let message = if result.is_published {
        "Result published successfully"
    } else {
        "Result unpublished successfully"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "result": result,
    })))
}
