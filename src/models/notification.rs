// src/models/notification.rs

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ResultPublished,
    GradingPending,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::ResultPublished => "result_published",
            NotificationKind::GradingPending => "grading_pending",
        }
    }
}

/// An inbox message handed to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub paper_id: Option<Uuid>,
    pub attempt_id: Option<Uuid>,
    pub result_id: Option<Uuid>,
}

impl Notification {
    pub fn result_published(student_id: Uuid, paper_id: Uuid, attempt_id: Uuid, result_id: Uuid) -> Self {
        Self {
            user_id: student_id,
            kind: NotificationKind::ResultPublished,
            title: "Result published".to_string(),
            message: "Your result is now available.".to_string(),
            paper_id: Some(paper_id),
            attempt_id: Some(attempt_id),
            result_id: Some(result_id),
        }
    }

    pub fn grading_pending(teacher_id: Uuid, paper_title: &str, paper_id: Uuid, attempt_id: Uuid) -> Self {
        Self {
            user_id: teacher_id,
            kind: NotificationKind::GradingPending,
            title: "Submission awaiting grading".to_string(),
            message: format!("A submission for '{paper_title}' needs manual grading."),
            paper_id: Some(paper_id),
            attempt_id: Some(attempt_id),
            result_id: None,
        }
    }
}
