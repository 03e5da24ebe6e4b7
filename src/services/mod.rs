// src/services/mod.rs

//! The attempt lifecycle and grading pipeline.
//!
//! Every operation takes the acting user and the current time explicitly,
//! reads one attempt, mutates it in memory and writes it back as one unit.
//! Results are projected afterwards; a failed projection is repaired by the
//! next grading call or by `results::reconcile`.

pub mod attempts;
pub mod grading;
pub mod results;
pub mod scoring;
pub mod workflow;

use crate::{
    models::{attempt::AttemptStatus, notification::Notification},
    store::{Notifier, StoreError},
};

#[derive(Debug, thiserror::Error)]
pub enum ExamError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Paper is not active at this time")]
    OutOfWindow,
    #[error("You have reached the maximum number of attempts for this paper")]
    AttemptLimitExceeded,
    #[error("{0}")]
    Validation(String),
    #[error("Attempt is {status}; cannot {action}")]
    InvalidState {
        status: AttemptStatus,
        action: &'static str,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Delivers a notification without letting a failure reach the caller.
pub(crate) async fn notify_quietly(notifier: &dyn Notifier, notification: Notification) {
    let kind = notification.kind.as_str();
    let user_id = notification.user_id;
    if let Err(e) = notifier.notify(notification).await {
        tracing::warn!(%user_id, kind, error = %e, "Failed to deliver notification");
    }
}
