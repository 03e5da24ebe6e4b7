// src/services/workflow.rs

use crate::{models::attempt::AttemptStatus, services::ExamError};

/// Things that move an attempt through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradingEvent {
    /// The student handed in; `fully_auto_graded` when every answer got a verdict.
    Submitted { fully_auto_graded: bool },
    /// A teacher entered marks.
    ManuallyGraded,
    /// The result was explicitly published.
    Published,
}

impl GradingEvent {
    fn action(self) -> &'static str {
        match self {
            GradingEvent::Submitted { .. } => "submit",
            GradingEvent::ManuallyGraded => "grade",
            GradingEvent::Published => "publish",
        }
    }
}

impl AttemptStatus {
    /// The status after `event`, or `InvalidState` if the transition is not allowed.
    ///
    /// ```text
    /// in_progress --submit--> submitted | auto_graded
    /// submitted | auto_graded | manually_graded --grade--> manually_graded
    /// completed --grade--> completed
    /// auto_graded | manually_graded | completed --publish--> completed
    /// ```
    pub fn apply(self, event: GradingEvent) -> Result<AttemptStatus, ExamError> {
        use AttemptStatus::*;

        match (self, event) {
            (InProgress, GradingEvent::Submitted { fully_auto_graded: true }) => Ok(AutoGraded),
            (InProgress, GradingEvent::Submitted { fully_auto_graded: false }) => Ok(Submitted),
            (Submitted | AutoGraded | ManuallyGraded, GradingEvent::ManuallyGraded) => {
                Ok(ManuallyGraded)
            }
            // Re-grading keeps the result published, so the attempt stays completed.
            (Completed, GradingEvent::ManuallyGraded) => Ok(Completed),
            (AutoGraded | ManuallyGraded | Completed, GradingEvent::Published) => Ok(Completed),
            (status, event) => Err(ExamError::InvalidState {
                status,
                action: event.action(),
            }),
        }
    }

    /// Whether the attempt has marks worth projecting into a result.
    pub fn is_graded(self) -> bool {
        matches!(
            self,
            AttemptStatus::AutoGraded | AttemptStatus::ManuallyGraded | AttemptStatus::Completed
        )
    }
}
