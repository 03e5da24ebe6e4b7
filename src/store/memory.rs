// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    models::{
        attempt::{Attempt, AttemptStatus, AttemptView},
        notification::Notification,
        paper::{Paper, PaperSummary},
        result::{ExamResult, ResultProjection, ResultView},
        user::UserSummary,
    },
    store::{AttemptStore, Notifier, Page, PaperCatalog, ResultStore, StoreError, StoreResult},
};

/// Process-local store used by tests and `DATABASE_URL=memory` runs.
///
/// No two locks are held at the same time.
#[derive(Default)]
pub struct MemoryStore {
    papers: RwLock<HashMap<Uuid, Paper>>,
    users: RwLock<HashMap<Uuid, UserSummary>>,
    attempts: RwLock<HashMap<Uuid, Attempt>>,
    results: RwLock<HashMap<Uuid, ExamResult>>,
    notifications: RwLock<Vec<Notification>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stands in for the external paper authoring service.
    pub async fn insert_paper(&self, paper: Paper) {
        self.papers.write().await.insert(paper.id, paper);
    }

    /// Stands in for the external user directory.
    pub async fn insert_user(&self, user: UserSummary) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }

    pub async fn result_count(&self) -> usize {
        self.results.read().await.len()
    }

    async fn paper_summary(&self, id: Uuid) -> Option<PaperSummary> {
        self.papers.read().await.get(&id).map(|p| PaperSummary {
            id: p.id,
            title: p.title.clone(),
            subject: p.subject.clone(),
        })
    }

    async fn user_summary(&self, id: Uuid) -> Option<UserSummary> {
        self.users.read().await.get(&id).cloned()
    }

    async fn expand_attempt(&self, attempt: Attempt) -> AttemptView {
        AttemptView {
            student: self.user_summary(attempt.student_id).await,
            paper: self.paper_summary(attempt.paper_id).await,
            attempt,
        }
    }

    async fn expand_result(&self, result: ExamResult) -> ResultView {
        ResultView {
            student: self.user_summary(result.student_id).await,
            paper: self.paper_summary(result.paper_id).await,
            result,
        }
    }
}

fn paginate<T>(items: Vec<T>, page: Page) -> Vec<T> {
    let page = page.normalized();
    items
        .into_iter()
        .skip(page.skip as usize)
        .take(page.limit as usize)
        .collect()
}

#[async_trait]
impl PaperCatalog for MemoryStore {
    async fn find_paper(&self, id: Uuid) -> StoreResult<Option<Paper>> {
        Ok(self.papers.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn count_attempts(&self, paper_id: Uuid, student_id: Uuid) -> StoreResult<i64> {
        let attempts = self.attempts.read().await;
        let count = attempts
            .values()
            .filter(|a| a.paper_id == paper_id && a.student_id == student_id)
            .count();
        Ok(count as i64)
    }

    async fn find_attempt(&self, id: Uuid) -> StoreResult<Option<Attempt>> {
        Ok(self.attempts.read().await.get(&id).cloned())
    }

    async fn find_in_progress(&self, paper_id: Uuid, student_id: Uuid) -> StoreResult<Option<Attempt>> {
        let attempts = self.attempts.read().await;
        Ok(attempts
            .values()
            .filter(|a| {
                a.paper_id == paper_id
                    && a.student_id == student_id
                    && a.status == AttemptStatus::InProgress
            })
            .min_by_key(|a| a.attempt_number)
            .cloned())
    }

    async fn insert_attempt(&self, attempt: &Attempt) -> StoreResult<()> {
        let mut attempts = self.attempts.write().await;
        let taken = attempts.values().any(|a| {
            a.paper_id == attempt.paper_id
                && a.student_id == attempt.student_id
                && a.attempt_number == attempt.attempt_number
        });
        if taken || attempts.contains_key(&attempt.id) {
            return Err(StoreError::Conflict(format!(
                "attempt {} already exists for this student and paper",
                attempt.attempt_number
            )));
        }
        attempts.insert(attempt.id, attempt.clone());
        Ok(())
    }

    async fn update_attempt(&self, attempt: &Attempt, expected_version: i64) -> StoreResult<()> {
        let mut attempts = self.attempts.write().await;
        match attempts.get_mut(&attempt.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = attempt.clone();
                Ok(())
            }
            Some(_) => Err(StoreError::Conflict(
                "attempt was modified concurrently".to_string(),
            )),
            None => Err(StoreError::Conflict("attempt no longer exists".to_string())),
        }
    }

    async fn find_attempt_view(&self, id: Uuid) -> StoreResult<Option<AttemptView>> {
        let attempt = self.attempts.read().await.get(&id).cloned();
        match attempt {
            Some(attempt) => Ok(Some(self.expand_attempt(attempt).await)),
            None => Ok(None),
        }
    }

    async fn list_attempts_by_paper(&self, paper_id: Uuid, page: Page) -> StoreResult<Vec<AttemptView>> {
        let mut matching: Vec<Attempt> = self
            .attempts
            .read()
            .await
            .values()
            .filter(|a| a.paper_id == paper_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut views = Vec::new();
        for attempt in paginate(matching, page) {
            views.push(self.expand_attempt(attempt).await);
        }
        Ok(views)
    }

    async fn list_attempts_by_student(&self, student_id: Uuid, page: Page) -> StoreResult<Vec<AttemptView>> {
        let mut matching: Vec<Attempt> = self
            .attempts
            .read()
            .await
            .values()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut views = Vec::new();
        for attempt in paginate(matching, page) {
            views.push(self.expand_attempt(attempt).await);
        }
        Ok(views)
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn upsert_result(&self, projection: &ResultProjection, now: DateTime<Utc>) -> StoreResult<ExamResult> {
        let mut results = self.results.write().await;
        let existing = results
            .values()
            .find(|r| r.attempt_id == projection.attempt_id)
            .cloned();
        let result = projection.apply(existing.as_ref(), now);
        results.insert(result.id, result.clone());
        Ok(result)
    }

    async fn find_result(&self, id: Uuid) -> StoreResult<Option<ExamResult>> {
        Ok(self.results.read().await.get(&id).cloned())
    }

    async fn find_result_by_attempt(&self, attempt_id: Uuid) -> StoreResult<Option<ExamResult>> {
        Ok(self
            .results
            .read()
            .await
            .values()
            .find(|r| r.attempt_id == attempt_id)
            .cloned())
    }

    async fn find_result_view(&self, id: Uuid) -> StoreResult<Option<ResultView>> {
        let result = self.results.read().await.get(&id).cloned();
        match result {
            Some(result) => Ok(Some(self.expand_result(result).await)),
            None => Ok(None),
        }
    }

    async fn set_publication(
        &self,
        id: Uuid,
        is_published: bool,
        graded_by: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ExamResult>> {
        let mut results = self.results.write().await;
        let Some(result) = results.get_mut(&id) else {
            return Ok(None);
        };
        result.is_published = is_published;
        result.published_at = if is_published { Some(now) } else { None };
        result.metadata.graded_by = Some(graded_by);
        result.metadata.graded_at = Some(now);
        result.updated_at = now;
        Ok(Some(result.clone()))
    }

    async fn list_results_by_student(
        &self,
        student_id: Uuid,
        published_only: bool,
        page: Page,
    ) -> StoreResult<Vec<ResultView>> {
        let mut matching: Vec<ExamResult> = self
            .results
            .read()
            .await
            .values()
            .filter(|r| r.student_id == student_id && (!published_only || r.is_published))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut views = Vec::new();
        for result in paginate(matching, page) {
            views.push(self.expand_result(result).await);
        }
        Ok(views)
    }

    async fn list_results_by_paper(&self, paper_id: Uuid, page: Page) -> StoreResult<Vec<ResultView>> {
        let mut matching: Vec<ExamResult> = self
            .results
            .read()
            .await
            .values()
            .filter(|r| r.paper_id == paper_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.obtained_marks.total_cmp(&a.obtained_marks));

        let mut views = Vec::new();
        for result in paginate(matching, page) {
            views.push(self.expand_result(result).await);
        }
        Ok(views)
    }
}

#[async_trait]
impl Notifier for MemoryStore {
    async fn notify(&self, notification: Notification) -> StoreResult<()> {
        tracing::debug!(
            user_id = %notification.user_id,
            kind = notification.kind.as_str(),
            "notification queued"
        );
        self.notifications.write().await.push(notification);
        Ok(())
    }
}
