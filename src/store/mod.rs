// src/store/mod.rs

//! Storage and notification ports used by the grading core.
//!
//! The core never talks to a database directly. It reads papers from a
//! `PaperCatalog`, keeps attempts in an `AttemptStore` and projects results
//! into a `ResultStore`. Every write touches exactly one record; there is no
//! cross-record transaction.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{
    attempt::{Attempt, AttemptView},
    notification::Notification,
    paper::Paper,
    result::{ExamResult, ResultProjection, ResultView},
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A write lost a race: stale version or duplicate key.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// A stored record could not be mapped back into the domain model.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub const DEFAULT_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE_LIMIT: i64 = 500;

/// Skip/limit window for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

const fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Page {
    /// Clamps caller-supplied values into a sane window.
    pub fn normalized(self) -> Self {
        Self {
            skip: self.skip.max(0),
            limit: self.limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }
}

#[async_trait]
pub trait PaperCatalog: Send + Sync {
    async fn find_paper(&self, id: Uuid) -> StoreResult<Option<Paper>>;
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn count_attempts(&self, paper_id: Uuid, student_id: Uuid) -> StoreResult<i64>;

    async fn find_attempt(&self, id: Uuid) -> StoreResult<Option<Attempt>>;

    async fn find_in_progress(&self, paper_id: Uuid, student_id: Uuid) -> StoreResult<Option<Attempt>>;

    /// Fails with `Conflict` when (paper, student, attempt number) is already taken.
    async fn insert_attempt(&self, attempt: &Attempt) -> StoreResult<()>;

    /// Replaces the stored attempt only if its version still equals `expected_version`.
    async fn update_attempt(&self, attempt: &Attempt, expected_version: i64) -> StoreResult<()>;

    async fn find_attempt_view(&self, id: Uuid) -> StoreResult<Option<AttemptView>>;

    /// Newest first, student expanded.
    async fn list_attempts_by_paper(&self, paper_id: Uuid, page: Page) -> StoreResult<Vec<AttemptView>>;

    /// Newest first, paper expanded.
    async fn list_attempts_by_student(&self, student_id: Uuid, page: Page) -> StoreResult<Vec<AttemptView>>;
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Inserts or overwrites the single result keyed by `projection.attempt_id`.
    async fn upsert_result(&self, projection: &ResultProjection, now: DateTime<Utc>) -> StoreResult<ExamResult>;

    async fn find_result(&self, id: Uuid) -> StoreResult<Option<ExamResult>>;

    async fn find_result_by_attempt(&self, attempt_id: Uuid) -> StoreResult<Option<ExamResult>>;

    async fn find_result_view(&self, id: Uuid) -> StoreResult<Option<ResultView>>;

    async fn set_publication(
        &self,
        id: Uuid,
        is_published: bool,
        graded_by: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ExamResult>>;

    /// Newest first, paper expanded. With `published_only`, unpublished results are
    /// excluded before the page window is applied.
    async fn list_results_by_student(
        &self,
        student_id: Uuid,
        published_only: bool,
        page: Page,
    ) -> StoreResult<Vec<ResultView>>;

    /// Highest obtained marks first, student expanded.
    async fn list_results_by_paper(&self, paper_id: Uuid, page: Page) -> StoreResult<Vec<ResultView>>;
}

/// Fire-and-forget inbox delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> StoreResult<()>;
}

/// Everything the core needs from persistence.
pub trait Storage: PaperCatalog + AttemptStore + ResultStore {}

impl<T: PaperCatalog + AttemptStore + ResultStore> Storage for T {}
