// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use crate::{
    models::{
        attempt::{AnswerRecord, Attempt, AttemptView, Grading, Scoring},
        notification::Notification,
        paper::{Paper, PaperSettings, PaperSummary, Question},
        result::{ExamResult, ResultMetadata, ResultProjection, ResultView},
        user::UserSummary,
    },
    store::{AttemptStore, Notifier, Page, PaperCatalog, ResultStore, StoreError, StoreResult},
};

/// Postgres-backed implementation of every storage port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ATTEMPT_COLUMNS: &str = "a.id, a.paper_id, a.student_id, a.attempt_number, a.answers, a.status, \
     a.start_time, a.submit_time, a.time_spent, a.total_marks, a.obtained_marks, a.percentage, \
     a.is_passed, a.auto_graded_questions, a.manually_graded_questions, a.pending_grading_questions, \
     a.graded_by, a.graded_at, a.is_fully_graded, a.version, a.created_at, a.updated_at";

const RESULT_COLUMNS: &str = "r.id, r.attempt_id, r.student_id, r.paper_id, r.total_marks, \
     r.obtained_marks, r.percentage, r.is_passed, r.feedback, r.is_published, r.published_at, \
     r.graded_by, r.graded_at, r.remarks, r.created_at, r.updated_at";

const EXPANSION_COLUMNS: &str = "u.name AS student_name, u.email AS student_email, \
     p.title AS paper_title, p.subject AS paper_subject";

#[derive(FromRow)]
struct PaperRow {
    id: Uuid,
    title: String,
    subject: String,
    created_by: Uuid,
    questions: Json<Vec<Question>>,
    time_limit: i32,
    total_marks: f64,
    passing_marks: Option<f64>,
    max_attempts: i32,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    is_published: bool,
    assigned_to: Vec<Uuid>,
}

impl From<PaperRow> for Paper {
    fn from(row: PaperRow) -> Self {
        Paper {
            id: row.id,
            title: row.title,
            subject: row.subject,
            created_by: row.created_by,
            questions: row.questions.0,
            settings: PaperSettings {
                time_limit: row.time_limit,
                total_marks: row.total_marks,
                passing_marks: row.passing_marks,
                max_attempts: row.max_attempts,
                start_time: row.start_time,
                end_time: row.end_time,
                is_published: row.is_published,
            },
            assigned_to: row.assigned_to,
        }
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: Uuid,
    paper_id: Uuid,
    student_id: Uuid,
    attempt_number: i32,
    answers: Json<Vec<AnswerRecord>>,
    status: String,
    start_time: DateTime<Utc>,
    submit_time: Option<DateTime<Utc>>,
    time_spent: i64,
    total_marks: f64,
    obtained_marks: f64,
    percentage: f64,
    is_passed: bool,
    auto_graded_questions: i32,
    manually_graded_questions: i32,
    pending_grading_questions: i32,
    graded_by: Option<Uuid>,
    graded_at: Option<DateTime<Utc>>,
    is_fully_graded: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = StoreError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(StoreError::Corrupt)?;
        Ok(Attempt {
            id: row.id,
            paper_id: row.paper_id,
            student_id: row.student_id,
            attempt_number: row.attempt_number,
            answers: row.answers.0,
            status,
            start_time: row.start_time,
            submit_time: row.submit_time,
            time_spent: row.time_spent,
            scoring: Scoring {
                total_marks: row.total_marks,
                obtained_marks: row.obtained_marks,
                percentage: row.percentage,
                is_passed: row.is_passed,
            },
            grading: Grading {
                auto_graded_questions: row.auto_graded_questions,
                manually_graded_questions: row.manually_graded_questions,
                pending_grading_questions: row.pending_grading_questions,
                graded_by: row.graded_by,
                graded_at: row.graded_at,
                is_fully_graded: row.is_fully_graded,
            },
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Columns produced by `EXPANSION_COLUMNS`.
#[derive(FromRow)]
struct Expansion {
    student_name: Option<String>,
    student_email: Option<String>,
    paper_title: Option<String>,
    paper_subject: Option<String>,
}

impl Expansion {
    fn student(&self, id: Uuid) -> Option<UserSummary> {
        match (&self.student_name, &self.student_email) {
            (Some(name), Some(email)) => Some(UserSummary {
                id,
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        }
    }

    fn paper(&self, id: Uuid) -> Option<PaperSummary> {
        match (&self.paper_title, &self.paper_subject) {
            (Some(title), Some(subject)) => Some(PaperSummary {
                id,
                title: title.clone(),
                subject: subject.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(FromRow)]
struct AttemptViewRow {
    #[sqlx(flatten)]
    attempt: AttemptRow,
    #[sqlx(flatten)]
    expansion: Expansion,
}

impl TryFrom<AttemptViewRow> for AttemptView {
    type Error = StoreError;

    fn try_from(row: AttemptViewRow) -> Result<Self, Self::Error> {
        let attempt = Attempt::try_from(row.attempt)?;
        Ok(AttemptView {
            student: row.expansion.student(attempt.student_id),
            paper: row.expansion.paper(attempt.paper_id),
            attempt,
        })
    }
}

#[derive(FromRow)]
struct ResultRow {
    id: Uuid,
    attempt_id: Uuid,
    student_id: Uuid,
    paper_id: Uuid,
    total_marks: f64,
    obtained_marks: f64,
    percentage: f64,
    is_passed: bool,
    feedback: String,
    is_published: bool,
    published_at: Option<DateTime<Utc>>,
    graded_by: Option<Uuid>,
    graded_at: Option<DateTime<Utc>>,
    remarks: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ResultRow> for ExamResult {
    fn from(row: ResultRow) -> Self {
        ExamResult {
            id: row.id,
            attempt_id: row.attempt_id,
            student_id: row.student_id,
            paper_id: row.paper_id,
            total_marks: row.total_marks,
            obtained_marks: row.obtained_marks,
            percentage: row.percentage,
            is_passed: row.is_passed,
            feedback: row.feedback,
            is_published: row.is_published,
            published_at: row.published_at,
            metadata: ResultMetadata {
                graded_by: row.graded_by,
                graded_at: row.graded_at,
                remarks: row.remarks,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ResultViewRow {
    #[sqlx(flatten)]
    result: ResultRow,
    #[sqlx(flatten)]
    expansion: Expansion,
}

impl From<ResultViewRow> for ResultView {
    fn from(row: ResultViewRow) -> Self {
        let result = ExamResult::from(row.result);
        ResultView {
            student: row.expansion.student(result.student_id),
            paper: row.expansion.paper(result.paper_id),
            result,
        }
    }
}

fn attempt_view_query(filter: &str) -> String {
    format!(
        "SELECT {ATTEMPT_COLUMNS}, {EXPANSION_COLUMNS}
         FROM attempts a
         LEFT JOIN users u ON u.id = a.student_id
         LEFT JOIN papers p ON p.id = a.paper_id
         {filter}"
    )
}

fn result_view_query(filter: &str) -> String {
    format!(
        "SELECT {RESULT_COLUMNS}, {EXPANSION_COLUMNS}
         FROM results r
         LEFT JOIN users u ON u.id = r.student_id
         LEFT JOIN papers p ON p.id = r.paper_id
         {filter}"
    )
}

fn map_unique_violation(err: sqlx::Error, message: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(message.to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl PaperCatalog for PgStore {
    async fn find_paper(&self, id: Uuid) -> StoreResult<Option<Paper>> {
        let row = sqlx::query_as::<_, PaperRow>(
            "SELECT id, title, subject, created_by, questions, time_limit, total_marks,
                    passing_marks, max_attempts, start_time, end_time, is_published, assigned_to
             FROM papers
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Paper::from))
    }
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn count_attempts(&self, paper_id: Uuid, student_id: Uuid) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM attempts WHERE paper_id = $1 AND student_id = $2",
        )
        .bind(paper_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn find_attempt(&self, id: Uuid) -> StoreResult<Option<Attempt>> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts a WHERE a.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Attempt::try_from).transpose()
    }

    async fn find_in_progress(&self, paper_id: Uuid, student_id: Uuid) -> StoreResult<Option<Attempt>> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts a
             WHERE a.paper_id = $1 AND a.student_id = $2 AND a.status = 'in_progress'
             ORDER BY a.attempt_number
             LIMIT 1"
        ))
        .bind(paper_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Attempt::try_from).transpose()
    }

    async fn insert_attempt(&self, attempt: &Attempt) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO attempts (
                id, paper_id, student_id, attempt_number, answers, status, start_time,
                submit_time, time_spent, total_marks, obtained_marks, percentage, is_passed,
                auto_graded_questions, manually_graded_questions, pending_grading_questions,
                graded_by, graded_at, is_fully_graded, version, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19, $20, $21, $22
            )",
        )
        .bind(attempt.id)
        .bind(attempt.paper_id)
        .bind(attempt.student_id)
        .bind(attempt.attempt_number)
        .bind(Json(&attempt.answers))
        .bind(attempt.status.as_str())
        .bind(attempt.start_time)
        .bind(attempt.submit_time)
        .bind(attempt.time_spent)
        .bind(attempt.scoring.total_marks)
        .bind(attempt.scoring.obtained_marks)
        .bind(attempt.scoring.percentage)
        .bind(attempt.scoring.is_passed)
        .bind(attempt.grading.auto_graded_questions)
        .bind(attempt.grading.manually_graded_questions)
        .bind(attempt.grading.pending_grading_questions)
        .bind(attempt.grading.graded_by)
        .bind(attempt.grading.graded_at)
        .bind(attempt.grading.is_fully_graded)
        .bind(attempt.version)
        .bind(attempt.created_at)
        .bind(attempt.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "attempt number already taken for this student and paper"))?;

        Ok(())
    }

    async fn update_attempt(&self, attempt: &Attempt, expected_version: i64) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE attempts SET
                answers = $3, status = $4, submit_time = $5, time_spent = $6,
                total_marks = $7, obtained_marks = $8, percentage = $9, is_passed = $10,
                auto_graded_questions = $11, manually_graded_questions = $12,
                pending_grading_questions = $13, graded_by = $14, graded_at = $15,
                is_fully_graded = $16, version = $17, updated_at = $18
             WHERE id = $1 AND version = $2",
        )
        .bind(attempt.id)
        .bind(expected_version)
        .bind(Json(&attempt.answers))
        .bind(attempt.status.as_str())
        .bind(attempt.submit_time)
        .bind(attempt.time_spent)
        .bind(attempt.scoring.total_marks)
        .bind(attempt.scoring.obtained_marks)
        .bind(attempt.scoring.percentage)
        .bind(attempt.scoring.is_passed)
        .bind(attempt.grading.auto_graded_questions)
        .bind(attempt.grading.manually_graded_questions)
        .bind(attempt.grading.pending_grading_questions)
        .bind(attempt.grading.graded_by)
        .bind(attempt.grading.graded_at)
        .bind(attempt.grading.is_fully_graded)
        .bind(attempt.version)
        .bind(attempt.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(
                "attempt was modified concurrently".to_string(),
            ));
        }

        Ok(())
    }

    async fn find_attempt_view(&self, id: Uuid) -> StoreResult<Option<AttemptView>> {
        let row = sqlx::query_as::<_, AttemptViewRow>(&attempt_view_query("WHERE a.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(AttemptView::try_from).transpose()
    }

    async fn list_attempts_by_paper(&self, paper_id: Uuid, page: Page) -> StoreResult<Vec<AttemptView>> {
        let page = page.normalized();
        let rows = sqlx::query_as::<_, AttemptViewRow>(&attempt_view_query(
            "WHERE a.paper_id = $1 ORDER BY a.created_at DESC OFFSET $2 LIMIT $3",
        ))
        .bind(paper_id)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AttemptView::try_from).collect()
    }

    async fn list_attempts_by_student(&self, student_id: Uuid, page: Page) -> StoreResult<Vec<AttemptView>> {
        let page = page.normalized();
        let rows = sqlx::query_as::<_, AttemptViewRow>(&attempt_view_query(
            "WHERE a.student_id = $1 ORDER BY a.created_at DESC OFFSET $2 LIMIT $3",
        ))
        .bind(student_id)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AttemptView::try_from).collect()
    }
}

#[async_trait]
impl ResultStore for PgStore {
    async fn upsert_result(&self, projection: &ResultProjection, now: DateTime<Utc>) -> StoreResult<ExamResult> {
        // $10 is the optional publish flag: NULL keeps the stored publication state.
        let row = sqlx::query_as::<_, ResultRow>(&format!(
            "INSERT INTO results AS r (
                id, attempt_id, student_id, paper_id, total_marks, obtained_marks, percentage,
                is_passed, feedback, is_published, published_at, graded_by, graded_at, remarks,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9,
                COALESCE($10::BOOLEAN, FALSE),
                CASE WHEN $10::BOOLEAN THEN $11 ELSE NULL END,
                $12, $13, $14, $11, $11
            )
            ON CONFLICT (attempt_id) DO UPDATE SET
                student_id = EXCLUDED.student_id,
                paper_id = EXCLUDED.paper_id,
                total_marks = EXCLUDED.total_marks,
                obtained_marks = EXCLUDED.obtained_marks,
                percentage = EXCLUDED.percentage,
                is_passed = EXCLUDED.is_passed,
                feedback = EXCLUDED.feedback,
                is_published = COALESCE($10::BOOLEAN, r.is_published),
                published_at = CASE
                    WHEN $10::BOOLEAN IS NULL THEN r.published_at
                    WHEN $10::BOOLEAN THEN $11
                    ELSE NULL
                END,
                graded_by = EXCLUDED.graded_by,
                graded_at = EXCLUDED.graded_at,
                remarks = EXCLUDED.remarks,
                updated_at = EXCLUDED.updated_at
            RETURNING {RESULT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(projection.attempt_id)
        .bind(projection.student_id)
        .bind(projection.paper_id)
        .bind(projection.total_marks)
        .bind(projection.obtained_marks)
        .bind(projection.percentage)
        .bind(projection.is_passed)
        .bind(&projection.feedback)
        .bind(projection.publish)
        .bind(now)
        .bind(projection.metadata.graded_by)
        .bind(projection.metadata.graded_at)
        .bind(&projection.metadata.remarks)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_result(&self, id: Uuid) -> StoreResult<Option<ExamResult>> {
        let row = sqlx::query_as::<_, ResultRow>(&format!(
            "SELECT {RESULT_COLUMNS} FROM results r WHERE r.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ExamResult::from))
    }

    async fn find_result_by_attempt(&self, attempt_id: Uuid) -> StoreResult<Option<ExamResult>> {
        let row = sqlx::query_as::<_, ResultRow>(&format!(
            "SELECT {RESULT_COLUMNS} FROM results r WHERE r.attempt_id = $1"
        ))
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ExamResult::from))
    }

    async fn find_result_view(&self, id: Uuid) -> StoreResult<Option<ResultView>> {
        let row = sqlx::query_as::<_, ResultViewRow>(&result_view_query("WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ResultView::from))
    }

    async fn set_publication(
        &self,
        id: Uuid,
        is_published: bool,
        graded_by: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ExamResult>> {
        let row = sqlx::query_as::<_, ResultRow>(&format!(
            "UPDATE results AS r SET
                is_published = $2,
                published_at = CASE WHEN $2 THEN $4 ELSE NULL END,
                graded_by = $3,
                graded_at = $4,
                updated_at = $4
             WHERE r.id = $1
             RETURNING {RESULT_COLUMNS}"
        ))
        .bind(id)
        .bind(is_published)
        .bind(graded_by)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ExamResult::from))
    }

    async fn list_results_by_student(
        &self,
        student_id: Uuid,
        published_only: bool,
        page: Page,
    ) -> StoreResult<Vec<ResultView>> {
        let page = page.normalized();
        let rows = sqlx::query_as::<_, ResultViewRow>(&result_view_query(
            "WHERE r.student_id = $1 AND (NOT $4::BOOLEAN OR r.is_published) \
             ORDER BY r.created_at DESC OFFSET $2 LIMIT $3",
        ))
        .bind(student_id)
        .bind(page.skip)
        .bind(page.limit)
        .bind(published_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ResultView::from).collect())
    }

    async fn list_results_by_paper(&self, paper_id: Uuid, page: Page) -> StoreResult<Vec<ResultView>> {
        let page = page.normalized();
        let rows = sqlx::query_as::<_, ResultViewRow>(&result_view_query(
            "WHERE r.paper_id = $1 ORDER BY r.obtained_marks DESC OFFSET $2 LIMIT $3",
        ))
        .bind(paper_id)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ResultView::from).collect())
    }
}

#[async_trait]
impl Notifier for PgStore {
    async fn notify(&self, notification: Notification) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, type, title, message, paper_id, attempt_id, result_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.paper_id)
        .bind(notification.attempt_id)
        .bind(notification.result_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
