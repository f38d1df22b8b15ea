use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::answer::{Answer, NewAnswer};
use crate::models::attempt::{Attempt, AttemptStatus, FinalGrade};
use crate::services::quota::{self, AdmissionPolicy};

use super::{AttemptStore, FinalizeOutcome, NewAttempt, UpsertOutcome};

#[derive(Debug, FromRow)]
struct AttemptRow {
    id: Uuid,
    user_id: Uuid,
    test_id: Uuid,
    attempt_number: i32,
    status: String,
    started_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    score: i32,
    max_score: i32,
    percent_score: Option<Decimal>,
    time_spent_seconds: Option<i64>,
    questions_snapshot: JsonValue,
}

impl AttemptRow {
    fn into_attempt(self) -> Result<Attempt> {
        Ok(Attempt {
            id: self.id,
            user_id: self.user_id,
            test_id: self.test_id,
            attempt_number: self.attempt_number,
            status: AttemptStatus::parse(&self.status)?,
            started_at: self.started_at,
            expires_at: self.expires_at,
            completed_at: self.completed_at,
            score: self.score,
            max_score: self.max_score,
            percent_score: self.percent_score,
            time_spent_seconds: self.time_spent_seconds,
            questions: serde_json::from_value(self.questions_snapshot)?,
        })
    }
}

/// Postgres-backed store. Row locks make each write atomic; the partial
/// unique index on open attempts and the unique attempt_number are the
/// backstop for inserts racing on an empty row set.
#[derive(Clone)]
pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_admission_conflict(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(ref db) = err {
        if db.constraint() == Some("attempts_one_open")
            || db.constraint() == Some("attempts_number_unique")
        {
            // A concurrent start won the slot; its attempt is the open one now.
            return Error::AlreadyInProgress(
                "An attempt for this test is already in progress".to_string(),
            );
        }
    }
    Error::from(err)
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn insert_attempt(&self, new: NewAttempt, policy: AdmissionPolicy) -> Result<Attempt> {
        let questions_snapshot = serde_json::to_value(&new.questions)?;
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, AttemptRow>(
            r#"SELECT * FROM attempts WHERE user_id = $1 AND test_id = $2 FOR UPDATE"#,
        )
        .bind(new.user_id)
        .bind(new.test_id)
        .fetch_all(&mut *tx)
        .await?;

        let has_open = existing
            .iter()
            .any(|r| r.status == AttemptStatus::InProgress.as_str());
        quota::evaluate(&policy, existing.len() as i64, has_open, new.started_at)?;

        let row = sqlx::query_as::<_, AttemptRow>(
            r#"
            INSERT INTO attempts (
                user_id, test_id, attempt_number, status, started_at, expires_at,
                score, max_score, questions_snapshot
            ) VALUES ($1, $2, $3, 'in_progress', $4, $5, 0, $6, $7)
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(new.test_id)
        .bind(existing.len() as i32 + 1)
        .bind(new.started_at)
        .bind(new.expires_at)
        .bind(new.max_score)
        .bind(questions_snapshot)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_admission_conflict)?;

        tx.commit().await?;
        row.into_attempt()
    }

    async fn get_attempt(&self, id: Uuid) -> Result<Option<Attempt>> {
        let row = sqlx::query_as::<_, AttemptRow>(r#"SELECT * FROM attempts WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(AttemptRow::into_attempt).transpose()
    }

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>> {
        let answers = sqlx::query_as::<_, Answer>(
            r#"SELECT * FROM attempt_answers WHERE attempt_id = $1 ORDER BY submitted_at"#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(answers)
    }

    async fn upsert_answer(
        &self,
        attempt_id: Uuid,
        answer: NewAnswer,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(row) =
            sqlx::query_as::<_, AttemptRow>(r#"SELECT * FROM attempts WHERE id = $1 FOR UPDATE"#)
                .bind(attempt_id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Err(Error::AttemptNotFound(attempt_id.to_string()));
        };
        let attempt = row.into_attempt()?;
        if attempt.status.is_terminal() || attempt.deadline_passed(now) {
            tx.rollback().await?;
            return Ok(UpsertOutcome::Closed { attempt });
        }

        let stored = sqlx::query_as::<_, Answer>(
            r#"
            INSERT INTO attempt_answers (
                attempt_id, question_id, option_id, text_answer, is_correct, points_earned, submitted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (attempt_id, question_id) DO UPDATE
            SET option_id = EXCLUDED.option_id,
                text_answer = EXCLUDED.text_answer,
                is_correct = EXCLUDED.is_correct,
                points_earned = EXCLUDED.points_earned,
                submitted_at = EXCLUDED.submitted_at
            RETURNING *
            "#,
        )
        .bind(attempt_id)
        .bind(answer.question_id)
        .bind(answer.option_id)
        .bind(answer.text_answer)
        .bind(answer.is_correct)
        .bind(answer.points_earned)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let answered_count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM attempt_answers WHERE attempt_id = $1"#)
                .bind(attempt_id)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(UpsertOutcome::Stored {
            answer: stored,
            answered_count: answered_count as usize,
        })
    }

    async fn finalize_attempt(
        &self,
        id: Uuid,
        target: AttemptStatus,
        now: DateTime<Utc>,
    ) -> Result<FinalizeOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(row) =
            sqlx::query_as::<_, AttemptRow>(r#"SELECT * FROM attempts WHERE id = $1 FOR UPDATE"#)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Err(Error::AttemptNotFound(id.to_string()));
        };
        let attempt = row.into_attempt()?;
        let answers = sqlx::query_as::<_, Answer>(
            r#"SELECT * FROM attempt_answers WHERE attempt_id = $1 ORDER BY submitted_at"#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        if attempt.status.is_terminal() {
            tx.rollback().await?;
            return Ok(FinalizeOutcome::AlreadyTerminal { attempt, answers });
        }

        let grade = FinalGrade::compute(&attempt, &answers, now);
        let updated = sqlx::query_as::<_, AttemptRow>(
            r#"
            UPDATE attempts
            SET status = $2, completed_at = $3, score = $4, percent_score = $5,
                time_spent_seconds = $6
            WHERE id = $1 AND status = 'in_progress'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(target.as_str())
        .bind(now)
        .bind(grade.score)
        .bind(grade.percent_score)
        .bind(grade.time_spent_seconds)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(FinalizeOutcome::Finalized {
            attempt: updated.into_attempt()?,
            answers,
        })
    }

    async fn list_in_progress(&self) -> Result<Vec<Attempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            r#"SELECT * FROM attempts WHERE status = 'in_progress' ORDER BY started_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(AttemptRow::into_attempt).collect()
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Attempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            r#"
            SELECT * FROM attempts
            WHERE status = 'in_progress' AND expires_at IS NOT NULL AND expires_at <= $1
            ORDER BY expires_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(AttemptRow::into_attempt).collect()
    }
}
