use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::Result;
use crate::models::test::TestDefinition;

use super::TestCatalog;

#[derive(Debug, FromRow)]
struct TestRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    questions: JsonValue,
    max_attempts: i32,
    duration_seconds: Option<i64>,
    available_from: Option<DateTime<Utc>>,
    available_until: Option<DateTime<Utc>>,
    is_published: bool,
    created_at: DateTime<Utc>,
}

impl TestRow {
    fn into_definition(self) -> Result<TestDefinition> {
        Ok(TestDefinition {
            id: self.id,
            title: self.title,
            description: self.description,
            questions: serde_json::from_value(self.questions)?,
            max_attempts: self.max_attempts,
            duration_seconds: self.duration_seconds,
            available_from: self.available_from,
            available_until: self.available_until,
            is_published: self.is_published,
            created_at: self.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PgTestCatalog {
    pool: PgPool,
}

impl PgTestCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TestCatalog for PgTestCatalog {
    async fn insert_test(&self, test: TestDefinition) -> Result<TestDefinition> {
        let questions = serde_json::to_value(&test.questions)?;
        let row = sqlx::query_as::<_, TestRow>(
            r#"
            INSERT INTO tests (
                id, title, description, questions, max_attempts, duration_seconds,
                available_from, available_until, is_published, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(test.id)
        .bind(&test.title)
        .bind(&test.description)
        .bind(questions)
        .bind(test.max_attempts)
        .bind(test.duration_seconds)
        .bind(test.available_from)
        .bind(test.available_until)
        .bind(test.is_published)
        .bind(test.created_at)
        .fetch_one(&self.pool)
        .await?;
        row.into_definition()
    }

    async fn test_snapshot(&self, id: Uuid) -> Result<Option<TestDefinition>> {
        let row = sqlx::query_as::<_, TestRow>(r#"SELECT * FROM tests WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TestRow::into_definition).transpose()
    }

    async fn list_tests(&self) -> Result<Vec<TestDefinition>> {
        let rows = sqlx::query_as::<_, TestRow>(r#"SELECT * FROM tests ORDER BY created_at DESC"#)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TestRow::into_definition).collect()
    }
}
