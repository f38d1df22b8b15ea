use crate::models::question::Question;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog definition of a test. The attempt lifecycle only ever sees an
/// immutable snapshot of this; later catalog edits do not touch open attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDefinition {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<Question>,
    pub max_attempts: i32,
    /// None means the test is untimed.
    pub duration_seconds: Option<i64>,
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

impl TestDefinition {
    pub fn max_score(&self) -> i32 {
        self.questions.iter().map(|q| q.points).sum()
    }
}
