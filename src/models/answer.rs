use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One submitted response to one question within one attempt. At most one
/// row per (attempt_id, question_id); a resubmission replaces content and
/// grading in place and keeps the original id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Answer {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub option_id: Option<Uuid>,
    pub text_answer: Option<String>,
    pub is_correct: bool,
    pub points_earned: i32,
    pub submitted_at: DateTime<Utc>,
}

/// Answer content plus its grading result, ready to be stored. Grading
/// happens before the store call; the store only checks that the attempt
/// is still open.
#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub question_id: Uuid,
    pub option_id: Option<Uuid>,
    pub text_answer: Option<String>,
    pub is_correct: bool,
    pub points_earned: i32,
}
