use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::answer::Answer;
use crate::models::attempt::{Attempt, AttemptStatus, CompletionSummary};
use crate::models::question::{Question, QuestionOption, QuestionType};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    pub question_id: uuid::Uuid,
    pub option_id: Option<uuid::Uuid>,
    #[validate(length(max = 10000))]
    pub text_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionView {
    pub id: uuid::Uuid,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: uuid::Uuid,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub points: i32,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptView {
    pub id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub test_id: uuid::Uuid,
    pub attempt_number: i32,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: i32,
    pub max_score: i32,
    pub percent_score: Option<Decimal>,
    pub time_spent_seconds: Option<i64>,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerView {
    pub question_id: uuid::Uuid,
    pub option_id: Option<uuid::Uuid>,
    pub text_answer: Option<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_earned: Option<i32>,
}

impl AnswerView {
    // Grading fields are only revealed once the attempt is terminal.
    pub fn of(value: Answer, reveal_grading: bool) -> Self {
        Self {
            question_id: value.question_id,
            option_id: value.option_id,
            text_answer: value.text_answer,
            submitted_at: value.submitted_at,
            is_correct: reveal_grading.then_some(value.is_correct),
            points_earned: reveal_grading.then_some(value.points_earned),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptDetailResponse {
    pub attempt: AttemptView,
    pub answers: Vec<AnswerView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<CompletionSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    pub saved: bool,
    pub question_id: uuid::Uuid,
    pub answered_count: usize,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteAttemptResponse {
    pub attempt: AttemptView,
    pub summary: CompletionSummary,
    pub answers: Vec<AnswerView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemainingTimeResponse {
    pub attempt_id: uuid::Uuid,
    pub status: AttemptStatus,
    pub remaining_seconds: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveAttemptView {
    pub id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub test_id: uuid::Uuid,
    pub attempt_number: i32,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveAttemptsResponse {
    pub items: Vec<LiveAttemptView>,
    pub total: usize,
}

impl From<QuestionOption> for OptionView {
    fn from(value: QuestionOption) -> Self {
        Self {
            id: value.id,
            text: value.text,
        }
    }
}

impl From<Question> for QuestionView {
    fn from(value: Question) -> Self {
        Self {
            id: value.id,
            text: value.text,
            question_type: value.question_type,
            points: value.points,
            options: value.options.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Attempt> for AttemptView {
    fn from(value: Attempt) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            test_id: value.test_id,
            attempt_number: value.attempt_number,
            status: value.status,
            started_at: value.started_at,
            expires_at: value.expires_at,
            completed_at: value.completed_at,
            score: value.score,
            max_score: value.max_score,
            percent_score: value.percent_score,
            time_spent_seconds: value.time_spent_seconds,
            questions: value.questions.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Attempt> for LiveAttemptView {
    fn from(value: Attempt) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            test_id: value.test_id,
            attempt_number: value.attempt_number,
            started_at: value.started_at,
            expires_at: value.expires_at,
        }
    }
}
