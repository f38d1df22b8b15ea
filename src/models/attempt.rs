use crate::models::answer::Answer;
use crate::models::question::Question;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One user's one timed try at one test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub test_id: Uuid,
    /// 1-based, gapless per (user_id, test_id), assigned atomically at creation.
    pub attempt_number: i32,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    /// started_at + test duration; None for untimed tests. Immutable after creation.
    pub expires_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: i32,
    /// Sum of question points, snapshotted at start.
    pub max_score: i32,
    pub percent_score: Option<Decimal>,
    pub time_spent_seconds: Option<i64>,
    /// Question snapshot taken from the catalog at start. Grading and
    /// summaries read this, never the live catalog.
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    TimedOut,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::TimedOut => "timed_out",
        }
    }

    pub fn parse(s: &str) -> crate::error::Result<Self> {
        match s {
            "in_progress" => Ok(AttemptStatus::InProgress),
            "completed" => Ok(AttemptStatus::Completed),
            "timed_out" => Ok(AttemptStatus::TimedOut),
            other => Err(crate::error::Error::Internal(format!(
                "Unknown attempt status: {}",
                other
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

impl Attempt {
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expires| now >= expires)
    }

    pub fn question(&self, question_id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}

/// Aggregate result written by the terminal transition. Computed from stored
/// answers inside the store's critical section so a finalize always reflects
/// exactly the answers that won the race.
#[derive(Debug, Clone)]
pub struct FinalGrade {
    pub score: i32,
    pub percent_score: Decimal,
    pub time_spent_seconds: i64,
}

impl FinalGrade {
    pub fn compute(attempt: &Attempt, answers: &[Answer], completed_at: DateTime<Utc>) -> Self {
        let score: i32 = answers.iter().map(|a| a.points_earned).sum();
        let percent_score = if attempt.max_score > 0 {
            // Fixed at two decimal places on the wire, so "100" becomes "100.00".
            let mut percent = (Decimal::from(score) * Decimal::from(100)
                / Decimal::from(attempt.max_score))
            .round_dp(2);
            percent.rescale(2);
            percent
        } else {
            Decimal::new(0, 2)
        };
        let time_spent_seconds = (completed_at - attempt.started_at).num_seconds().max(0);

        Self {
            score,
            percent_score,
            time_spent_seconds,
        }
    }
}

/// Per-question breakdown returned alongside a terminal attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub total_questions: usize,
    pub correct_answers: usize,
    pub incorrect_answers: usize,
    pub unanswered_questions: usize,
}

impl CompletionSummary {
    pub fn compute(questions: &[Question], answers: &[Answer]) -> Self {
        let total_questions = questions.len();
        let answered = questions
            .iter()
            .filter(|q| answers.iter().any(|a| a.question_id == q.id))
            .count();
        let correct_answers = answers.iter().filter(|a| a.is_correct).count();

        Self {
            total_questions,
            correct_answers,
            incorrect_answers: answered - correct_answers,
            unanswered_questions: total_questions - answered,
        }
    }
}
