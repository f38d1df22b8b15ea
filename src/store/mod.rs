pub mod memory;
pub mod postgres;

use crate::error::Result;
use crate::models::answer::{Answer, NewAnswer};
use crate::models::attempt::{Attempt, AttemptStatus};
use crate::models::question::Question;
use crate::services::quota::AdmissionPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::MemoryAttemptStore;
pub use postgres::PgAttemptStore;

/// Everything needed to create an attempt except what the store assigns
/// itself (id, attempt_number).
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: Uuid,
    pub test_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_score: i32,
    pub questions: Vec<Question>,
}

#[derive(Debug)]
pub enum UpsertOutcome {
    Stored {
        answer: Answer,
        answered_count: usize,
    },
    /// The attempt is terminal or past its deadline; nothing was written.
    Closed { attempt: Attempt },
}

#[derive(Debug)]
pub enum FinalizeOutcome {
    Finalized {
        attempt: Attempt,
        answers: Vec<Answer>,
    },
    /// The status CAS found a terminal attempt: the existing record, unchanged.
    AlreadyTerminal {
        attempt: Attempt,
        answers: Vec<Answer>,
    },
}

/// Durable record of attempts and submitted answers. Every write is an
/// atomic conditional operation: the admission predicate, the open-attempt
/// check and the status compare-and-swap all run inside the implementation's
/// own critical section, never as a separate earlier read.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Admission and insert as one atomic unit: evaluates the policy against
    /// the user's current attempts for the test and allocates the next
    /// attempt_number under the same lock or transaction as the insert.
    async fn insert_attempt(&self, new: NewAttempt, policy: AdmissionPolicy) -> Result<Attempt>;

    async fn get_attempt(&self, id: Uuid) -> Result<Option<Attempt>>;

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>>;

    /// Upsert keyed by (attempt_id, question_id), applied only while the
    /// attempt is still open at `now`. A replacement keeps the original
    /// answer id.
    async fn upsert_answer(
        &self,
        attempt_id: Uuid,
        answer: NewAnswer,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome>;

    /// Terminal transition guarded by a compare-and-swap on status. `target`
    /// must be a terminal status; the final score is computed from the stored
    /// answers inside the same critical section.
    async fn finalize_attempt(
        &self,
        id: Uuid,
        target: AttemptStatus,
        now: DateTime<Utc>,
    ) -> Result<FinalizeOutcome>;

    async fn list_in_progress(&self) -> Result<Vec<Attempt>>;

    /// In-progress attempts whose deadline has passed at `now`.
    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Attempt>>;
}
