use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::answer::{Answer, NewAnswer};
use crate::models::attempt::{Attempt, AttemptStatus, FinalGrade};
use crate::services::quota::{self, AdmissionPolicy};

use super::{AttemptStore, FinalizeOutcome, NewAttempt, UpsertOutcome};

#[derive(Default)]
struct Inner {
    attempts: HashMap<Uuid, Attempt>,
    answers: HashMap<Uuid, Vec<Answer>>,
    by_user_test: HashMap<(Uuid, Uuid), Vec<Uuid>>,
}

/// Map-backed store used by tests and DATABASE_URL-less deployments.
/// Critical sections are short, synchronous and never held across an await,
/// so a single mutex gives the same atomicity the Postgres store gets from
/// row locks.
#[derive(Default)]
pub struct MemoryAttemptStore {
    inner: Mutex<Inner>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn insert_attempt(&self, new: NewAttempt, policy: AdmissionPolicy) -> Result<Attempt> {
        let mut guard = self.inner.lock().expect("attempt store mutex poisoned");
        let inner = &mut *guard;

        let key = (new.user_id, new.test_id);
        let prior_ids = inner.by_user_test.get(&key).cloned().unwrap_or_default();
        let has_open = prior_ids.iter().any(|id| {
            inner
                .attempts
                .get(id)
                .map_or(false, |a| a.status == AttemptStatus::InProgress)
        });
        quota::evaluate(&policy, prior_ids.len() as i64, has_open, new.started_at)?;

        let attempt = Attempt {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            test_id: new.test_id,
            attempt_number: prior_ids.len() as i32 + 1,
            status: AttemptStatus::InProgress,
            started_at: new.started_at,
            expires_at: new.expires_at,
            completed_at: None,
            score: 0,
            max_score: new.max_score,
            percent_score: None,
            time_spent_seconds: None,
            questions: new.questions,
        };
        inner.by_user_test.entry(key).or_default().push(attempt.id);
        inner.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn get_attempt(&self, id: Uuid) -> Result<Option<Attempt>> {
        let guard = self.inner.lock().expect("attempt store mutex poisoned");
        Ok(guard.attempts.get(&id).cloned())
    }

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>> {
        let guard = self.inner.lock().expect("attempt store mutex poisoned");
        Ok(guard.answers.get(&attempt_id).cloned().unwrap_or_default())
    }

    async fn upsert_answer(
        &self,
        attempt_id: Uuid,
        answer: NewAnswer,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let mut guard = self.inner.lock().expect("attempt store mutex poisoned");
        let inner = &mut *guard;

        let attempt = inner
            .attempts
            .get(&attempt_id)
            .ok_or_else(|| Error::AttemptNotFound(attempt_id.to_string()))?;
        if attempt.status.is_terminal() || attempt.deadline_passed(now) {
            return Ok(UpsertOutcome::Closed {
                attempt: attempt.clone(),
            });
        }

        let answers = inner.answers.entry(attempt_id).or_default();
        let stored = match answers
            .iter_mut()
            .find(|a| a.question_id == answer.question_id)
        {
            Some(existing) => {
                existing.option_id = answer.option_id;
                existing.text_answer = answer.text_answer;
                existing.is_correct = answer.is_correct;
                existing.points_earned = answer.points_earned;
                existing.submitted_at = now;
                existing.clone()
            }
            None => {
                let created = Answer {
                    id: Uuid::new_v4(),
                    attempt_id,
                    question_id: answer.question_id,
                    option_id: answer.option_id,
                    text_answer: answer.text_answer,
                    is_correct: answer.is_correct,
                    points_earned: answer.points_earned,
                    submitted_at: now,
                };
                answers.push(created.clone());
                created
            }
        };

        Ok(UpsertOutcome::Stored {
            answer: stored,
            answered_count: answers.len(),
        })
    }

    async fn finalize_attempt(
        &self,
        id: Uuid,
        target: AttemptStatus,
        now: DateTime<Utc>,
    ) -> Result<FinalizeOutcome> {
        let mut guard = self.inner.lock().expect("attempt store mutex poisoned");
        let inner = &mut *guard;

        let answers = inner.answers.get(&id).cloned().unwrap_or_default();
        let attempt = inner
            .attempts
            .get_mut(&id)
            .ok_or_else(|| Error::AttemptNotFound(id.to_string()))?;
        if attempt.status.is_terminal() {
            return Ok(FinalizeOutcome::AlreadyTerminal {
                attempt: attempt.clone(),
                answers,
            });
        }

        let grade = FinalGrade::compute(attempt, &answers, now);
        attempt.status = target;
        attempt.completed_at = Some(now);
        attempt.score = grade.score;
        attempt.percent_score = Some(grade.percent_score);
        attempt.time_spent_seconds = Some(grade.time_spent_seconds);

        Ok(FinalizeOutcome::Finalized {
            attempt: attempt.clone(),
            answers,
        })
    }

    async fn list_in_progress(&self) -> Result<Vec<Attempt>> {
        let guard = self.inner.lock().expect("attempt store mutex poisoned");
        let mut live: Vec<Attempt> = guard
            .attempts
            .values()
            .filter(|a| a.status == AttemptStatus::InProgress)
            .cloned()
            .collect();
        live.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(live)
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Attempt>> {
        let guard = self.inner.lock().expect("attempt store mutex poisoned");
        let mut overdue: Vec<Attempt> = guard
            .attempts
            .values()
            .filter(|a| a.status == AttemptStatus::InProgress && a.deadline_passed(now))
            .cloned()
            .collect();
        overdue.sort_by_key(|a| a.expires_at);
        Ok(overdue)
    }
}
