use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::catalog::TestCatalog;
use crate::error::{Error, Result};
use crate::models::answer::{Answer, NewAnswer};
use crate::models::attempt::{Attempt, AttemptStatus, CompletionSummary};
use crate::services::broadcast_service::{
    attempt_channel, Broadcaster, ADMIN_CHANNEL, EVENT_ANSWER_SUBMITTED, EVENT_ATTEMPT_COMPLETED,
    EVENT_ATTEMPT_STARTED,
};
use crate::services::grading_service::GradingService;
use crate::services::quota::AdmissionPolicy;
use crate::store::{AttemptStore, FinalizeOutcome, NewAttempt, UpsertOutcome};
use crate::utils::time::Clock;

/// Owns the attempt state machine: IN_PROGRESS -> COMPLETED (user) or
/// IN_PROGRESS -> TIMED_OUT (deadline), both terminal. All transitions go
/// through the store's conditional writes; events are emitted only after a
/// write actually happened, and only by the caller whose write won.
#[derive(Clone)]
pub struct AttemptLifecycle {
    store: Arc<dyn AttemptStore>,
    catalog: Arc<dyn TestCatalog>,
    broadcaster: Broadcaster,
    clock: Arc<dyn Clock>,
}

impl AttemptLifecycle {
    pub fn new(
        store: Arc<dyn AttemptStore>,
        catalog: Arc<dyn TestCatalog>,
        broadcaster: Broadcaster,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            catalog,
            broadcaster,
            clock,
        }
    }

    /// Creates a new attempt. Admission (published, availability window,
    /// quota, no open attempt) is evaluated inside the store's atomic
    /// insert, so two racing starts cannot both pass the check.
    pub async fn start(&self, user_id: Uuid, test_id: Uuid) -> Result<Attempt> {
        let test = self
            .catalog
            .test_snapshot(test_id)
            .await?
            .ok_or_else(|| Error::TestNotFound(test_id.to_string()))?;

        let now = self.clock.now();
        let expires_at = test
            .duration_seconds
            .map(|secs| now + chrono::Duration::seconds(secs));
        let policy = AdmissionPolicy::of(&test);
        let max_score = test.max_score();

        let attempt = self
            .store
            .insert_attempt(
                NewAttempt {
                    user_id,
                    test_id,
                    started_at: now,
                    expires_at,
                    max_score,
                    questions: test.questions,
                },
                policy,
            )
            .await?;

        tracing::info!(
            "Attempt {} started: user {} test {} (attempt #{})",
            attempt.id,
            user_id,
            test_id,
            attempt.attempt_number
        );
        self.broadcaster.publish(
            ADMIN_CHANNEL,
            EVENT_ATTEMPT_STARTED,
            json!({
                "attempt_id": attempt.id,
                "user_id": attempt.user_id,
                "test_id": attempt.test_id,
                "attempt_number": attempt.attempt_number,
                "started_at": attempt.started_at,
                "expires_at": attempt.expires_at,
            }),
        );
        Ok(attempt)
    }

    /// Grades and upserts one answer. Late calls force the deadline
    /// transition first and then fail: an expired attempt never stores or
    /// scores an answer.
    pub async fn submit_answer(
        &self,
        attempt_id: Uuid,
        caller_user_id: Uuid,
        question_id: Uuid,
        option_id: Option<Uuid>,
        text_answer: Option<String>,
    ) -> Result<(Answer, usize)> {
        let attempt = self.fetch(attempt_id).await?;
        if attempt.user_id != caller_user_id {
            return Err(Error::AccessDenied(
                "You do not own this attempt".to_string(),
            ));
        }
        if attempt.status.is_terminal() {
            return Err(Error::AttemptExpired(
                "Attempt is already finished".to_string(),
            ));
        }
        let now = self.clock.now();
        if attempt.deadline_passed(now) {
            self.force_expire(attempt_id, now).await?;
            return Err(Error::AttemptExpired(
                "Attempt deadline has passed".to_string(),
            ));
        }

        let question = attempt
            .question(question_id)
            .ok_or_else(|| Error::QuestionNotFound(question_id.to_string()))?;
        let grade = GradingService::grade(question, option_id, text_answer.as_deref())?;

        let outcome = self
            .store
            .upsert_answer(
                attempt_id,
                NewAnswer {
                    question_id,
                    option_id,
                    text_answer,
                    is_correct: grade.is_correct,
                    points_earned: grade.points_earned,
                },
                now,
            )
            .await?;

        match outcome {
            UpsertOutcome::Stored {
                answer,
                answered_count,
            } => {
                tracing::info!(
                    "Answer stored for attempt {} question {} ({} answered)",
                    attempt_id,
                    question_id,
                    answered_count
                );
                // Activity only; grading results stay out of the event.
                self.publish_both(
                    attempt_id,
                    EVENT_ANSWER_SUBMITTED,
                    json!({
                        "attempt_id": attempt_id,
                        "question_id": question_id,
                        "answered_count": answered_count,
                        "submitted_at": answer.submitted_at,
                    }),
                );
                Ok((answer, answered_count))
            }
            UpsertOutcome::Closed { attempt } => {
                // Lost a race with the deadline or a finalize.
                if attempt.status == AttemptStatus::InProgress {
                    self.force_expire(attempt_id, now).await?;
                }
                Err(Error::AttemptExpired(
                    "Attempt deadline has passed".to_string(),
                ))
            }
        }
    }

    /// Finalizes an attempt. Idempotent: an already-terminal attempt is
    /// returned unchanged with its summary, and no second event is emitted.
    pub async fn complete(
        &self,
        attempt_id: Uuid,
        caller_user_id: Uuid,
    ) -> Result<(Attempt, CompletionSummary, Vec<Answer>)> {
        let attempt = self.fetch(attempt_id).await?;
        if attempt.user_id != caller_user_id {
            return Err(Error::AccessDenied(
                "You do not own this attempt".to_string(),
            ));
        }

        let now = self.clock.now();
        let target = if attempt.deadline_passed(now) {
            AttemptStatus::TimedOut
        } else {
            AttemptStatus::Completed
        };

        match self.store.finalize_attempt(attempt_id, target, now).await? {
            FinalizeOutcome::Finalized { attempt, answers } => {
                let summary = CompletionSummary::compute(&attempt.questions, &answers);
                tracing::info!(
                    "Attempt {} finalized as {} with score {}/{}",
                    attempt.id,
                    attempt.status.as_str(),
                    attempt.score,
                    attempt.max_score
                );
                self.publish_completed(&attempt);
                Ok((attempt, summary, answers))
            }
            FinalizeOutcome::AlreadyTerminal { attempt, answers } => {
                let summary = CompletionSummary::compute(&attempt.questions, &answers);
                Ok((attempt, summary, answers))
            }
        }
    }

    /// Current state plus submitted answers, for the owner or an admin.
    pub async fn attempt_detail(
        &self,
        attempt_id: Uuid,
        caller_user_id: Uuid,
        caller_is_admin: bool,
    ) -> Result<(Attempt, Vec<Answer>)> {
        let attempt = self.fetch(attempt_id).await?;
        if attempt.user_id != caller_user_id && !caller_is_admin {
            return Err(Error::AccessDenied(
                "You do not own this attempt".to_string(),
            ));
        }
        let answers = self.store.list_answers(attempt_id).await?;
        Ok((attempt, answers))
    }

    /// Whole seconds left before the deadline. None for untimed attempts
    /// whatever their status, zero once terminal or past the deadline. Pure
    /// read: the transition itself is left to submit/complete or the
    /// sweeper.
    pub async fn remaining_time(
        &self,
        attempt_id: Uuid,
        caller_user_id: Uuid,
        caller_is_admin: bool,
    ) -> Result<(Attempt, Option<i64>)> {
        let attempt = self.fetch(attempt_id).await?;
        if attempt.user_id != caller_user_id && !caller_is_admin {
            return Err(Error::AccessDenied(
                "You do not own this attempt".to_string(),
            ));
        }
        let Some(expires) = attempt.expires_at else {
            return Ok((attempt, None));
        };
        if attempt.status.is_terminal() {
            return Ok((attempt, Some(0)));
        }
        let now = self.clock.now();
        let remaining = (expires - now).num_seconds().max(0);
        Ok((attempt, Some(remaining)))
    }

    pub async fn list_live(&self) -> Result<Vec<Attempt>> {
        self.store.list_in_progress().await
    }

    /// One sweep pass: forces TIMED_OUT on every in-progress attempt whose
    /// deadline has passed. Lost races are skipped silently; per-attempt
    /// failures are logged and do not stop the pass.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let overdue = self.store.list_expired(now).await?;
        let mut expired = 0;
        for stale in overdue {
            match self.force_expire(stale.id, now).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(e) => tracing::error!("Failed to expire attempt {}: {:?}", stale.id, e),
            }
        }
        Ok(expired)
    }

    /// Applies the deadline transition through the same status CAS as a
    /// user-initiated complete. Returns whether this call actually won the
    /// transition.
    async fn force_expire(&self, attempt_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        match self
            .store
            .finalize_attempt(attempt_id, AttemptStatus::TimedOut, now)
            .await?
        {
            FinalizeOutcome::Finalized { attempt, .. } => {
                tracing::info!("Attempt {} timed out", attempt.id);
                self.publish_completed(&attempt);
                Ok(true)
            }
            FinalizeOutcome::AlreadyTerminal { .. } => Ok(false),
        }
    }

    fn publish_completed(&self, attempt: &Attempt) {
        self.publish_both(
            attempt.id,
            EVENT_ATTEMPT_COMPLETED,
            json!({
                "attempt_id": attempt.id,
                "user_id": attempt.user_id,
                "test_id": attempt.test_id,
                "status": attempt.status,
                "score": attempt.score,
                "max_score": attempt.max_score,
                "percent_score": attempt.percent_score,
                "completed_at": attempt.completed_at,
            }),
        );
    }

    fn publish_both(&self, attempt_id: Uuid, event: &str, payload: JsonValue) {
        self.broadcaster
            .publish(&attempt_channel(attempt_id), event, payload.clone());
        self.broadcaster.publish(ADMIN_CHANNEL, event, payload);
    }

    async fn fetch(&self, attempt_id: Uuid) -> Result<Attempt> {
        self.store
            .get_attempt(attempt_id)
            .await?
            .ok_or_else(|| Error::AttemptNotFound(attempt_id.to_string()))
    }
}
