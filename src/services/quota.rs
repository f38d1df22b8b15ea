use crate::error::{Error, Result};
use crate::models::test::TestDefinition;
use chrono::{DateTime, Utc};

/// Admission rules snapshotted from the test definition. Pure data so both
/// store implementations can evaluate the predicate inside their own
/// critical section.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    pub max_attempts: i32,
    pub is_published: bool,
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,
}

impl AdmissionPolicy {
    pub fn of(test: &TestDefinition) -> Self {
        Self {
            max_attempts: test.max_attempts,
            is_published: test.is_published,
            available_from: test.available_from,
            available_until: test.available_until,
        }
    }
}

/// Decides whether a new attempt may be created. Stateless; the caller
/// supplies the prior attempt count and open-attempt flag it read under the
/// same lock or transaction that performs the insert. Evaluating this
/// against an earlier read reopens the double-start race.
pub fn evaluate(
    policy: &AdmissionPolicy,
    prior_attempts: i64,
    has_open_attempt: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    if !policy.is_published {
        return Err(Error::NotAvailable("Test is not published".to_string()));
    }
    if let Some(from) = policy.available_from {
        if now < from {
            return Err(Error::NotAvailable(
                "Test is not yet available".to_string(),
            ));
        }
    }
    if let Some(until) = policy.available_until {
        if now > until {
            return Err(Error::NotAvailable(
                "Test is no longer available".to_string(),
            ));
        }
    }
    if has_open_attempt {
        return Err(Error::AlreadyInProgress(
            "An attempt for this test is already in progress".to_string(),
        ));
    }
    if prior_attempts >= policy.max_attempts as i64 {
        return Err(Error::QuotaExceeded(format!(
            "Maximum of {} attempts reached for this test",
            policy.max_attempts
        )));
    }
    Ok(())
}
