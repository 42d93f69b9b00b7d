//! Decision model: what happens to a claimed message.
//!
//! The worker loop observes what happened to a claim (parse result, handler
//! result) and asks a `Decider` for a `Disposition`. The decider is a pure
//! function; deleting or releasing the message is the loop's job.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::{ErrorKind, JobError};
use super::outcome::Outcome;
use super::retry::RetryPolicy;

/// Why a message was resolved (and therefore deleted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Handler reported success.
    Succeeded,

    /// No job type attribute.
    Malformed,

    /// No handler registered for the job type.
    UnknownJobType,

    /// Body (or typed payload) could not be decoded.
    UndecodablePayload,

    /// Handler kept failing and the receive count passed the budget.
    RetryExhausted,
}

impl Resolution {
    pub fn is_success(self) -> bool {
        self == Resolution::Succeeded
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Succeeded => "succeeded",
            Resolution::Malformed => "malformed",
            Resolution::UnknownJobType => "unknown_job_type",
            Resolution::UndecodablePayload => "undecodable_payload",
            Resolution::RetryExhausted => "retry_exhausted",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the worker observed for one claim.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Malformed,
    Undecodable(String),
    UnknownJobType,
    Completed(Outcome),
    Failed(JobError),
}

/// The next action for a claimed message.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Resolved: delete the message.
    Delete(Resolution),

    /// Not resolved: leave it claimed so it reappears after the visibility
    /// window with a higher receive count.
    Release { reason: String },
}

impl Disposition {
    /// The `processed` flag of the claim cycle.
    pub fn is_processed(&self) -> bool {
        matches!(self, Disposition::Delete(_))
    }
}

/// Trait for deciding what happens to a claim.
///
/// Deciders are pure functions: given what was observed and the delivery
/// count, they return the disposition without side effects.
pub trait Decider: Send + Sync {
    fn decide(&self, observation: &Observation, receive_count: u32) -> Disposition;
}

/// Default decider.
///
/// - malformed, unknown job type, undecodable payload: delete, never retry
/// - success: delete
/// - failure: release, unless the receive count is past the retry budget
#[derive(Debug, Clone, Default)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    fn on_failure(&self, reason: String, receive_count: u32) -> Disposition {
        if self.retry_policy.is_exhausted(receive_count) {
            Disposition::Delete(Resolution::RetryExhausted)
        } else {
            Disposition::Release {
                reason: format!(
                    "delivery {}/{} failed: {}",
                    receive_count, self.retry_policy.max_retry_attempts, reason
                ),
            }
        }
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, observation: &Observation, receive_count: u32) -> Disposition {
        match observation {
            Observation::Malformed => Disposition::Delete(Resolution::Malformed),
            Observation::Undecodable(_) => Disposition::Delete(Resolution::UndecodablePayload),
            Observation::UnknownJobType => Disposition::Delete(Resolution::UnknownJobType),
            Observation::Completed(outcome) if outcome.is_success() => {
                Disposition::Delete(Resolution::Succeeded)
            }
            Observation::Completed(outcome) => self.on_failure(
                outcome
                    .reason
                    .clone()
                    .unwrap_or_else(|| "handler reported failure".to_string()),
                receive_count,
            ),
            Observation::Failed(err) if err.kind() == ErrorKind::Permanent => {
                Disposition::Delete(Resolution::UndecodablePayload)
            }
            Observation::Failed(err) => self.on_failure(err.to_string(), receive_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Observation::Malformed, 1)]
    #[case(Observation::Malformed, 99)]
    #[case(Observation::UnknownJobType, 1)]
    #[case(Observation::Undecodable("json decode".into()), 1)]
    #[case(Observation::Failed(JobError::Decode("missing field".into())), 1)]
    fn unresolvable_messages_are_deleted_immediately(
        #[case] observation: Observation,
        #[case] receive_count: u32,
    ) {
        let decider = DefaultDecider::default();
        assert!(decider.decide(&observation, receive_count).is_processed());
    }

    #[test]
    fn success_is_deleted() {
        let decider = DefaultDecider::default();
        assert_eq!(
            decider.decide(&Observation::Completed(Outcome::success()), 1),
            Disposition::Delete(Resolution::Succeeded)
        );
    }

    #[rstest]
    #[case(Observation::Failed(JobError::failed("boom")))]
    #[case(Observation::Failed(JobError::Panicked("boom".into())))]
    #[case(Observation::Completed(Outcome::failure("declined")))]
    fn failures_are_released_within_budget(#[case] observation: Observation) {
        let decider = DefaultDecider::new(RetryPolicy::new(5));
        for count in 1..=5 {
            assert!(matches!(
                decider.decide(&observation, count),
                Disposition::Release { .. }
            ));
        }
        assert_eq!(
            decider.decide(&observation, 6),
            Disposition::Delete(Resolution::RetryExhausted)
        );
    }

    #[test]
    fn release_reason_mentions_delivery() {
        let decider = DefaultDecider::new(RetryPolicy::new(5));
        let Disposition::Release { reason } =
            decider.decide(&Observation::Failed(JobError::failed("boom")), 2)
        else {
            panic!("expected release");
        };
        assert!(reason.contains("2/5"));
        assert!(reason.contains("boom"));
    }
}
