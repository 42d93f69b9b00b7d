//! Outcome model: what a handler reports back for one execution.
//!
//! This module is transport-agnostic: it does not know about queues or
//! receipt handles. The decider turns an outcome into a disposition.

use serde::{Deserialize, Serialize};

/// Classification of a handler result.
///
/// Serialized as SCREAMING_SNAKE_CASE (SUCCESS / FAILURE) for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Success,
    Failure,
}

/// Result of a handler that ran to completion.
///
/// - `SUCCESS`: the job is done; the message will be deleted.
/// - `FAILURE`: the handler declined (the `false` return); the message is
///   released for redelivery, same as a raised error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub kind: OutcomeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            kind: OutcomeKind::Success,
            reason: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Failure,
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }
}

impl From<bool> for Outcome {
    fn from(processed: bool) -> Self {
        if processed {
            Self::success()
        } else {
            Self::failure("handler reported failure")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_kind_serializes_as_required_names() {
        let s = serde_json::to_string(&OutcomeKind::Success).unwrap();
        assert_eq!(s, "\"SUCCESS\"");

        let s = serde_json::to_string(&OutcomeKind::Failure).unwrap();
        assert_eq!(s, "\"FAILURE\"");
    }

    #[test]
    fn bool_maps_to_outcome() {
        assert!(Outcome::from(true).is_success());
        let failed = Outcome::from(false);
        assert_eq!(failed.kind, OutcomeKind::Failure);
        assert!(failed.reason.is_some());
    }
}
