//! Domain model (ids, messages, envelopes, outcomes, decisions, retry policy).

pub mod decision;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod message;
pub mod outcome;
pub mod retry;

pub use decision::{Decider, DefaultDecider, Disposition, Observation, Resolution};
pub use envelope::{JobEnvelope, Parsed, Payload};
pub use errors::{ErrorKind, JobError};
pub use ids::{JobType, MessageId, ReceiptHandle};
pub use message::{JobMessage, MessageAttributeValue, OutgoingMessage};
pub use outcome::{Outcome, OutcomeKind};
pub use retry::{Backoff, RetryPolicy};
