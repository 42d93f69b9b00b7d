//! Wire-level message model: what a claim returns and what a producer sends.
//!
//! The shape follows the queue's logical wire format:
//! - `attributes`: system attributes (at least `ApproximateReceiveCount`)
//! - `message_attributes`: custom typed attributes (optional `Function`)
//! - `body`: a serialized structured record

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ids::{JobType, MessageId, ReceiptHandle};

/// System attribute carrying the delivery count.
pub const APPROXIMATE_RECEIVE_COUNT: &str = "ApproximateReceiveCount";

/// System attribute carrying the enqueue time (epoch millis).
pub const SENT_TIMESTAMP: &str = "SentTimestamp";

/// Custom attribute naming the job type.
pub const FUNCTION_ATTRIBUTE: &str = "Function";

/// A typed custom attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageAttributeValue {
    pub data_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
}

impl MessageAttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            string_value: Some(value.into()),
        }
    }
}

/// A claimed message.
///
/// Messages are never mutated in place: a redelivery produces a new
/// `JobMessage` with a new receipt handle and a higher receive count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    pub message_id: MessageId,
    pub receipt_handle: ReceiptHandle,
    pub body: String,

    #[serde(default)]
    pub attributes: HashMap<String, String>,

    #[serde(default)]
    pub message_attributes: HashMap<String, MessageAttributeValue>,
}

impl JobMessage {
    /// The job type named by the `Function` attribute, if any.
    pub fn function(&self) -> Option<&str> {
        self.message_attributes
            .get(FUNCTION_ATTRIBUTE)
            .and_then(|v| v.string_value.as_deref())
    }

    /// Delivery count as maintained by the queue.
    ///
    /// A missing or non-numeric attribute reads as `1` (first delivery): the
    /// message is then retried until the count becomes readable or the job
    /// resolves, which is the conservative choice.
    pub fn approximate_receive_count(&self) -> u32 {
        match self.attributes.get(APPROXIMATE_RECEIVE_COUNT) {
            Some(raw) => match raw.parse::<u32>() {
                Ok(count) => count,
                Err(_) => {
                    tracing::warn!(
                        message_id = %self.message_id,
                        raw = %raw,
                        "unreadable receive count, assuming first delivery"
                    );
                    1
                }
            },
            None => {
                tracing::warn!(
                    message_id = %self.message_id,
                    "message carries no receive count, assuming first delivery"
                );
                1
            }
        }
    }
}

/// A message to enqueue (producer side).
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub body: String,
    pub function: Option<JobType>,
}

impl OutgoingMessage {
    /// A job message: `function` names the handler, `payload` becomes the body.
    pub fn job(function: impl Into<JobType>, payload: &serde_json::Value) -> Self {
        Self {
            body: payload.to_string(),
            function: Some(function.into()),
        }
    }

    /// A message without a `Function` attribute.
    pub fn raw(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            function: None,
        }
    }

    /// Custom attributes this message carries on the wire.
    pub fn message_attributes(&self) -> HashMap<String, MessageAttributeValue> {
        let mut attrs = HashMap::new();
        if let Some(function) = &self.function {
            attrs.insert(
                FUNCTION_ATTRIBUTE.to_string(),
                MessageAttributeValue::string(function.as_str()),
            );
        }
        attrs
    }
}
