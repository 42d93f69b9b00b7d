//! JobEnvelope - ディスパッチに渡す解析済みのジョブ
//!
//! `JobMessage`（ワイヤ形式）から `Function` 属性と body を取り出し、
//! handler が扱える形にします。

use serde_json::{Map, Value};

use super::ids::{JobType, MessageId};
use super::message::JobMessage;

/// Structured record deserialized from a message body.
pub type Payload = Map<String, Value>;

/// JobType + Payload (+ delivery metadata) for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct JobEnvelope {
    message_id: MessageId,
    job_type: JobType,
    payload: Payload,
    receive_count: u32,
}

/// Result of parsing a claimed message.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// Job type present and body decoded.
    Job(JobEnvelope),

    /// No `Function` attribute.
    Malformed,

    /// Job type present but the body is not a structured record.
    Undecodable { job_type: JobType, error: String },
}

impl JobEnvelope {
    pub fn new(
        message_id: MessageId,
        job_type: JobType,
        payload: Payload,
        receive_count: u32,
    ) -> Self {
        Self {
            message_id,
            job_type,
            payload,
            receive_count,
        }
    }

    /// Parse a claimed message.
    pub fn parse(message: &JobMessage) -> Parsed {
        let Some(function) = message.function() else {
            return Parsed::Malformed;
        };
        let job_type = JobType::new(function);

        match serde_json::from_str::<Value>(&message.body) {
            Ok(Value::Object(payload)) => Parsed::Job(Self::new(
                message.message_id.clone(),
                job_type,
                payload,
                message.approximate_receive_count(),
            )),
            Ok(other) => Parsed::Undecodable {
                job_type,
                error: format!("body is not a record: {}", json_kind(&other)),
            },
            Err(e) => Parsed::Undecodable {
                job_type,
                error: format!("json decode: {e}"),
            },
        }
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn job_type(&self) -> &JobType {
        &self.job_type
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn receive_count(&self) -> u32 {
        self.receive_count
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
