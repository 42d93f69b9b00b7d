//! Built-in demo handlers so the binary is runnable against a local queue.

use async_trait::async_trait;
use courier_core::typed::RegistryError;
use courier_core::{FnHandler, Handler, Job, JobError, Outcome, Payload, WorkerBuilder};
use serde::{Deserialize, Serialize};

/// `echo`: logs `message` and succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Echo {
    pub message: String,
}

impl Job for Echo {
    const TYPE: &'static str = "echo";
}

pub struct EchoHandler;

#[async_trait]
impl Handler<Echo> for EchoHandler {
    async fn handle(&self, job: Echo) -> Result<Outcome, JobError> {
        tracing::info!(message = %job.message, "echo");
        Ok(Outcome::success())
    }
}

pub const LOG_PAYLOAD: &str = "log_payload";

async fn log_payload(payload: Payload) -> Result<Outcome, JobError> {
    tracing::info!(payload = %serde_json::Value::Object(payload), "log_payload");
    Ok(Outcome::success())
}

/// Register every built-in handler on `builder`.
pub fn install(builder: WorkerBuilder) -> Result<WorkerBuilder, RegistryError> {
    builder
        .register::<Echo, _>(EchoHandler)?
        .register_dyn(FnHandler::new(LOG_PAYLOAD, log_payload))
}

