//! Dispatcher - job type から handler を引いて実行する
//!
//! handler のエラーも panic もここで捕まえます。ループまで伝播させません。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::domain::{JobEnvelope, JobError, Observation, Outcome};
use crate::typed::JobRegistry;

/// What happened when a job was dispatched.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    /// Handler ran to completion.
    Completed(Outcome),

    /// Handler raised (or panicked).
    Failed(JobError),

    /// No handler registered for the job type.
    UnknownJobType,
}

impl From<DispatchResult> for Observation {
    fn from(result: DispatchResult) -> Self {
        match result {
            DispatchResult::Completed(outcome) => Observation::Completed(outcome),
            DispatchResult::Failed(err) => Observation::Failed(err),
            DispatchResult::UnknownJobType => Observation::UnknownJobType,
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<JobRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Execute one envelope.
    pub async fn execute(&self, envelope: &JobEnvelope) -> DispatchResult {
        let Some(handler) = self.registry.get(envelope.job_type()) else {
            return DispatchResult::UnknownJobType;
        };

        match AssertUnwindSafe(handler.handle_dyn(envelope.payload()))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => DispatchResult::Completed(outcome),
            Ok(Err(err)) => DispatchResult::Failed(err),
            Err(panic) => DispatchResult::Failed(JobError::Panicked(panic_message(panic.as_ref()))),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
