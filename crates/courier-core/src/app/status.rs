//! Status - worker ごとのカウンタ
//!
//! ループは単一スレッドで回るので、ただの u64 で足ります。

use serde::{Deserialize, Serialize};

use crate::domain::Resolution;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    /// Messages claimed.
    pub received: u64,

    /// Receives that returned nothing.
    pub idle_polls: u64,

    /// Handler raised, panicked or declined.
    pub handler_failures: u64,

    /// Left undeleted for redelivery.
    pub released: u64,

    pub succeeded: u64,
    pub malformed: u64,
    pub unknown_job_type: u64,
    pub undecodable: u64,
    pub retry_exhausted: u64,

    /// Receive or delete calls that failed.
    pub transport_errors: u64,
}

impl WorkerStats {
    pub fn record_deleted(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Succeeded => self.succeeded += 1,
            Resolution::Malformed => self.malformed += 1,
            Resolution::UnknownJobType => self.unknown_job_type += 1,
            Resolution::UndecodablePayload => self.undecodable += 1,
            Resolution::RetryExhausted => self.retry_exhausted += 1,
        }
    }

    /// Messages deleted for any reason.
    pub fn deleted(&self) -> u64 {
        self.succeeded
            + self.malformed
            + self.unknown_job_type
            + self.undecodable
            + self.retry_exhausted
    }
}
