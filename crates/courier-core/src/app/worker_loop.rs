//! WorkerLoop - ジョブ実行ループ
//!
//! # フロー（1 iteration = `tick`）
//! 1. QueueService::receive() で最大 1 件を claim（visibility window 開始）
//! 2. `Function` 属性と body を解析 → JobEnvelope
//! 3. Dispatcher で handler 実行 → Observation
//! 4. Decider で Disposition を決定（retry 予算もここ）
//! 5. Delete なら dead-letter に記録してから QueueService::delete()
//!    Release なら何もしない（window 切れで再配送される）
//!
//! メッセージは 1 件ずつ処理し、内部で並行実行はしません。
//! スケールアウトはプロセスを増やして行います。

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use super::dispatcher::Dispatcher;
use super::shutdown::ShutdownSignal;
use super::status::WorkerStats;
use crate::config::WorkerConfig;
use crate::domain::{
    Decider, Disposition, JobEnvelope, JobMessage, Observation, Parsed, Resolution,
};
use crate::ports::{DeadLetterSink, DeleteOutcome, QueueError, QueueService, ReceiveRequest};

/// Delete calls per claim before giving up on a transient failure.
const DELETE_ATTEMPTS: u32 = 3;

/// Result of one iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// No message within the long-poll wait.
    Idle,

    /// Message resolved and deleted.
    Deleted(Resolution),

    /// Message left for redelivery.
    Released,

    /// Receive or delete failed; talk to the queue again after `retry_in`.
    TransportError { retry_in: Duration },

    /// The queue will never serve again.
    QueueClosed,
}

pub struct WorkerLoop {
    queue: Arc<dyn QueueService>,
    dispatcher: Dispatcher,
    decider: Arc<dyn Decider>,
    dead_letters: Arc<dyn DeadLetterSink>,
    config: WorkerConfig,
    stats: WorkerStats,
    consecutive_transport_errors: u32,
}

impl WorkerLoop {
    pub fn new(
        queue: Arc<dyn QueueService>,
        dispatcher: Dispatcher,
        decider: Arc<dyn Decider>,
        dead_letters: Arc<dyn DeadLetterSink>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            decider,
            dead_letters,
            config,
            stats: WorkerStats::default(),
            consecutive_transport_errors: 0,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Run until shutdown is requested. Returns the final counters.
    ///
    /// Shutdown is checked before every claim and raced against the long
    /// poll. A handler that is already running is never interrupted.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> WorkerStats {
        tracing::info!(
            visibility_timeout = ?self.config.visibility_timeout,
            wait_time = ?self.config.wait_time,
            max_retry_attempts = self.config.retry.max_retry_attempts,
            handlers = ?self.dispatcher.registry().registered_types(),
            "starting job worker, waiting for jobs"
        );

        loop {
            if shutdown.is_triggered() {
                break;
            }

            let claimed = tokio::select! {
                _ = shutdown.wait() => break,
                claimed = self.claim() => claimed,
            };

            match self.settle(claimed).await {
                Tick::TransportError { retry_in } => {
                    tokio::select! {
                        _ = shutdown.wait() => break,
                        _ = tokio::time::sleep(retry_in) => {},
                    }
                }
                Tick::QueueClosed => {
                    tracing::info!("queue closed, stopping worker");
                    break;
                }
                Tick::Idle if self.config.wait_time.is_zero() => {
                    tokio::task::yield_now().await;
                }
                _ => {}
            }
        }

        tracing::info!(stats = ?self.stats, "job worker stopped");
        self.stats
    }

    /// Run exactly one claim/dispatch/resolve/acknowledge cycle.
    pub async fn tick(&mut self) -> Tick {
        let claimed = self.claim().await;
        self.settle(claimed).await
    }

    async fn claim(&self) -> Result<Option<JobMessage>, QueueError> {
        let request =
            ReceiveRequest::single(self.config.visibility_timeout, self.config.wait_time);
        self.queue.receive(&request).await
    }

    async fn settle(&mut self, claimed: Result<Option<JobMessage>, QueueError>) -> Tick {
        let message = match claimed {
            Ok(Some(message)) => message,
            Ok(None) => {
                self.consecutive_transport_errors = 0;
                self.stats.idle_polls += 1;
                return Tick::Idle;
            }
            Err(QueueError::Closed) => return Tick::QueueClosed,
            Err(e) => return self.transport_error("receive", &e),
        };
        self.consecutive_transport_errors = 0;
        self.stats.received += 1;

        let receive_count = message.approximate_receive_count();
        let span = tracing::info_span!(
            "job",
            message_id = %message.message_id,
            job_type = message.function().unwrap_or("-"),
            receive_count,
        );
        self.process(message, receive_count).instrument(span).await
    }

    async fn process(&mut self, message: JobMessage, receive_count: u32) -> Tick {
        tracing::info!("got message");

        let observation = match JobEnvelope::parse(&message) {
            Parsed::Malformed => {
                tracing::warn!("no function provided in message, deleting invalid request");
                Observation::Malformed
            }
            Parsed::Undecodable { job_type, error } => {
                tracing::warn!(%job_type, %error, "message body is not a job record");
                Observation::Undecodable(error)
            }
            Parsed::Job(envelope) => {
                tracing::info!(job_type = %envelope.job_type(), "calling function");
                let observation = Observation::from(self.dispatcher.execute(&envelope).await);
                match &observation {
                    Observation::UnknownJobType => tracing::warn!(
                        job_type = %envelope.job_type(),
                        "job references unknown function, deleting"
                    ),
                    Observation::Failed(err) => {
                        self.stats.handler_failures += 1;
                        tracing::warn!(job_type = %envelope.job_type(), error = %err, "job failed");
                    }
                    Observation::Completed(outcome) if !outcome.is_success() => {
                        self.stats.handler_failures += 1;
                        tracing::warn!(
                            job_type = %envelope.job_type(),
                            reason = outcome.reason.as_deref().unwrap_or("-"),
                            "job reported failure"
                        );
                    }
                    _ => {}
                }
                observation
            }
        };

        match self.decider.decide(&observation, receive_count) {
            Disposition::Release { reason } => {
                tracing::info!(%reason, "leaving message for redelivery");
                self.stats.released += 1;
                Tick::Released
            }
            Disposition::Delete(resolution) => {
                if resolution == Resolution::RetryExhausted {
                    tracing::warn!(
                        max_retry_attempts = self.config.retry.max_retry_attempts,
                        "message crossed max retry attempts, deleting"
                    );
                }
                if !resolution.is_success() {
                    if let Err(e) = self.dead_letters.record(&message, resolution).await {
                        tracing::error!(error = %e, "dead-letter sink failed, deleting anyway");
                    }
                }
                self.acknowledge(&message, resolution).await
            }
        }
    }

    /// Delete the claim. Transient failures are retried with backoff while
    /// the visibility window still has room.
    async fn acknowledge(&mut self, message: &JobMessage, resolution: Resolution) -> Tick {
        let mut attempt = 1;
        let mut waited = Duration::ZERO;
        let outcome = loop {
            match self.queue.delete(&message.receipt_handle).await {
                Ok(outcome) => break outcome,
                Err(QueueError::Closed) => return Tick::QueueClosed,
                Err(e) => {
                    let delay = self.config.backoff.jittered_delay(attempt);
                    if !e.is_transient()
                        || attempt >= DELETE_ATTEMPTS
                        || waited.saturating_add(delay) >= self.config.visibility_timeout
                    {
                        return self.transport_error("delete", &e);
                    }
                    tracing::warn!(error = %e, attempt, retry_in = ?delay, "delete failed, retrying");
                    tokio::time::sleep(delay).await;
                    waited += delay;
                    attempt += 1;
                }
            }
        };

        match outcome {
            DeleteOutcome::Removed => {
                tracing::info!(%resolution, "deleted message");
            }
            DeleteOutcome::AlreadyGone => {
                tracing::info!(%resolution, "message already gone, nothing to delete");
            }
        }
        self.stats.record_deleted(resolution);
        Tick::Deleted(resolution)
    }

    fn transport_error(&mut self, operation: &'static str, error: &QueueError) -> Tick {
        self.consecutive_transport_errors += 1;
        self.stats.transport_errors += 1;

        let transient = error.is_transient();
        let retry_in = if transient {
            self.config
                .backoff
                .jittered_delay(self.consecutive_transport_errors)
        } else {
            self.config.backoff.max_delay
        };
        tracing::error!(
            operation,
            %error,
            transient,
            failures = self.consecutive_transport_errors,
            ?retry_in,
            "queue call failed"
        );
        Tick::TransportError { retry_in }
    }
}
