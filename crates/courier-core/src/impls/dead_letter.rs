//! LogDeadLetters - 放棄したメッセージをログに残すだけの DeadLetterSink

use async_trait::async_trait;

use crate::domain::{JobMessage, Resolution};
use crate::ports::{DeadLetterError, DeadLetterSink};

/// Default sink: a structured `warn` event per abandoned message.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDeadLetters;

#[async_trait]
impl DeadLetterSink for LogDeadLetters {
    async fn record(
        &self,
        message: &JobMessage,
        resolution: Resolution,
    ) -> Result<(), DeadLetterError> {
        tracing::warn!(
            message_id = %message.message_id,
            function = message.function().unwrap_or("-"),
            resolution = %resolution,
            body = %message.body,
            "dropping message without success"
        );
        Ok(())
    }
}
