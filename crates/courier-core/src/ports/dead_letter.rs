//! DeadLetterSink port - 成功せずに削除されるメッセージの記録
//!
//! 削除の直前に呼ばれます。失敗してもログに残すだけで、削除は続行します。

use async_trait::async_trait;

use crate::domain::{JobMessage, Resolution};

#[derive(Debug, thiserror::Error)]
#[error("dead-letter sink failed: {0}")]
pub struct DeadLetterError(pub String);

/// DeadLetterSink は放棄されるメッセージを受け取る
///
/// 呼ばれるのは `resolution.is_success() == false` のときだけ:
/// malformed, unknown job type, undecodable payload, retry exhausted.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn record(
        &self,
        message: &JobMessage,
        resolution: Resolution,
    ) -> Result<(), DeadLetterError>;
}
