//! QueueService port - 配送キュー（SQS 互換 または InMemory）
//!
//! worker loop が依存するのはこの抽象契約だけです。
//! 認証・エンドポイント選択などの転送路の詳細は実装側に閉じ込めます。
//!
//! # 実装
//! - `impls::InMemoryQueue`: 開発・テスト用のエミュレータ
//! - `impls::SqsQueue`: SQS JSON プロトコルのクライアント

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{JobMessage, MessageId, OutgoingMessage, ReceiptHandle};

/// Attribute selector for a receive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeSelection {
    All,
    Named(Vec<String>),
}

impl AttributeSelection {
    pub fn names(&self) -> Vec<String> {
        match self {
            AttributeSelection::All => vec!["All".to_string()],
            AttributeSelection::Named(names) => names.clone(),
        }
    }
}

/// Parameters of one claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRequest {
    /// The worker loop always claims a single message.
    pub max_messages: u32,

    /// How long the claimed message stays hidden from other receivers.
    pub visibility_timeout: Duration,

    /// How long to block when the queue is empty.
    pub wait_time: Duration,

    pub attribute_names: AttributeSelection,
    pub message_attribute_names: AttributeSelection,
}

impl ReceiveRequest {
    /// Longest visibility window SQS accepts (12 hours).
    pub const MAX_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(43_200);

    /// Longest long-poll wait SQS accepts.
    pub const MAX_WAIT_TIME: Duration = Duration::from_secs(20);

    /// Claim one message, requesting all system and custom attributes.
    pub fn single(visibility_timeout: Duration, wait_time: Duration) -> Self {
        Self {
            max_messages: 1,
            visibility_timeout,
            wait_time,
            attribute_names: AttributeSelection::All,
            message_attribute_names: AttributeSelection::All,
        }
    }

    /// Reject windows and waits the queue service would refuse.
    pub fn check_limits(&self) -> Result<(), QueueError> {
        if self.visibility_timeout > Self::MAX_VISIBILITY_TIMEOUT {
            return Err(QueueError::InvalidRequest(format!(
                "visibility timeout {:?} exceeds {:?}",
                self.visibility_timeout,
                Self::MAX_VISIBILITY_TIMEOUT
            )));
        }
        if self.wait_time > Self::MAX_WAIT_TIME {
            return Err(QueueError::InvalidRequest(format!(
                "wait time {:?} exceeds {:?}",
                self.wait_time,
                Self::MAX_WAIT_TIME
            )));
        }
        Ok(())
    }
}

/// Result of a delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The claim was current and the message is gone.
    Removed,

    /// The handle was stale, expired or already used. Not an error.
    AlreadyGone,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("queue service returned {status}: {code}: {message}")]
    Http {
        status: u16,
        code: String,
        message: String,
    },

    #[error("unexpected response from queue service: {0}")]
    Decode(String),

    #[error("unsupported queue url: {0}")]
    UnsupportedUrl(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("queue is closed")]
    Closed,
}

impl QueueError {
    /// Worth retrying the same call after a pause?
    pub fn is_transient(&self) -> bool {
        match self {
            QueueError::Transport(_) => true,
            QueueError::Http { status, code, .. } => {
                *status >= 500
                    || *status == 429
                    || code.contains("Throttl")
                    || code.contains("ServiceUnavailable")
                    || code.contains("RequestThrottled")
            }
            QueueError::Decode(_)
            | QueueError::UnsupportedUrl(_)
            | QueueError::InvalidRequest(_)
            | QueueError::Closed => false,
        }
    }
}

impl From<reqwest::Error> for QueueError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            QueueError::Decode(e.to_string())
        } else {
            QueueError::Transport(e.to_string())
        }
    }
}

/// QueueService は at-least-once の配送キュー
///
/// # 契約
/// - `receive`: 最大 1 件を claim する。空なら `wait_time` まで待って `None`
/// - claim 中（visibility window 内）のメッセージは他の receive に見えない
/// - `delete`: 冪等。期限切れ・使用済みの handle は `AlreadyGone`
/// - `send`: producer 側の投入口（CLI の `send` とテストで使用）
#[async_trait]
pub trait QueueService: Send + Sync {
    async fn receive(&self, request: &ReceiveRequest) -> Result<Option<JobMessage>, QueueError>;

    async fn delete(&self, receipt_handle: &ReceiptHandle) -> Result<DeleteOutcome, QueueError>;

    async fn send(&self, message: OutgoingMessage) -> Result<MessageId, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn http(status: u16, code: &str) -> QueueError {
        QueueError::Http {
            status,
            code: code.to_string(),
            message: String::new(),
        }
    }

    #[rstest]
    #[case(QueueError::Transport("connection reset".into()), true)]
    #[case(http(503, "ServiceUnavailable"), true)]
    #[case(http(400, "ThrottlingException"), true)]
    #[case(http(429, "TooManyRequests"), true)]
    #[case(http(400, "QueueDoesNotExist"), false)]
    #[case(http(403, "AccessDenied"), false)]
    #[case(QueueError::Decode("bad json".into()), false)]
    #[case(QueueError::InvalidRequest("wait time".into()), false)]
    #[case(QueueError::Closed, false)]
    fn classifies_transient_errors(#[case] err: QueueError, #[case] transient: bool) {
        assert_eq!(err.is_transient(), transient);
    }

    #[test]
    fn single_receive_requests_everything() {
        let req = ReceiveRequest::single(Duration::from_secs(60), Duration::from_secs(20));
        assert_eq!(req.max_messages, 1);
        assert_eq!(req.attribute_names.names(), vec!["All".to_string()]);
        assert_eq!(req.message_attribute_names, AttributeSelection::All);
    }

    #[rstest]
    #[case(Duration::from_secs(43_200), Duration::from_secs(20), true)]
    #[case(Duration::from_secs(43_201), Duration::from_secs(20), false)]
    #[case(Duration::from_secs(60), Duration::from_secs(21), false)]
    #[case(Duration::MAX, Duration::ZERO, false)]
    fn limits_follow_the_queue_service(
        #[case] visibility: Duration,
        #[case] wait: Duration,
        #[case] accepted: bool,
    ) {
        let req = ReceiveRequest::single(visibility, wait);
        assert_eq!(req.check_limits().is_ok(), accepted);
    }
}
