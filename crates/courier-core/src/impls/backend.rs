//! QueueBackend - 起動時に一度だけ queue url から実装を選ぶファクトリ
//!
//! - `memory://<name>` → InMemoryQueue（ローカル開発・テスト）
//! - `http(s)://...`   → SqsQueue（SQS 互換エンドポイント）

use std::sync::Arc;

use crate::impls::{InMemoryQueue, SqsQueue};
use crate::ports::{QueueError, QueueService};

const MEMORY_SCHEME: &str = "memory://";

/// Which queue implementation a url selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueBackend {
    Memory { name: String },
    Sqs { queue_url: String },
}

impl QueueBackend {
    pub fn from_url(url: &str) -> Result<Self, QueueError> {
        let url = url.trim();
        if let Some(name) = url.strip_prefix(MEMORY_SCHEME) {
            let name = if name.is_empty() { "default" } else { name };
            return Ok(QueueBackend::Memory {
                name: name.to_string(),
            });
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(QueueBackend::Sqs {
                queue_url: url.to_string(),
            });
        }
        Err(QueueError::UnsupportedUrl(url.to_string()))
    }

    /// Build the client. Failing here is fatal for the process.
    pub fn connect(&self) -> Result<Arc<dyn QueueService>, QueueError> {
        match self {
            QueueBackend::Memory { name } => Ok(Arc::new(InMemoryQueue::new(name.clone()))),
            QueueBackend::Sqs { queue_url } => Ok(Arc::new(SqsQueue::new(queue_url)?)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            QueueBackend::Memory { name } => format!("in-memory queue '{name}'"),
            QueueBackend::Sqs { queue_url } => format!("sqs queue {queue_url}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("memory://jobs", QueueBackend::Memory { name: "jobs".into() })]
    #[case("memory://", QueueBackend::Memory { name: "default".into() })]
    #[case(
        "http://localhost:4566/000000000000/job-queue.fifo",
        QueueBackend::Sqs { queue_url: "http://localhost:4566/000000000000/job-queue.fifo".into() }
    )]
    #[case(
        " https://sqs.us-east-1.amazonaws.com/1/jobs ",
        QueueBackend::Sqs { queue_url: "https://sqs.us-east-1.amazonaws.com/1/jobs".into() }
    )]
    fn selects_backend_from_url(#[case] url: &str, #[case] expected: QueueBackend) {
        assert_eq!(QueueBackend::from_url(url).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("amqp://broker/jobs")]
    #[case("localhost:4566/jobs")]
    fn rejects_unknown_schemes(#[case] url: &str) {
        assert!(matches!(QueueBackend::from_url(url), Err(QueueError::UnsupportedUrl(_))));
    }

    #[test]
    fn memory_backend_connects() {
        let backend = QueueBackend::from_url("memory://jobs").unwrap();
        assert!(backend.connect().is_ok());
        assert_eq!(backend.describe(), "in-memory queue 'jobs'");
    }
}
