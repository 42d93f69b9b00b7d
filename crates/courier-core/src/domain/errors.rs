//! Errors - ジョブ実行エラーと分類
//!
//! handler が返すエラーは worker loop の境界で吸収されます。
//! 分類（ErrorKind）によって「再配送で再試行」か「即座に解決」かが決まります。

use thiserror::Error;

/// ErrorKind は実行エラーの運用分類
///
/// - Transient: 一時的なエラー（再配送でリトライ）
/// - Permanent: 恒久的なエラー（リトライ無意味、即削除）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

/// Error raised while executing a job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job failed: {0}")]
    Failed(String),

    #[error("payload decode failed: {0}")]
    Decode(String),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl JobError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::Decode(_) => ErrorKind::Permanent,
            JobError::Failed(_) | JobError::Panicked(_) => ErrorKind::Transient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_decode_errors_are_permanent() {
        assert_eq!(JobError::Decode("x".into()).kind(), ErrorKind::Permanent);
        assert_eq!(JobError::failed("x").kind(), ErrorKind::Transient);
        assert_eq!(JobError::Panicked("x".into()).kind(), ErrorKind::Transient);
    }
}
