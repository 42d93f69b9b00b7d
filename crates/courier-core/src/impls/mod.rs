//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryQueue**: visibility timeout 付きのキューエミュレータ
//! - **SqsQueue**: SQS JSON プロトコルのクライアント
//! - **QueueBackend**: url から実装を選ぶファクトリ
//! - **LogDeadLetters**: デフォルトの DeadLetterSink

pub mod backend;
pub mod dead_letter;
pub mod inmem_queue;
pub mod sqs;

pub use self::backend::QueueBackend;
pub use self::dead_letter::LogDeadLetters;
pub use self::inmem_queue::{InMemoryQueue, QueueCounts};
pub use self::sqs::SqsQueue;
