//! Ports - 抽象化レイヤー
//!
//! 外部システム（キュー、dead-letter 先）へのインターフェースを定義します。
//! worker loop はこれらの trait だけに依存します。

pub mod dead_letter;
pub mod queue_service;

pub use self::dead_letter::{DeadLetterError, DeadLetterSink};
pub use self::queue_service::{
    AttributeSelection, DeleteOutcome, QueueError, QueueService, ReceiveRequest,
};
