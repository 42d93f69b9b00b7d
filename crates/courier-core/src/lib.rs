//! courier-core
//!
//! Building blocks for a queue-consuming job worker.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, message, envelope, outcome, decision, retry, errors）
//! - **ports**: 抽象化レイヤー（QueueService, DeadLetterSink）
//! - **app**: アプリケーションロジック（builder, worker_loop, dispatcher, shutdown, status）
//! - **typed**: 型付き Job API（Job trait, Handler trait, JobRegistry）
//! - **impls**: 実装（InMemoryQueue, SqsQueue, LogDeadLetters）
//! - **config**: worker の設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use crate::app::{Shutdown, ShutdownSignal, Tick, WorkerBuilder, WorkerLoop, WorkerStats};
pub use crate::config::WorkerConfig;
pub use crate::domain::{JobError, Outcome, Payload};
pub use crate::typed::{FnHandler, Handler, Job};
