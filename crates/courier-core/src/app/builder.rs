//! WorkerBuilder - worker の構築とワイヤリング
//!
//! - handler の登録（型付き / クロージャ / type-erased）
//! - 起動時検証（Fail-fast）: `expect_jobs()` の集合が全て登録済みか
//! - 未指定の部品はデフォルトで埋める（DefaultDecider, LogDeadLetters）

use std::sync::Arc;

use super::dispatcher::Dispatcher;
use super::worker_loop::WorkerLoop;
use crate::config::WorkerConfig;
use crate::domain::{Decider, DefaultDecider};
use crate::impls::LogDeadLetters;
use crate::ports::{DeadLetterSink, QueueService};
use crate::typed::{DynHandler, Handler, Job, JobRegistry, RegistryError};

/// Builds a `WorkerLoop`.
///
/// # 使用例
/// ```ignore
/// let worker = WorkerBuilder::new(queue)
///     .config(config)
///     .register::<CacheImages, _>(CacheImagesHandler)?
///     .expect_jobs(&[CacheImages::TYPE])
///     .build()?;
/// ```
pub struct WorkerBuilder {
    queue: Arc<dyn QueueService>,
    registry: JobRegistry,
    config: WorkerConfig,
    decider: Option<Arc<dyn Decider>>,
    dead_letters: Option<Arc<dyn DeadLetterSink>>,
    expected_jobs: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing job types: {0:?}. These jobs were expected but not registered.")]
    MissingJobTypes(Vec<String>),
}

impl WorkerBuilder {
    pub fn new(queue: Arc<dyn QueueService>) -> Self {
        Self {
            queue,
            registry: JobRegistry::new(),
            config: WorkerConfig::default(),
            decider: None,
            dead_letters: None,
            expected_jobs: None,
        }
    }

    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// 型付き handler を `J::TYPE` で登録
    pub fn register<J: Job, H: Handler<J> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<J, H>(handler)?;
        Ok(self)
    }

    /// type-erased handler（`FnHandler` など）を登録
    pub fn register_dyn<D: DynHandler + 'static>(
        mut self,
        handler: D,
    ) -> Result<Self, RegistryError> {
        self.registry.register_dyn(handler)?;
        Ok(self)
    }

    /// Replace the default decider (built from `config.retry`).
    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    /// Replace the default dead-letter sink (a warn log line).
    pub fn dead_letters(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letters = Some(sink);
        self
    }

    /// 期待される job type を設定。`build()` 時に検証される
    pub fn expect_jobs(mut self, job_types: &[&str]) -> Self {
        self.expected_jobs = Some(job_types.iter().map(|t| t.to_string()).collect());
        self
    }

    /// # 検証
    /// - `expect_jobs()` の job type が全て登録されているか
    /// - 不足があれば `BuildError::MissingJobTypes`
    pub fn build(self) -> Result<WorkerLoop, BuildError> {
        if let Some(expected) = &self.expected_jobs {
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !self.registry.contains(t))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingJobTypes(missing));
            }
        }

        let decider = self
            .decider
            .unwrap_or_else(|| Arc::new(DefaultDecider::new(self.config.retry)));
        let dead_letters = self
            .dead_letters
            .unwrap_or_else(|| Arc::new(LogDeadLetters));

        Ok(WorkerLoop::new(
            self.queue,
            Dispatcher::new(Arc::new(self.registry)),
            decider,
            dead_letters,
            self.config,
        ))
    }
}
