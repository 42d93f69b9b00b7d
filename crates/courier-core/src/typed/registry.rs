//! JobRegistry - Handler の登録と管理
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Generic methods での登録と型安全性
//! - Arc による共有所有権
//!
//! 新しい job type は登録だけで追加でき、worker loop には手を入れません。

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::job::Job;
use crate::domain::JobType;

/// JobRegistry は job type → handler の対応表
///
/// - 初期化時に構築（mutable）
/// - 実行時は共有して参照のみ（immutable）
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<JobType, Arc<dyn DynHandler>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler for job type '{0}' is already registered")]
    AlreadyRegistered(JobType),
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a typed handler under `J::TYPE`.
    pub fn register<J: Job, H: Handler<J> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        self.register_dyn(TypedHandler::<J, H>::new(handler))
    }

    /// Register an already type-erased handler under its own job type.
    pub fn register_dyn<D: DynHandler + 'static>(&mut self, handler: D) -> Result<(), RegistryError> {
        let job_type = JobType::new(handler.job_type());
        if self.handlers.contains_key(&job_type) {
            return Err(RegistryError::AlreadyRegistered(job_type));
        }
        self.handlers.insert(job_type, Arc::new(handler));
        Ok(())
    }

    pub fn get(&self, job_type: &JobType) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(job_type).cloned()
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.handlers.contains_key(&JobType::new(job_type))
    }

    /// Registered job types, sorted.
    pub fn registered_types(&self) -> Vec<JobType> {
        let mut types: Vec<JobType> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Outcome, Payload};
    use crate::typed::FnHandler;
    use crate::typed::handler::fixtures::{
        AnotherTestJob, AnotherTestJobHandler, TestJob, TestJobHandler,
    };

    #[test]
    fn test_register_and_get() {
        let mut registry = JobRegistry::new();
        registry.register::<TestJob, _>(TestJobHandler).unwrap();

        let retrieved = registry.get(&JobType::new(TestJob::TYPE));
        assert!(retrieved.is_some());
        assert!(registry.get(&JobType::new("does_not_exist")).is_none());
    }

    #[test]
    fn test_double_registration() {
        let mut registry = JobRegistry::new();
        registry.register::<TestJob, _>(TestJobHandler).unwrap();
        let result = registry.register::<TestJob, _>(TestJobHandler);
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(t)) if t.as_str() == TestJob::TYPE));
    }

    #[test]
    fn typed_and_untyped_handlers_share_the_namespace() {
        let mut registry = JobRegistry::new();
        registry.register::<TestJob, _>(TestJobHandler).unwrap();

        let clash = FnHandler::new(TestJob::TYPE, |_: Payload| async { Ok(Outcome::success()) });
        assert!(registry.register_dyn(clash).is_err());
    }

    #[test]
    fn test_registered_types() {
        let mut registry = JobRegistry::new();
        assert!(registry.is_empty());

        registry.register::<TestJob, _>(TestJobHandler).unwrap();
        registry
            .register::<AnotherTestJob, _>(AnotherTestJobHandler)
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(AnotherTestJob::TYPE));
        assert_eq!(
            registry.registered_types(),
            vec![JobType::new(AnotherTestJob::TYPE), JobType::new(TestJob::TYPE)]
        );
    }
}
