//! Handler trait - Job を実行する Handler の定義
//!
//! # 学習ポイント
//! - ジェネリック trait (Handler<J>)
//! - Object-safe trait (DynHandler)
//! - Type erasure パターン (TypedHandler<J, H> → DynHandler)

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;

use super::job::Job;
use crate::domain::{JobError, Outcome, Payload};

/// Handler は Job を実行して Outcome を返す
///
/// # 使用例
/// ```ignore
/// struct CacheImagesHandler;
///
/// #[async_trait]
/// impl Handler<CacheImages> for CacheImagesHandler {
///     async fn handle(&self, job: CacheImages) -> Result<Outcome, JobError> {
///         cache_images(&job.voter_we_vote_id).await?;
///         Ok(Outcome::success())
///     }
/// }
/// ```
///
/// Handlers may run more than once for the same message (at-least-once
/// delivery), so they must be idempotent or tolerate repeats.
#[async_trait]
pub trait Handler<J: Job>: Send + Sync {
    async fn handle(&self, job: J) -> Result<Outcome, JobError>;
}

/// DynHandler は object-safe な Handler の抽象化
///
/// HashMap<JobType, Arc<dyn DynHandler>> に格納するための形です。
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, payload: &Payload) -> Result<Outcome, JobError>;
    fn job_type(&self) -> &str;
}

pub struct TypedHandler<J: Job, H: Handler<J>> {
    handler: H,
    _marker: PhantomData<fn() -> J>,
}

impl<J: Job, H: Handler<J>> TypedHandler<J, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<J: Job, H: Handler<J>> DynHandler for TypedHandler<J, H> {
    async fn handle_dyn(&self, payload: &Payload) -> Result<Outcome, JobError> {
        let job: J = serde_json::from_value(Value::Object(payload.clone()))
            .map_err(|e| JobError::Decode(format!("{}: {e}", J::TYPE)))?;
        self.handler.handle(job).await
    }

    fn job_type(&self) -> &str {
        J::TYPE
    }
}

/// Untyped handler over the raw payload record.
///
/// ```ignore
/// registry.register_dyn(FnHandler::new("log_payload", |payload| async move {
///     tracing::info!(?payload, "payload");
///     Ok(Outcome::success())
/// }))?;
/// ```
pub struct FnHandler<F, Fut> {
    job_type: String,
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnHandler<F, Fut>
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Outcome, JobError>> + Send + 'static,
{
    pub fn new(job_type: impl Into<String>, f: F) -> Self {
        Self {
            job_type: job_type.into(),
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> DynHandler for FnHandler<F, Fut>
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Outcome, JobError>> + Send + 'static,
{
    async fn handle_dyn(&self, payload: &Payload) -> Result<Outcome, JobError> {
        (self.f)(payload.clone()).await
    }

    fn job_type(&self) -> &str {
        &self.job_type
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TestJob {
        pub value: i32,
    }

    impl Job for TestJob {
        const TYPE: &'static str = "test.job.create.v1";
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AnotherTestJob {
        pub name: String,
    }

    impl Job for AnotherTestJob {
        const TYPE: &'static str = "test.job.another.v1";
    }

    pub struct TestJobHandler;

    #[async_trait]
    impl Handler<TestJob> for TestJobHandler {
        async fn handle(&self, job: TestJob) -> Result<Outcome, JobError> {
            if job.value < 0 {
                return Err(JobError::failed("negative value"));
            }
            Ok(Outcome::success())
        }
    }

    pub struct AnotherTestJobHandler;

    #[async_trait]
    impl Handler<AnotherTestJob> for AnotherTestJobHandler {
        async fn handle(&self, _job: AnotherTestJob) -> Result<Outcome, JobError> {
            Ok(Outcome::success())
        }
    }
}
