//! Opt-in retry/backoff wrapper around a chat backend.
//!
//! The chat loop itself never retries; callers that want resilience wrap
//! their backend in [`RetryingBackend`] before handing it to the loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_timer::Delay;

use crate::{
    BackendError, BackendFuture, BackendKind, BoxedEventStream, ChatBackend, ChatRequest,
    ChatResponse,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn should_retry(&self, attempt: u32, error: &BackendError) -> bool {
        error.retryable && attempt < self.max_attempts
    }

    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = (attempt.saturating_sub(1)) as i32;
        let unbounded = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(unbounded.min(self.max_backoff.as_secs_f64()))
    }
}

pub trait BackendOperationHooks: Send + Sync {
    fn on_attempt_start(&self, _backend: BackendKind, _operation: &str, _attempt: u32) {}

    fn on_retry_scheduled(
        &self,
        _backend: BackendKind,
        _operation: &str,
        _attempt: u32,
        _delay: Duration,
        _error: &BackendError,
    ) {
    }

    fn on_success(&self, _backend: BackendKind, _operation: &str, _attempts: u32) {}

    fn on_failure(
        &self,
        _backend: BackendKind,
        _operation: &str,
        _attempts: u32,
        _error: &BackendError,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOperationHooks;

impl BackendOperationHooks for NoopOperationHooks {}

pub async fn execute_with_retry<T, Op, OpFuture, Sleep, SleepFuture>(
    backend: BackendKind,
    operation: &str,
    policy: &RetryPolicy,
    hooks: &dyn BackendOperationHooks,
    mut execute: Op,
    mut sleep: Sleep,
) -> Result<T, BackendError>
where
    Op: FnMut(u32) -> OpFuture,
    OpFuture: Future<Output = Result<T, BackendError>>,
    Sleep: FnMut(Duration) -> SleepFuture,
    SleepFuture: Future<Output = ()>,
{
    let mut attempt = 1;

    loop {
        hooks.on_attempt_start(backend, operation, attempt);

        match execute(attempt).await {
            Ok(value) => {
                hooks.on_success(backend, operation, attempt);
                return Ok(value);
            }
            Err(error) => {
                if policy.should_retry(attempt, &error) {
                    let delay = policy.backoff_for_attempt(attempt);
                    hooks.on_retry_scheduled(backend, operation, attempt, delay, &error);
                    sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                hooks.on_failure(backend, operation, attempt, &error);
                return Err(error);
            }
        }
    }
}

/// Wraps a backend so `complete` retries retryable errors per policy.
///
/// `stream` passes through untouched: a partially consumed token stream
/// cannot be replayed safely, so streaming callers keep the single-attempt
/// contract.
pub struct RetryingBackend {
    inner: Arc<dyn ChatBackend>,
    policy: RetryPolicy,
    hooks: Arc<dyn BackendOperationHooks>,
}

impl RetryingBackend {
    pub fn new(inner: Arc<dyn ChatBackend>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            hooks: Arc::new(NoopOperationHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn BackendOperationHooks>) -> Self {
        self.hooks = hooks;
        self
    }
}

impl ChatBackend for RetryingBackend {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn complete<'a>(
        &'a self,
        request: ChatRequest,
    ) -> BackendFuture<'a, Result<ChatResponse, BackendError>> {
        Box::pin(async move {
            execute_with_retry(
                self.inner.kind(),
                "complete",
                &self.policy,
                self.hooks.as_ref(),
                |_| self.inner.complete(request.clone()),
                |delay| Delay::new(delay),
            )
            .await
        })
    }

    fn stream<'a>(
        &'a self,
        request: ChatRequest,
    ) -> BackendFuture<'a, Result<BoxedEventStream<'a>, BackendError>> {
        self.inner.stream(request)
    }
}
