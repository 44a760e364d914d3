//! Request-scoped cancellation.
//!
//! A `RequestScope` lives as long as the handler that created it. Work run
//! through it, including tasks it spawns, is cancelled when the scope is
//! dropped, so a navigation away never leaves fetches or document jobs
//! running against a view that no longer exists.

use crate::error::AppError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

pub struct RequestScope {
    token: CancellationToken,
    _guard: DropGuard,
}

impl RequestScope {
    pub fn new() -> Self {
        let token = CancellationToken::new();
        let guard = token.clone().drop_guard();
        Self {
            token,
            _guard: guard,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Run `fut` unless the scope is cancelled first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(AppError::Cancelled),
            result = fut => result,
        }
    }

    /// Like `run`, with an upper bound on how long `fut` may take.
    pub async fn run_with_timeout<F, T>(
        &self,
        operation: &'static str,
        limit: Duration,
        fut: F,
    ) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        self.run(async {
            tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| AppError::Timeout {
                    operation,
                    seconds: limit.as_secs(),
                })?
        })
        .await
    }

    /// Spawn `fut` on the runtime, tied to this scope.
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<Result<T, AppError>>
    where
        F: Future<Output = Result<T, AppError>> + Send + 'static,
        T: Send + 'static,
    {
        let token = self.token.child_token();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(AppError::Cancelled),
                result = fut => result,
            }
        })
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestScope
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestScope::new())
    }
}

/// Await a scoped task, folding join failures into `AppError`.
pub async fn join<T>(handle: JoinHandle<Result<T, AppError>>) -> Result<T, AppError> {
    handle
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Background task failed: {}", e)))?
}
