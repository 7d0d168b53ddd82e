//! Transaction boundary shared by every domain operation.

use crate::error::CrudError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use metrics::counter;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// An open unit of work. Finishing it consumes the handle, so a handle is
/// committed or aborted at most once.
#[async_trait]
pub trait TransactionHandle: Send + 'static {
    async fn commit(self) -> Result<(), CrudError>;

    async fn abort(self) -> Result<(), CrudError>;
}

/// Starts transactions against a backing store.
#[async_trait]
pub trait TransactionHandler: Send + Sync + 'static {
    type Handle: TransactionHandle;

    /// Fails with [`CrudError::TransactionStart`] when the store is unavailable.
    async fn start(&self) -> Result<Self::Handle, CrudError>;
}

pub type TransactionFuture<'h, R> = BoxFuture<'h, Result<R, CrudError>>;

/// Runs `operation` inside a fresh transaction.
///
/// The transaction is committed when the operation succeeds and aborted
/// otherwise; the operation's error is returned unchanged. The work runs on
/// its own task, so an abort still happens when the caller's future is
/// dropped, as long as the caller cancels `cancel` (see
/// [`crate::controller::RequestScope`]).
pub async fn run_atomically<H, R, F>(
    handler: Arc<H>,
    cancel: CancellationToken,
    operation: F,
) -> Result<R, CrudError>
where
    H: TransactionHandler,
    R: Send + 'static,
    F: for<'h> FnOnce(&'h mut H::Handle) -> TransactionFuture<'h, R> + Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(CrudError::Cancelled);
    }

    let task = tokio::spawn(async move {
        let mut handle = handler.start().await.map_err(|err| match err {
            CrudError::TransactionStart(_) => err,
            other => CrudError::TransactionStart(other.to_string()),
        })?;

        let outcome = {
            let work = AssertUnwindSafe(operation(&mut handle)).catch_unwind();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(CrudError::Cancelled),
                result = work => result.unwrap_or_else(|_| {
                    Err(CrudError::Internal(anyhow::anyhow!("transactional operation panicked")))
                }),
            }
        };

        finish(handle, outcome).await
    });

    match task.await {
        Ok(result) => result,
        Err(join_error) => Err(CrudError::Internal(anyhow::anyhow!(
            "transaction task failed: {}",
            join_error
        ))),
    }
}

async fn finish<T, R>(handle: T, outcome: Result<R, CrudError>) -> Result<R, CrudError>
where
    T: TransactionHandle,
{
    match outcome {
        Ok(value) => {
            handle.commit().await.inspect_err(|err| {
                tracing::error!(error = %err, "Failed to commit transaction");
                counter!("crud_transactions_total", "outcome" => "commit_failed").increment(1);
            })?;
            counter!("crud_transactions_total", "outcome" => "commit").increment(1);
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = handle.abort().await {
                tracing::warn!(error = %abort_err, cause = %err, "Failed to abort transaction");
            }
            counter!("crud_transactions_total", "outcome" => "abort").increment(1);
            Err(err)
        }
    }
}
