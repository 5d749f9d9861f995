use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;

use super::Pipeline;
use crate::error::PipelineError;

/// A pipeline running on its own task.
///
/// The owner may wait for the result with [`join`](Self::join) or stop the
/// run with [`cancel`](Self::cancel). Both consume the handle, so the result
/// can be collected exactly once. Dropping the handle detaches the run: it
/// keeps going to completion and its result is discarded.
pub struct BackgroundRun {
    handle: JoinHandle<Result<i32, PipelineError>>,
    cancel: Option<oneshot::Sender<()>>,
}

impl BackgroundRun {
    pub(super) fn start(pipeline: Pipeline) -> Self {
        let (tx, rx) = oneshot::channel();
        let cancelled = async move {
            // A dropped sender means detached, not cancelled
            if rx.await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        let handle = tokio::spawn(pipeline.run_until(cancelled).with_current_subscriber());
        Self {
            handle,
            cancel: Some(tx),
        }
    }

    /// Wait for the run to finish and return its aggregate exit status.
    pub async fn join(self) -> Result<i32, PipelineError> {
        let Self { handle, .. } = self;
        handle.await?
    }

    /// Wait for the run like [`join`](Self::join), cancelling it if `cancel`
    /// resolves first.
    pub async fn join_until<C>(mut self, cancel: C) -> Result<i32, PipelineError>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            result = &mut self.handle => return result?,
            () = cancel => {}
        }
        self.cancel().await
    }

    /// Terminate every still-running stage and wait for the run to wind down.
    /// A run that already finished reports its normal result.
    pub async fn cancel(mut self) -> Result<i32, PipelineError> {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
        self.join().await
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
