use endercom_core::{AgentEvent, EndercomError, EventBus, Result};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::{EngineState, RunSummary};

/// Handle to a run started with [`Agent::spawn`](crate::Agent::spawn).
///
/// Dropping the handle does not stop the run; call [`cancel`](Self::cancel).
pub struct RunHandle {
    cancel: CancellationToken,
    state: watch::Receiver<EngineState>,
    events: EventBus,
    task: JoinHandle<Result<RunSummary>>,
}

impl RunHandle {
    pub(crate) fn new(
        cancel: CancellationToken,
        state: watch::Receiver<EngineState>,
        events: EventBus,
        task: JoinHandle<Result<RunSummary>>,
    ) -> Self {
        Self {
            cancel,
            state,
            events,
            task,
        }
    }

    /// Request a stop. Work already in flight finishes first.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    /// Wait for the run to end.
    pub async fn join(self) -> Result<RunSummary> {
        self.task
            .await
            .map_err(|e| EndercomError::Join(e.to_string()))?
    }

    /// Cancel and wait.
    pub async fn shutdown(self) -> Result<RunSummary> {
        self.cancel();
        self.join().await
    }
}
