/*
[INPUT]:  Spawned dispatch task plus its cancel token, state channel and stats
[OUTPUT]: Caller-side handle to observe and stop one subscription
[POS]:    WebSocket layer - cancellation handle
[UPDATE]: When changing subscription lifecycle or shutdown semantics
*/

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::error::{Result, StreamError};
use crate::ws::dispatch::{DispatchStats, DispatchStatsSnapshot, SubscriptionState};

const ENDED_WITHOUT_STATE: &str = "dispatch task ended without final state";

// A loop that died before publishing (a panicking handler) is never Active.
fn settle(state: SubscriptionState) -> SubscriptionState {
    if state.is_active() {
        SubscriptionState::Failed(ENDED_WITHOUT_STATE.to_string())
    } else {
        state
    }
}

/// Handle to one running subscription.
///
/// Dropping the handle cancels the subscription.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: Uuid,
    endpoint: Url,
    cancel: CancellationToken,
    state: watch::Receiver<SubscriptionState>,
    stats: Arc<DispatchStats>,
    task: Option<JoinHandle<Result<()>>>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        id: Uuid,
        endpoint: Url,
        cancel: CancellationToken,
        state: watch::Receiver<SubscriptionState>,
        stats: Arc<DispatchStats>,
        task: JoinHandle<Result<()>>,
    ) -> Self {
        Self {
            id,
            endpoint,
            cancel,
            state,
            stats,
            task: Some(task),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Signal the dispatch loop to stop. Calling it again is a no-op.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            debug!(subscription_id = %self.id, "subscription cancel requested");
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn state(&self) -> SubscriptionState {
        let current = self.state.borrow().clone();
        if self.state.has_changed().is_err() {
            settle(current)
        } else {
            current
        }
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Resolves once the dispatch loop has left `Active`. Never returns `Active`.
    pub async fn terminated(&self) -> SubscriptionState {
        let mut state = self.state.clone();
        let observed = state
            .wait_for(|current| !current.is_active())
            .await
            .map(|current| current.clone());
        match observed {
            Ok(current) => current,
            // loop task gone without publishing a final state
            Err(_) => settle(state.borrow().clone()),
        }
    }

    /// Wait for the dispatch loop to finish.
    ///
    /// `Ok` after cancellation or a clean close; the transport error when
    /// the connection failed.
    pub async fn wait(mut self) -> Result<()> {
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|err| StreamError::Dispatch(err.to_string()))?,
            None => Ok(()),
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
