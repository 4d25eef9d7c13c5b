//! Parallel fan-out with a barrier.
//!
//! `fan_out` spawns one task per target, then waits for every task to finish
//! before returning the per-target outcomes. Targets never wait on each
//! other, so a slow one only delays the barrier. Any deadline belongs in the
//! per-target future itself.
//!
//! Every target gets exactly one outcome. A task that panics is reported as
//! [`FanOutError::Panicked`] against its own target.

use std::collections::HashMap;
use std::future::Future;

use thiserror::Error;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::error;

#[derive(Debug, Error)]
pub enum FanOutError<E> {
    #[error("{0}")]
    Failed(E),

    #[error("delivery task failed: {0}")]
    Panicked(JoinError),
}

pub async fn fan_out<T, F, Fut, E>(
    targets: Vec<T>,
    deliver: F,
) -> Vec<(T, Result<(), FanOutError<E>>)>
where
    T: Clone + Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    let mut tasks = JoinSet::new();
    let mut pending: HashMap<Id, T> = HashMap::with_capacity(targets.len());
    for target in targets {
        let handle = tasks.spawn(deliver(target.clone()));
        pending.insert(handle.id(), target);
    }

    let mut outcomes = Vec::with_capacity(pending.len());
    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, outcome) = match joined {
            Ok((id, outcome)) => (id, outcome.map_err(FanOutError::Failed)),
            Err(e) => {
                error!("delivery task failed: {e}");
                (e.id(), Err(FanOutError::Panicked(e)))
            }
        };
        if let Some(target) = pending.remove(&id) {
            outcomes.push((target, outcome));
        }
    }
    outcomes
}
