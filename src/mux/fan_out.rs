//! Fan-out invocation across every backend
//!
//! Backends may run in parallel or one after another. Either way, results
//! are buffered by ordinal, so callers always see them in backend order.

use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{BackendHandle, BackendId};
use crate::{Error, Result};

/// How a fan-out call schedules its backend invocations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanOutMode {
    /// Invoke every backend concurrently
    #[default]
    Parallel,
    /// Invoke backends one at a time, in ordinal order
    Sequential,
}

/// A single provider-global call spread over all backends
pub(crate) struct FanOut<'a> {
    rpc: &'static str,
    backends: &'a [BackendHandle],
    mode: FanOutMode,
    cancel: CancellationToken,
}

impl<'a> FanOut<'a> {
    pub(crate) fn new(
        rpc: &'static str,
        backends: &'a [BackendHandle],
        mode: FanOutMode,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rpc,
            backends,
            mode,
            cancel,
        }
    }

    /// Invoke `call` on every backend and return the responses in ordinal order.
    ///
    /// All backends are invoked even if some return error diagnostics. A
    /// backend call error aborts the fan-out once every backend has answered;
    /// the lowest-ordinal failure is reported. Cancellation, whether of the
    /// mux token or reported by a backend, aborts immediately and drops the
    /// remaining in-flight calls.
    pub(crate) async fn invoke<T, F, Fut>(&self, call: F) -> Result<Vec<(BackendId, T)>>
    where
        F: Fn(&'a BackendHandle) -> Fut + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        debug!(rpc = self.rpc, backends = self.backends.len(), mode = ?self.mode, "Fanning out");

        let results = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!(rpc = self.rpc, "Fan-out cancelled");
                return Err(Error::Cancelled);
            }
            results = self.collect(&call) => results?,
        };

        let mut responses = Vec::with_capacity(results.len());
        for (backend, result) in self.backends.iter().zip(results) {
            match result {
                Ok(response) => responses.push((backend.id(), response)),
                Err(source) => {
                    warn!(rpc = self.rpc, backend = %backend.id(), error = %source, "Backend call failed");
                    return Err(Error::BackendCallFailed {
                        rpc: self.rpc,
                        backend: backend.id(),
                        source: Box::new(source),
                    });
                }
            }
        }

        Ok(responses)
    }

    async fn collect<T, F, Fut>(&self, call: &F) -> Result<Vec<Result<T>>>
    where
        F: Fn(&'a BackendHandle) -> Fut + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut slots: Vec<Option<Result<T>>> = self.backends.iter().map(|_| None).collect();

        match self.mode {
            FanOutMode::Sequential => {
                for (slot, backend) in slots.iter_mut().zip(self.backends) {
                    let result = call(backend).await;
                    if result.as_ref().is_err_and(Error::is_cancelled) {
                        return Err(self.cancelled_by(backend.id()));
                    }
                    *slot = Some(result);
                }
            }
            FanOutMode::Parallel => {
                let mut pending: FuturesUnordered<_> = self
                    .backends
                    .iter()
                    .enumerate()
                    .map(|(index, backend)| {
                        let fut = call(backend);
                        async move { (index, fut.await) }
                    })
                    .collect();

                while let Some((index, result)) = pending.next().await {
                    if result.as_ref().is_err_and(Error::is_cancelled) {
                        // Dropping `pending` cancels the siblings still in flight.
                        return Err(self.cancelled_by(BackendId::new(index)));
                    }
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(result);
                    }
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| Error::Internal(format!("{} lost a backend response", self.rpc)))
            })
            .collect()
    }

    fn cancelled_by(&self, backend: BackendId) -> Error {
        debug!(rpc = self.rpc, backend = %backend, "Backend call cancelled, abandoning fan-out");
        Error::Cancelled
    }
}
