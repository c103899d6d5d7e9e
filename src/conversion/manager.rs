//! Conversion dispatch.
//!
//! [`ConversionDispatcher`] submits the standby set to a [`ConversionEngine`]
//! as one batch, mirrors the engine's progress events into the store while
//! the call runs, reconciles against the output directory when the engine
//! fails, and applies whatever was produced.

use super::engine::{BatchRequest, ConversionEngine, ConvertedFile, EngineEvent};
use crate::options::OptionsState;
use crate::state::{ImageEntry, StateStore, Status};
use imageforged_common::{BatchId, EntryId, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, info, warn};

/// Default pause between applying results and returning to idle.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(400);

/// Message used when the engine resolves without producing anything.
pub const EMPTY_RESULT_MESSAGE: &str = "engine returned no converted files";

/// How a conversion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// Every requested entry was converted.
    Success,
    /// Fewer entries than requested were converted.
    Partial,
    /// The engine rejected the batch and nothing was recovered.
    Failed,
}

/// Result of one [`ConversionDispatcher::convert`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub status: OutcomeStatus,
    /// Engine error text, when the engine rejected the batch.
    pub message: Option<String>,
    /// Entries moved to complete.
    pub converted: usize,
    /// Entries submitted to the engine.
    pub requested: usize,
}

impl ConversionOutcome {
    fn empty() -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: None,
            converted: 0,
            requested: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Status for a batch call that resolved with `covered` of `requested`
/// entries. A short result is a partial failure, even an empty one.
fn resolved_status(covered: usize, requested: usize) -> OutcomeStatus {
    if covered < requested {
        OutcomeStatus::Partial
    } else {
        OutcomeStatus::Success
    }
}

/// Status after a rejected batch call, from what reconciliation found.
fn reconciled_status(covered: usize, requested: usize) -> OutcomeStatus {
    if covered == 0 {
        OutcomeStatus::Failed
    } else {
        resolved_status(covered, requested)
    }
}

/// Engine progress receiver scoped to a single batch call.
///
/// Created before the call is issued; dropping it releases the receiver.
struct ProgressSubscription<'a> {
    rx: broadcast::Receiver<EngineEvent>,
    store: &'a StateStore,
    closed: bool,
}

impl<'a> ProgressSubscription<'a> {
    fn new(rx: broadcast::Receiver<EngineEvent>, store: &'a StateStore) -> Self {
        Self {
            rx,
            store,
            closed: false,
        }
    }

    fn handle(&self, event: EngineEvent) {
        match event {
            EngineEvent::TotalKnown(total) => self.store.set_total(total),
            EngineEvent::ItemCompleted(id) => {
                debug!("Engine finished entry {}", id);
                self.store.advance(1);
            }
        }
    }

    /// Drive `call` to completion, applying progress events as they arrive.
    async fn pump<F: Future>(&mut self, call: F) -> F::Output {
        tokio::pin!(call);
        loop {
            tokio::select! {
                biased;
                output = &mut call => return output,
                received = self.rx.recv(), if !self.closed => match received {
                    Ok(event) => self.handle(event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Missed {} engine progress events", missed);
                    }
                    Err(RecvError::Closed) => self.closed = true,
                },
            }
        }
    }

    /// Apply events still buffered after the call settled.
    fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.handle(event),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!("Missed {} engine progress events", missed);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}

/// Dispatches standby entries to the conversion engine.
pub struct ConversionDispatcher {
    engine: Arc<dyn ConversionEngine>,
    store: Arc<StateStore>,
    settle_delay: Duration,
}

impl ConversionDispatcher {
    pub fn new(engine: Arc<dyn ConversionEngine>, store: Arc<StateStore>) -> Self {
        Self {
            engine,
            store,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Override the pause before returning to idle.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn engine(&self) -> &Arc<dyn ConversionEngine> {
        &self.engine
    }

    /// Convert `snapshot` with `options`.
    ///
    /// Engine failures are reported through the returned outcome; only
    /// [`Error::Busy`] is returned as an error.
    pub async fn convert(
        &self,
        snapshot: Vec<ImageEntry>,
        options: &OptionsState,
    ) -> Result<ConversionOutcome> {
        if snapshot.is_empty() {
            if self.store.is_locked() {
                return Err(Error::busy(self.store.progress().status.as_str()));
            }
            debug!("Nothing to convert");
            return Ok(ConversionOutcome::empty());
        }

        let guard = self.store.begin(Status::Converting)?;
        let requested = snapshot.len();
        self.store.set_total(requested);

        let batch_id = BatchId::new();
        let request = BatchRequest::from_entries(&snapshot, options.format);
        info!(
            "Dispatching batch {} ({} files, {}) to {} engine",
            batch_id,
            requested,
            options.format,
            self.engine.name()
        );

        let result = {
            let mut progress = ProgressSubscription::new(self.engine.subscribe(), &self.store);
            let result = progress
                .pump(self.engine.batch_convert(&request, options))
                .await;
            progress.drain();
            result
        };

        let (files, status, message) = match result {
            Ok(files) => {
                let covered = covered_ids(&request, &files);
                let status = resolved_status(covered, requested);
                let message = (covered == 0).then(|| EMPTY_RESULT_MESSAGE.to_string());
                (files, status, message)
            }
            Err(e) => {
                let message = e.user_message();
                warn!("Batch {} rejected by engine: {}", batch_id, message);
                match self
                    .engine
                    .reconcile_existing(&request, &options.output)
                    .await
                {
                    Ok(found) => {
                        let covered = covered_ids(&request, &found);
                        info!(
                            "Reconciliation found {}/{} outputs for batch {}",
                            covered, requested, batch_id
                        );
                        (found, reconciled_status(covered, requested), Some(message))
                    }
                    Err(reconcile_err) => {
                        warn!("Reconciliation failed for batch {}: {}", batch_id, reconcile_err);
                        (Vec::new(), OutcomeStatus::Failed, Some(message))
                    }
                }
            }
        };

        let applied = self
            .store
            .apply_conversion(batch_id, options.format, &files);

        tokio::time::sleep(self.settle_delay).await;
        drop(guard);

        info!(
            "Batch {} finished: {:?} ({}/{} converted)",
            batch_id,
            status,
            applied.len(),
            requested
        );
        Ok(ConversionOutcome {
            status,
            message,
            converted: applied.len(),
            requested,
        })
    }
}

/// Number of distinct requested ids present in `files`.
fn covered_ids(request: &BatchRequest, files: &[ConvertedFile]) -> usize {
    let requested: HashSet<EntryId> = request.items.iter().map(|item| item.id).collect();
    files
        .iter()
        .map(|file| file.id)
        .filter(|id| requested.contains(id))
        .collect::<HashSet<_>>()
        .len()
}
