//! The entry store: one table of entries viewed as standby, complete and
//! backup, plus the progress/status state machine.

mod events;
mod types;

pub use events::{Event, EventBus, EventPayload};
pub use types::*;

use crate::conversion::ConvertedFile;
use imageforged_common::{BatchId, EntryId, Error, ImageFormat, Result};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
struct LiveEntry {
    stage: Stage,
    entry: ImageEntry,
}

/// Everything the store knows about one id.
///
/// `live` is the entry's standby or complete record; `backup` is its
/// pre-conversion snapshot from the most recent batch. A slot with neither
/// is dropped.
#[derive(Debug, Clone, Default)]
struct Slot {
    live: Option<LiveEntry>,
    backup: Option<ImageEntry>,
}

impl Slot {
    fn is_empty(&self) -> bool {
        self.live.is_none() && self.backup.is_none()
    }

    fn stage(&self) -> Option<Stage> {
        self.live.as_ref().map(|l| l.stage)
    }
}

#[derive(Debug, Default)]
struct Table {
    order: VecDeque<EntryId>,
    slots: HashMap<EntryId, Slot>,
}

impl Table {
    fn iter(&self) -> impl Iterator<Item = (&EntryId, &Slot)> {
        self.order
            .iter()
            .filter_map(|id| self.slots.get(id).map(|slot| (id, slot)))
    }

    fn live_in(&self, stage: Stage) -> Vec<ImageEntry> {
        self.iter()
            .filter_map(|(_, slot)| slot.live.as_ref())
            .filter(|live| live.stage == stage)
            .map(|live| live.entry.clone())
            .collect()
    }

    /// Drop slots that no longer hold anything.
    fn prune(&mut self) {
        self.slots.retain(|_, slot| !slot.is_empty());
        let slots = &self.slots;
        self.order.retain(|id| slots.contains_key(id));
    }

    fn clear_completed(&mut self) -> Vec<EntryId> {
        let mut cleared = Vec::new();
        for id in &self.order {
            if let Some(slot) = self.slots.get_mut(id) {
                if slot.stage() == Some(Stage::Completed) {
                    slot.live = None;
                    cleared.push(*id);
                }
            }
        }
        self.prune();
        cleared
    }
}

/// Shared store owning every entry and the progress state.
///
/// All mutation goes through the methods below; each one broadcasts an
/// [`Event`] describing the change.
pub struct StateStore {
    table: RwLock<Table>,
    progress: RwLock<ProgressState>,
    events: EventBus,
}

impl StateStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            table: RwLock::new(Table::default()),
            progress: RwLock::new(ProgressState::default()),
            events: EventBus::default(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        self.events.recent_events(n)
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Entries waiting for conversion, in queue order.
    pub fn standby(&self) -> Vec<ImageEntry> {
        self.table.read().live_in(Stage::Pending)
    }

    /// Converted entries, in queue order.
    pub fn complete(&self) -> Vec<ImageEntry> {
        self.table.read().live_in(Stage::Completed)
    }

    /// Pre-conversion snapshots from the most recent batch.
    pub fn backup(&self) -> Vec<ImageEntry> {
        let table = self.table.read();
        table
            .iter()
            .filter_map(|(_, slot)| slot.backup.clone())
            .collect()
    }

    /// The live (standby or complete) record for `id`.
    pub fn get(&self, id: EntryId) -> Option<ImageEntry> {
        let table = self.table.read();
        table
            .slots
            .get(&id)
            .and_then(|slot| slot.live.as_ref())
            .map(|live| live.entry.clone())
    }

    /// Source paths currently in standby.
    pub fn standby_paths(&self) -> HashSet<PathBuf> {
        self.standby().into_iter().map(|e| e.path).collect()
    }

    pub fn stats(&self) -> StoreStats {
        let table = self.table.read();
        let mut stats = StoreStats::default();
        for (_, slot) in table.iter() {
            if slot.backup.is_some() {
                stats.backup += 1;
            }
            match &slot.live {
                Some(LiveEntry {
                    stage: Stage::Pending,
                    ..
                }) => stats.standby += 1,
                Some(LiveEntry {
                    stage: Stage::Completed,
                    entry,
                }) => {
                    stats.complete += 1;
                    stats.bytes_before += entry.size_before;
                    stats.bytes_after += entry.size_after;
                }
                None => {}
            }
        }
        stats
    }

    // ------------------------------------------------------------------
    // Entry mutation
    // ------------------------------------------------------------------

    /// Insert or replace a pending entry.
    ///
    /// If the id is currently complete, that stale record and its backup
    /// snapshot are discarded first. Returns `true` in that case.
    pub fn insert_pending(&self, entry: ImageEntry) -> bool {
        let id = entry.id;
        let superseded = {
            let mut table = self.table.write();
            match table.slots.get_mut(&id) {
                Some(slot) => {
                    let superseded = slot.stage() == Some(Stage::Completed);
                    if superseded {
                        slot.backup = None;
                    }
                    slot.live = Some(LiveEntry {
                        stage: Stage::Pending,
                        entry,
                    });
                    superseded
                }
                None => {
                    table.slots.insert(
                        id,
                        Slot {
                            live: Some(LiveEntry {
                                stage: Stage::Pending,
                                entry,
                            }),
                            backup: None,
                        },
                    );
                    table.order.push_back(id);
                    false
                }
            }
        };

        if superseded {
            tracing::debug!("Re-added entry {} replaces its completed record", id);
        }
        self.events
            .broadcast(EventPayload::EntriesAdded { ids: vec![id] });
        superseded
    }

    /// Move converted entries from standby to complete.
    ///
    /// Results for ids that are no longer pending are ignored. When at least
    /// one result applies, the previous undo checkpoint is replaced by the
    /// snapshots taken here. Returns the ids that moved.
    pub fn apply_conversion(
        &self,
        batch_id: BatchId,
        format: ImageFormat,
        converted: &[ConvertedFile],
    ) -> Vec<EntryId> {
        let applied = {
            let mut table = self.table.write();

            let applicable: Vec<&ConvertedFile> = converted
                .iter()
                .filter(|file| {
                    let pending = table.slots.get(&file.id).and_then(Slot::stage)
                        == Some(Stage::Pending);
                    if !pending {
                        tracing::debug!("Ignoring result for entry {} (no longer pending)", file.id);
                    }
                    pending
                })
                .collect();

            if applicable.is_empty() {
                return Vec::new();
            }

            for slot in table.slots.values_mut() {
                slot.backup = None;
            }

            let mut applied = Vec::with_capacity(applicable.len());
            for file in applicable {
                let Some(slot) = table.slots.get_mut(&file.id) else {
                    continue;
                };
                // a duplicate result for an id already moved in this pass
                if slot.stage() != Some(Stage::Pending) {
                    continue;
                }
                let Some(LiveEntry { entry, .. }) = slot.live.take() else {
                    continue;
                };
                let done = entry.converted(format, &file.output_path, file.output_size);
                slot.backup = Some(entry);
                slot.live = Some(LiveEntry {
                    stage: Stage::Completed,
                    entry: done,
                });
                applied.push(file.id);
            }
            table.prune();
            applied
        };

        self.events.broadcast(EventPayload::EntriesConverted {
            batch_id,
            ids: applied.clone(),
        });
        applied
    }

    /// Undo the most recent conversion.
    ///
    /// Backup snapshots return to standby ahead of the entries already there;
    /// complete and backup are emptied. Returns the restored ids, or an empty
    /// list when there is nothing to undo.
    pub fn restore(&self) -> Vec<EntryId> {
        let restored = {
            let mut table = self.table.write();

            let restored: Vec<EntryId> = table
                .iter()
                .filter(|(_, slot)| slot.backup.is_some())
                .map(|(id, _)| *id)
                .collect();
            if restored.is_empty() {
                return restored;
            }

            table.clear_completed();

            for id in &restored {
                if let Some(slot) = table.slots.get_mut(id) {
                    let Some(snapshot) = slot.backup.take() else {
                        continue;
                    };
                    // an entry re-added to standby since keeps its newer record
                    if slot.live.is_none() {
                        slot.live = Some(LiveEntry {
                            stage: Stage::Pending,
                            entry: snapshot,
                        });
                    }
                }
            }

            let front: HashSet<EntryId> = restored.iter().copied().collect();
            let rest: Vec<EntryId> = table
                .order
                .iter()
                .filter(|id| !front.contains(id))
                .copied()
                .collect();
            table.order = restored.iter().chain(rest.iter()).copied().collect();
            table.prune();
            restored
        };

        self.events.broadcast(EventPayload::Restored {
            ids: restored.clone(),
        });
        restored
    }

    /// Drop completed entries, keeping backup snapshots for undo.
    pub fn invalidate_complete(&self) -> Vec<EntryId> {
        let cleared = self.table.write().clear_completed();
        if !cleared.is_empty() {
            self.events.broadcast(EventPayload::CompleteInvalidated {
                ids: cleared.clone(),
            });
        }
        cleared
    }

    /// Delete an id from standby, complete and backup.
    pub fn remove_item(&self, id: EntryId) -> bool {
        let removed = {
            let mut table = self.table.write();
            let removed = table.slots.remove(&id).is_some();
            if removed {
                table.order.retain(|other| *other != id);
            }
            removed
        };

        if removed {
            self.events.broadcast(EventPayload::EntryRemoved { id });
        }
        removed
    }

    /// Clear all three views.
    pub fn remove_all(&self) {
        {
            let mut table = self.table.write();
            table.slots.clear();
            table.order.clear();
        }
        self.events.broadcast(EventPayload::Cleared);
    }

    // ------------------------------------------------------------------
    // Progress / status
    // ------------------------------------------------------------------

    pub fn progress(&self) -> ProgressState {
        *self.progress.read()
    }

    /// `true` while an ingestion or conversion is running.
    pub fn is_locked(&self) -> bool {
        self.progress.read().status != Status::Idle
    }

    /// Enter `status`, resetting count and total.
    ///
    /// Fails with [`Error::Busy`] if another operation is running. The
    /// returned guard puts the store back to idle when dropped.
    pub fn begin(&self, status: Status) -> Result<OperationGuard<'_>> {
        if status == Status::Idle {
            return Err(Error::internal("cannot begin an idle operation"));
        }

        {
            let mut progress = self.progress.write();
            if progress.status != Status::Idle {
                return Err(Error::busy(progress.status.as_str()));
            }
            *progress = ProgressState {
                status,
                count: 0,
                total: 0,
            };
        }

        self.events.broadcast(EventPayload::StatusChanged { status });
        Ok(OperationGuard { store: self })
    }

    pub fn set_total(&self, total: usize) {
        let snapshot = {
            let mut progress = self.progress.write();
            progress.total = total;
            *progress
        };
        self.broadcast_progress(snapshot);
    }

    /// Count `n` more processed items.
    pub fn advance(&self, n: usize) {
        let snapshot = {
            let mut progress = self.progress.write();
            progress.count += n;
            *progress
        };
        self.broadcast_progress(snapshot);
    }

    fn broadcast_progress(&self, progress: ProgressState) {
        self.events.broadcast(EventPayload::ProgressChanged {
            count: progress.count,
            total: progress.total,
        });
    }

    fn finish(&self) {
        self.progress.write().status = Status::Idle;
        self.events.broadcast(EventPayload::StatusChanged {
            status: Status::Idle,
        });
    }
}

/// Holds the store's non-idle status for one operation.
pub struct OperationGuard<'a> {
    store: &'a StateStore,
}

impl std::fmt::Debug for OperationGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationGuard").finish_non_exhaustive()
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.store.finish();
    }
}
