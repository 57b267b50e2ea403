//! The workflow store: every unit of work of a session, partitioned by
//! outcome.
//!
//! All partition mutation happens inside one write-lock critical section,
//! so an id is never in two partitions and never observably missing while
//! it moves. Change events are sent after the lock is released.

pub mod event;

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::error::{PagesortError, ProcessError, StoreError};
use crate::stage::{apply_rename, clean_file_name, Partition, StageId, StageRecord};
use crate::storage::DocumentRenamer;

pub use event::{StoreChange, StoreEvent};
use event::StoreEvents;

const EVENT_CAPACITY: usize = 256;

/// Result of a move that was guarded by an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Applied,
    /// The store was cleared since the epoch was read; nothing changed.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed(StageRecord),
    Discarded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PartitionCounts {
    pub pending: usize,
    pub succeeded: usize,
    pub errored: usize,
    pub finished: usize,
}

impl PartitionCounts {
    pub fn total(&self) -> usize {
        self.pending + self.succeeded + self.errored + self.finished
    }
}

/// Point-in-time copy of all partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub pending: Vec<StageRecord>,
    pub succeeded: Vec<StageRecord>,
    pub errored: Vec<StageRecord>,
    pub finished: Vec<StageRecord>,
    pub epoch: u64,
}

#[derive(Default)]
struct Partitions {
    lists: [Vec<StageRecord>; 4],
    epoch: u64,
    /// Finished record whose document is being renamed on disk.
    renaming: Option<StageId>,
}

impl Partitions {
    fn list(&self, partition: Partition) -> &Vec<StageRecord> {
        &self.lists[partition.index()]
    }

    fn list_mut(&mut self, partition: Partition) -> &mut Vec<StageRecord> {
        &mut self.lists[partition.index()]
    }

    fn locate(&self, id: &StageId) -> Option<(Partition, usize)> {
        Partition::ALL.into_iter().find_map(|partition| {
            self.list(partition)
                .iter()
                .position(|r| r.id() == id)
                .map(|index| (partition, index))
        })
    }

    /// Replaces `id` with `record`, in place when the partition is unchanged.
    fn relocate(
        &mut self,
        id: &StageId,
        record: StageRecord,
    ) -> Result<(Partition, Partition), StoreError> {
        if record.id() != id {
            return Err(StoreError::IdMismatch {
                expected: id.clone(),
                actual: record.id().clone(),
            });
        }
        let (from, index) = self
            .locate(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let to = record.partition();

        if from == to {
            self.list_mut(from)[index] = record;
        } else {
            self.list_mut(from).remove(index);
            self.list_mut(to).push(record);
        }
        Ok((from, to))
    }
}

/// Records of one session, in four disjoint ordered partitions.
pub struct WorkflowStore {
    partitions: RwLock<Partitions>,
    events: StoreEvents,
    rename_lock: tokio::sync::Mutex<()>,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(Partitions::default()),
            events: StoreEvents::new(EVENT_CAPACITY),
            rename_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Partitions> {
        match self.partitions.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Workflow store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Partitions> {
        match self.partitions.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Workflow store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Subscribes to change events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn add(&self, record: StageRecord) -> Result<(), StoreError> {
        let id = record.id().clone();
        let partition = record.partition();
        let epoch = {
            let mut partitions = self.write();
            if partitions.locate(&id).is_some() {
                return Err(StoreError::DuplicateId(id));
            }
            partitions.list_mut(partition).push(record);
            partitions.epoch
        };

        tracing::debug!(id = %id, partition = %partition, "Record added");
        self.events
            .send(StoreEvent::new(StoreChange::Added { id, partition }, epoch));
        Ok(())
    }

    /// Atomically swaps the record stored under `id` for `record`.
    pub fn move_to_partition(&self, id: &StageId, record: StageRecord) -> Result<(), StoreError> {
        let (from, to, epoch) = {
            let mut partitions = self.write();
            let (from, to) = partitions.relocate(id, record)?;
            (from, to, partitions.epoch)
        };

        self.emit_moved(id, from, to, epoch);
        Ok(())
    }

    /// Like [`move_to_partition`](Self::move_to_partition), but only while
    /// the store is still at `expected_epoch`.
    pub fn move_to_partition_at(
        &self,
        expected_epoch: u64,
        id: &StageId,
        record: StageRecord,
    ) -> Result<MoveOutcome, StoreError> {
        self.guarded_move(expected_epoch, id, None, record)
    }

    /// Like [`move_to_partition_at`](Self::move_to_partition_at), and only
    /// if the stored record is still in stage `from_stage`.
    ///
    /// Of two workers that read the same record, only the first to commit
    /// gets to move it; the other gets [`StoreError::StageChanged`].
    pub fn move_to_partition_from(
        &self,
        expected_epoch: u64,
        id: &StageId,
        from_stage: &'static str,
        record: StageRecord,
    ) -> Result<MoveOutcome, StoreError> {
        self.guarded_move(expected_epoch, id, Some(from_stage), record)
    }

    fn guarded_move(
        &self,
        expected_epoch: u64,
        id: &StageId,
        from_stage: Option<&'static str>,
        record: StageRecord,
    ) -> Result<MoveOutcome, StoreError> {
        let (from, to, epoch) = {
            let mut partitions = self.write();
            if partitions.epoch != expected_epoch {
                tracing::debug!(
                    id = %id,
                    expected_epoch,
                    epoch = partitions.epoch,
                    "Discarding result from a previous session"
                );
                return Ok(MoveOutcome::Discarded);
            }
            if let Some(expected) = from_stage {
                let (partition, index) = partitions
                    .locate(id)
                    .ok_or_else(|| StoreError::NotFound(id.clone()))?;
                let actual = partitions.list(partition)[index].stage().name();
                if actual != expected {
                    return Err(StoreError::StageChanged {
                        id: id.clone(),
                        expected,
                        actual,
                    });
                }
            }
            let (from, to) = partitions.relocate(id, record)?;
            (from, to, partitions.epoch)
        };

        self.emit_moved(id, from, to, epoch);
        Ok(MoveOutcome::Applied)
    }

    fn emit_moved(&self, id: &StageId, from: Partition, to: Partition, epoch: u64) {
        tracing::debug!(id = %id, from = %from, to = %to, "Record moved");
        self.events.send(StoreEvent::new(
            StoreChange::Moved {
                id: id.clone(),
                from,
                to,
            },
            epoch,
        ));
    }

    /// Renames the document of a finished record.
    ///
    /// The record stays visible with its old name while the renamer runs and
    /// is replaced at the same position once the rename succeeded. A failed
    /// rename leaves it untouched. Renames are serialized, and the record
    /// cannot be removed while its rename runs.
    pub async fn rename_finished(
        &self,
        id: &StageId,
        raw_name: &str,
        renamer: &dyn DocumentRenamer,
    ) -> Result<RenameOutcome, PagesortError> {
        let _rename_guard = self.rename_lock.lock().await;

        let (record, epoch) = {
            let mut partitions = self.write();
            match partitions.locate(id) {
                Some((Partition::Finished, index)) => {
                    partitions.renaming = Some(id.clone());
                    (
                        partitions.list(Partition::Finished)[index].clone(),
                        partitions.epoch,
                    )
                }
                Some(_) => {
                    return Err(StoreError::NotInPartition {
                        id: id.clone(),
                        partition: Partition::Finished,
                    }
                    .into())
                }
                None => return Err(StoreError::NotFound(id.clone()).into()),
            }
        };
        let _marker = RenameMarker { store: self };

        let prefix = record.page_number_prefix().unwrap_or_default().to_string();
        let document_path = record
            .document()
            .map(|d| d.document_path.clone())
            .unwrap_or_default();
        let clean_name = clean_file_name(raw_name, &prefix);

        let new_path = renamer
            .rename(&document_path, &clean_name)
            .await
            .map_err(ProcessError::RenameFailed)?;
        let renamed = apply_rename(record, new_path.to_string_lossy().into_owned(), clean_name)?;

        let epoch = {
            let mut partitions = self.write();
            if partitions.epoch != epoch {
                tracing::warn!(id = %id, "Store was cleared during rename, dropping result");
                return Ok(RenameOutcome::Discarded);
            }
            let index = partitions
                .list(Partition::Finished)
                .iter()
                .position(|r| r.id() == id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            partitions.list_mut(Partition::Finished)[index] = renamed.clone();
            partitions.epoch
        };

        let file_name = renamed
            .document()
            .map(|d| d.file_name.clone())
            .unwrap_or_default();
        tracing::info!(id = %id, file_name = %file_name, "Document renamed");
        self.events.send(StoreEvent::new(
            StoreChange::Renamed {
                id: id.clone(),
                file_name,
            },
            epoch,
        ));
        Ok(RenameOutcome::Renamed(renamed))
    }

    pub fn remove(&self, id: &StageId) -> Result<StageRecord, StoreError> {
        let (record, partition, epoch) = {
            let mut partitions = self.write();
            let (partition, index) = partitions
                .locate(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            if partitions.renaming.as_ref() == Some(id) {
                return Err(StoreError::RenameInProgress(id.clone()));
            }
            let record = partitions.list_mut(partition).remove(index);
            (record, partition, partitions.epoch)
        };

        tracing::debug!(id = %id, partition = %partition, "Record removed");
        self.events.send(StoreEvent::new(
            StoreChange::Removed {
                id: id.clone(),
                partition,
            },
            epoch,
        ));
        Ok(record)
    }

    pub fn get(&self, id: &StageId) -> Option<StageRecord> {
        let partitions = self.read();
        partitions
            .locate(id)
            .map(|(partition, index)| partitions.list(partition)[index].clone())
    }

    pub fn partition_of(&self, id: &StageId) -> Option<Partition> {
        self.read().locate(id).map(|(partition, _)| partition)
    }

    pub fn list(&self, partition: Partition) -> Vec<StageRecord> {
        self.read().list(partition).clone()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let partitions = self.read();
        StoreSnapshot {
            pending: partitions.list(Partition::Pending).clone(),
            succeeded: partitions.list(Partition::Succeeded).clone(),
            errored: partitions.list(Partition::Errored).clone(),
            finished: partitions.list(Partition::Finished).clone(),
            epoch: partitions.epoch,
        }
    }

    pub fn counts(&self) -> PartitionCounts {
        let partitions = self.read();
        PartitionCounts {
            pending: partitions.list(Partition::Pending).len(),
            succeeded: partitions.list(Partition::Succeeded).len(),
            errored: partitions.list(Partition::Errored).len(),
            finished: partitions.list(Partition::Finished).len(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.read().epoch
    }

    /// Empties every partition and starts a new epoch. Returns the new epoch.
    pub fn clear(&self) -> u64 {
        let epoch = {
            let mut partitions = self.write();
            for list in partitions.lists.iter_mut() {
                list.clear();
            }
            partitions.epoch += 1;
            partitions.epoch
        };

        tracing::debug!(epoch, "Workflow store cleared");
        self.events
            .send(StoreEvent::new(StoreChange::Cleared, epoch));
        epoch
    }
}

/// Clears the rename mark when `rename_finished` returns on any path.
struct RenameMarker<'a> {
    store: &'a WorkflowStore,
}

impl Drop for RenameMarker<'_> {
    fn drop(&mut self) {
        self.store.write().renaming = None;
    }
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}
