//! Combined Raft Storage Implementation
//!
//! Implements the combined `RaftStorage` trait (v1 API): log storage, state
//! machine application and snapshot building in one type, wrapped by
//! openraft's `Adaptor`.
//!
//! Everything openraft needs to survive a restart is persisted under the
//! group's [`StorageLayout`]:
//! - `<log>/raft_log.bin`: length-prefixed bincode log entries
//! - `<meta>/raft_meta.bin`: vote, committed and purged log ids
//! - `<snapshot>/snapshot.bin`: latest snapshot (when snapshots are enabled)

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::io::Cursor;
use std::ops::RangeBounds;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use openraft::storage::{Adaptor, LogState, RaftLogReader, RaftStorage, Snapshot};
use openraft::{
    Entry, EntryPayload, LogId, OptionalSend, RaftSnapshotBuilder, SnapshotMeta, StorageError,
    StorageIOError, StoredMembership, Vote,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::Span;

use super::files::{read_optional, write_atomic, LogFile};
use super::layout::StorageLayout;
use super::types::{PeerNode, StoreTypeConfig};
use crate::state_machine::{decode, encode, ApplyResult, StoreStateMachine};
use crate::{GroupId, RaftError, StoreCommand};

/// Storage adaptor handed to `openraft::Raft::new`
pub type StoreAdaptor = Adaptor<StoreTypeConfig, Arc<RaftStore>>;

const LOG_FILE: &str = "raft_log.bin";
const META_FILE: &str = "raft_meta.bin";
const SNAPSHOT_FILE: &str = "snapshot.bin";

/// Vote and log markers persisted in the meta directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HardState {
    vote: Option<Vote<u64>>,
    committed: Option<LogId<u64>>,
    last_purged: Option<LogId<u64>>,
}

/// Snapshot as persisted in the snapshot directory
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSnapshot {
    meta: SnapshotMeta<u64, PeerNode>,
    data: Vec<u8>,
}

/// Snapshot payload: raft bookkeeping plus the opaque state machine blob
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct StateMachineData {
    last_applied_log: Option<LogId<u64>>,
    last_membership: StoredMembership<u64, PeerNode>,
    state: Vec<u8>,
}

/// Durable combined storage for one replication group
pub struct RaftStore {
    group: GroupId,
    log_file: LogFile,
    meta_path: PathBuf,
    snapshot_path: Option<PathBuf>,

    log: RwLock<BTreeMap<u64, Entry<StoreTypeConfig>>>,
    hard_state: RwLock<HardState>,

    state_machine: Arc<dyn StoreStateMachine>,
    last_applied: RwLock<Option<LogId<u64>>>,
    last_membership: RwLock<StoredMembership<u64, PeerNode>>,

    snapshot_idx: AtomicU64,
    current_snapshot: RwLock<Option<StoredSnapshot>>,

    span: Span,
}

impl Debug for RaftStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaftStore")
            .field("group", &self.group)
            .field("log_file", &self.log_file.path())
            .field("snapshot_idx", &self.snapshot_idx)
            .finish_non_exhaustive()
    }
}

impl RaftStore {
    /// Open the store, reloading the snapshot, log and hard state found
    /// under `layout`. The layout directories must already exist.
    pub async fn open(
        group: GroupId,
        layout: &StorageLayout,
        state_machine: Arc<dyn StoreStateMachine>,
        span: Span,
    ) -> Result<Self, RaftError> {
        let log_file = LogFile::new(layout.log_dir().join(LOG_FILE));
        let meta_path = layout.meta_dir().join(META_FILE);
        let snapshot_path = layout.snapshot_dir().map(|dir| dir.join(SNAPSHOT_FILE));

        let hard_state = match read_optional(&meta_path)? {
            Some(bytes) => decode::<HardState>(&bytes)?,
            None => HardState::default(),
        };

        let read = log_file.read()?;
        let mut log = BTreeMap::new();
        for record in &read.records {
            let entry: Entry<StoreTypeConfig> = decode(record)?;
            log.insert(entry.log_id.index, entry);
        }
        if read.torn_tail {
            tracing::warn!(
                parent: &span,
                entries = log.len(),
                "Dropping partially written record at the end of the raft log"
            );
            let records = encode_entries(&log)?;
            log_file.rewrite(records.iter().map(Vec::as_slice))?;
        }

        let store = Self {
            group,
            log_file,
            meta_path,
            snapshot_path,
            log: RwLock::new(log),
            hard_state: RwLock::new(hard_state),
            state_machine,
            last_applied: RwLock::new(None),
            last_membership: RwLock::new(StoredMembership::default()),
            snapshot_idx: AtomicU64::new(0),
            current_snapshot: RwLock::new(None),
            span,
        };

        store.load_snapshot().await?;

        tracing::debug!(
            parent: &store.span,
            entries = store.log.read().len(),
            last_applied = ?*store.last_applied.read(),
            "Opened raft store"
        );
        Ok(store)
    }

    async fn load_snapshot(&self) -> Result<(), RaftError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let Some(bytes) = read_optional(path)? else {
            return Ok(());
        };

        let stored: StoredSnapshot = decode(&bytes)?;
        let sm_data: StateMachineData = decode(&stored.data)?;
        self.state_machine.restore(&sm_data.state).await?;

        *self.last_applied.write() = stored.meta.last_log_id;
        *self.last_membership.write() = stored.meta.last_membership.clone();

        tracing::info!(
            parent: &self.span,
            snapshot_id = %stored.meta.snapshot_id,
            "Restored state machine from snapshot"
        );
        *self.current_snapshot.write() = Some(stored);
        Ok(())
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }

    pub fn state_machine(&self) -> &Arc<dyn StoreStateMachine> {
        &self.state_machine
    }

    /// Last log id applied to the state machine
    pub fn last_applied(&self) -> Option<LogId<u64>> {
        *self.last_applied.read()
    }

    fn get_log_entries(&self, range: impl RangeBounds<u64>) -> Vec<Entry<StoreTypeConfig>> {
        self.log.read().range(range).map(|(_, entry)| entry.clone()).collect()
    }

    fn persist_hard_state(&self, state: &HardState) -> Result<(), RaftError> {
        let bytes = encode(state)?;
        write_atomic(&self.meta_path, &bytes)?;
        Ok(())
    }

    /// Replace the log file with `records`. Never called with the log lock held.
    fn rewrite_log(&self, records: &[Vec<u8>]) -> Result<(), RaftError> {
        self.log_file.rewrite(records.iter().map(Vec::as_slice))?;
        Ok(())
    }

    /// Drop log entries up to and including `log_id` and remember the purge point
    fn purge_through(&self, log_id: LogId<u64>) -> Result<(), RaftError> {
        let records = {
            let mut log = self.log.write();
            let keep = log.split_off(&(log_id.index + 1));
            *log = keep;
            encode_entries(&log)?
        };
        self.rewrite_log(&records)?;

        let state = {
            let mut hard_state = self.hard_state.write();
            hard_state.last_purged = Some(log_id);
            hard_state.clone()
        };
        self.persist_hard_state(&state)
    }

    async fn apply_entry(&self, entry: &Entry<StoreTypeConfig>) -> ApplyResult {
        let log_id = entry.log_id;
        *self.last_applied.write() = Some(log_id);

        match &entry.payload {
            EntryPayload::Blank => ApplyResult::NoOp,
            EntryPayload::Normal(data) => {
                let command = match StoreCommand::from_entry(data) {
                    Ok(command) => command,
                    Err(e) => {
                        tracing::error!(parent: &self.span, index = log_id.index, error = %e, "Failed to decode log entry");
                        return ApplyResult::Error(e.to_string());
                    }
                };

                let sm = self.state_machine.clone();
                match sm.apply(log_id.index, log_id.leader_id.term, command).await {
                    Ok(ApplyResult::Error(e)) => {
                        tracing::warn!(parent: &self.span, index = log_id.index, error = %e, "State machine rejected command");
                        ApplyResult::Error(e)
                    }
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!(parent: &self.span, index = log_id.index, error = %e, "State machine apply failed");
                        ApplyResult::Error(e.to_string())
                    }
                }
            }
            EntryPayload::Membership(membership) => {
                *self.last_membership.write() = StoredMembership::new(Some(log_id), membership.clone());
                ApplyResult::NoOp
            }
        }
    }
}

fn encode_entries(log: &BTreeMap<u64, Entry<StoreTypeConfig>>) -> Result<Vec<Vec<u8>>, RaftError> {
    log.values().map(encode).collect()
}

impl RaftLogReader<StoreTypeConfig> for Arc<RaftStore> {
    async fn try_get_log_entries<RB: RangeBounds<u64> + Clone + Debug + OptionalSend>(
        &mut self,
        range: RB,
    ) -> Result<Vec<Entry<StoreTypeConfig>>, StorageError<u64>> {
        Ok(self.get_log_entries(range))
    }
}

impl RaftSnapshotBuilder<StoreTypeConfig> for Arc<RaftStore> {
    async fn build_snapshot(&mut self) -> Result<Snapshot<StoreTypeConfig>, StorageError<u64>> {
        let last_applied = *self.last_applied.read();
        let last_membership = self.last_membership.read().clone();

        let state = self
            .state_machine
            .snapshot()
            .await
            .map_err(|e| StorageIOError::read_state_machine(&e))?;

        let data = StateMachineData {
            last_applied_log: last_applied,
            last_membership: last_membership.clone(),
            state,
        };
        let serialized = encode(&data).map_err(|e| StorageIOError::read_state_machine(&e))?;

        let snapshot_idx = self.snapshot_idx.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot_id = match last_applied {
            Some(last) => format!("{}-{}-{}", last.leader_id, last.index, snapshot_idx),
            None => format!("--{}", snapshot_idx),
        };

        let meta = SnapshotMeta {
            last_log_id: last_applied,
            last_membership,
            snapshot_id,
        };
        let stored = StoredSnapshot {
            meta: meta.clone(),
            data: serialized.clone(),
        };

        if let Some(path) = &self.snapshot_path {
            let bytes = encode(&stored).map_err(|e| StorageIOError::write_snapshot(Some(meta.signature()), &e))?;
            write_atomic(path, &bytes)
                .map_err(|e| StorageIOError::write_snapshot(Some(meta.signature()), &e))?;
        }

        tracing::info!(parent: &self.span, snapshot_id = %meta.snapshot_id, "Built snapshot");
        *self.current_snapshot.write() = Some(stored);

        Ok(Snapshot {
            meta,
            snapshot: Box::new(Cursor::new(serialized)),
        })
    }
}

#[allow(deprecated)] // RaftStorage is deprecated in favor of v2 traits, but v2 is sealed
impl RaftStorage<StoreTypeConfig> for Arc<RaftStore> {
    type LogReader = Self;
    type SnapshotBuilder = Self;

    // --- Vote operations ---

    async fn save_vote(&mut self, vote: &Vote<u64>) -> Result<(), StorageError<u64>> {
        let state = {
            let mut hard_state = self.hard_state.write();
            hard_state.vote = Some(vote.clone());
            hard_state.clone()
        };
        self.persist_hard_state(&state)
            .map_err(|e| StorageIOError::write_vote(&e))?;
        Ok(())
    }

    async fn read_vote(&mut self) -> Result<Option<Vote<u64>>, StorageError<u64>> {
        Ok(self.hard_state.read().vote.clone())
    }

    async fn save_committed(&mut self, committed: Option<LogId<u64>>) -> Result<(), StorageError<u64>> {
        let state = {
            let mut hard_state = self.hard_state.write();
            hard_state.committed = committed;
            hard_state.clone()
        };
        self.persist_hard_state(&state)
            .map_err(|e| StorageIOError::write(&e))?;
        Ok(())
    }

    async fn read_committed(&mut self) -> Result<Option<LogId<u64>>, StorageError<u64>> {
        Ok(self.hard_state.read().committed)
    }

    // --- Log operations ---

    async fn get_log_state(&mut self) -> Result<LogState<StoreTypeConfig>, StorageError<u64>> {
        let last_purged = self.hard_state.read().last_purged;
        let last_log_id = self
            .log
            .read()
            .values()
            .next_back()
            .map(|e| e.log_id)
            .or(last_purged);

        Ok(LogState {
            last_purged_log_id: last_purged,
            last_log_id,
        })
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        self.clone()
    }

    async fn append_to_log<I>(&mut self, entries: I) -> Result<(), StorageError<u64>>
    where
        I: IntoIterator<Item = Entry<StoreTypeConfig>> + OptionalSend,
    {
        let entries: Vec<Entry<StoreTypeConfig>> = entries.into_iter().collect();
        let records = entries
            .iter()
            .map(encode)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageIOError::write_logs(&e))?;

        self.log_file
            .append(records.iter().map(Vec::as_slice))
            .map_err(|e| StorageIOError::write_logs(&e))?;

        let mut log = self.log.write();
        for entry in entries {
            log.insert(entry.log_id.index, entry);
        }
        Ok(())
    }

    async fn delete_conflict_logs_since(&mut self, log_id: LogId<u64>) -> Result<(), StorageError<u64>> {
        let (records, removed) = {
            let mut log = self.log.write();
            let removed = log.split_off(&log_id.index).len();
            let records = encode_entries(&log).map_err(|e| StorageIOError::write_logs(&e))?;
            (records, removed)
        };
        self.rewrite_log(&records)
            .map_err(|e| StorageIOError::write_logs(&e))?;

        tracing::debug!(parent: &self.span, since = log_id.index, removed, "Deleted conflicting log entries");
        Ok(())
    }

    async fn purge_logs_upto(&mut self, log_id: LogId<u64>) -> Result<(), StorageError<u64>> {
        self.purge_through(log_id)
            .map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    // --- State Machine operations ---

    async fn last_applied_state(
        &mut self,
    ) -> Result<(Option<LogId<u64>>, StoredMembership<u64, PeerNode>), StorageError<u64>> {
        let last_applied = *self.last_applied.read();
        let last_membership = self.last_membership.read().clone();
        Ok((last_applied, last_membership))
    }

    async fn apply_to_state_machine(
        &mut self,
        entries: &[Entry<StoreTypeConfig>],
    ) -> Result<Vec<ApplyResult>, StorageError<u64>> {
        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            results.push(self.apply_entry(entry).await);
        }
        Ok(results)
    }

    // --- Snapshot operations ---

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        self.clone()
    }

    async fn begin_receiving_snapshot(&mut self) -> Result<Box<Cursor<Vec<u8>>>, StorageError<u64>> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    async fn install_snapshot(
        &mut self,
        meta: &SnapshotMeta<u64, PeerNode>,
        snapshot: Box<Cursor<Vec<u8>>>,
    ) -> Result<(), StorageError<u64>> {
        let data = snapshot.into_inner();

        let sm_data: StateMachineData = decode(&data)
            .map_err(|e| StorageIOError::read_snapshot(Some(meta.signature()), &e))?;
        self.state_machine
            .restore(&sm_data.state)
            .await
            .map_err(|e| StorageIOError::write_state_machine(&e))?;

        *self.last_applied.write() = meta.last_log_id;
        *self.last_membership.write() = meta.last_membership.clone();

        let stored = StoredSnapshot {
            meta: meta.clone(),
            data,
        };
        if let Some(path) = &self.snapshot_path {
            let bytes = encode(&stored).map_err(|e| StorageIOError::write_snapshot(Some(meta.signature()), &e))?;
            write_atomic(path, &bytes)
                .map_err(|e| StorageIOError::write_snapshot(Some(meta.signature()), &e))?;
        }
        *self.current_snapshot.write() = Some(stored);

        if let Some(last_log_id) = meta.last_log_id {
            self.purge_through(last_log_id)
                .map_err(|e| StorageIOError::write_logs(&e))?;
        }

        tracing::info!(parent: &self.span, snapshot_id = %meta.snapshot_id, "Installed snapshot");
        Ok(())
    }

    async fn get_current_snapshot(&mut self) -> Result<Option<Snapshot<StoreTypeConfig>>, StorageError<u64>> {
        let current = self.current_snapshot.read();
        Ok(current.as_ref().map(|snapshot| Snapshot {
            meta: snapshot.meta.clone(),
            snapshot: Box::new(Cursor::new(snapshot.data.clone())),
        }))
    }
}
