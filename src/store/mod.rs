//! Execution Store
//!
//! In-memory table of execution records shared by the realtime channel, the
//! execution client and any readers. The store is an explicit handle: create
//! one with [`ExecutionStore::new`], clone it wherever it is needed and call
//! [`ExecutionStore::reset`] to drop everything at once.
//!
//! Writes are serialized behind a lock and every operation is total. Once a
//! record reaches a terminal status it is frozen: later upserts, updates and
//! completions are ignored.

use crate::defaults;
use crate::types::{ExecutionRecord, ExecutionStatus, ExecutionUpdate};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Change notification emitted after a write took effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Upserted(String),
    Updated(String),
    Completed(String),
    Removed(String),
    Reset,
}

struct Inner {
    records: RwLock<HashMap<String, ExecutionRecord>>,
    events: broadcast::Sender<StoreEvent>,
}

/// Shared handle over the execution table.
#[derive(Clone)]
pub struct ExecutionStore {
    inner: Arc<Inner>,
}

impl Default for ExecutionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecutionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionStore")
            .field("records", &self.len())
            .finish()
    }
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::with_event_capacity(defaults::execution::STORE_EVENT_CAPACITY)
    }

    /// Create a store whose change feed buffers `capacity` events per receiver.
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                records: RwLock::new(HashMap::new()),
                events,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ExecutionRecord>> {
        self.inner
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ExecutionRecord>> {
        self.inner
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: StoreEvent) {
        // No receivers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Insert `record`, or merge it into the existing entry.
    ///
    /// The existing `started_at` is kept. Returns `false` when the existing
    /// entry is terminal and the call was ignored.
    pub fn upsert(&self, record: ExecutionRecord) -> bool {
        let id = record.id.clone();
        {
            let mut records = self.write();
            match records.get_mut(&id) {
                Some(existing) if existing.is_terminal() => {
                    tracing::debug!(target: "flowstream::store", id = %id, "ignoring upsert on terminal record");
                    return false;
                }
                Some(existing) => {
                    existing.merge(ExecutionUpdate::from_record(&record));
                    if existing.is_terminal()
                        && let Some(at) = record.completed_at
                    {
                        existing.completed_at = Some(at);
                    }
                }
                None => {
                    let mut fresh = ExecutionRecord::new(id.clone(), ExecutionStatus::Pending);
                    fresh.started_at = record.started_at;
                    fresh.merge(ExecutionUpdate::from_record(&record));
                    if fresh.is_terminal()
                        && let Some(at) = record.completed_at
                    {
                        fresh.completed_at = Some(at);
                    }
                    records.insert(id.clone(), fresh);
                }
            }
        }
        tracing::trace!(target: "flowstream::store", id = %id, "record upserted");
        self.notify(StoreEvent::Upserted(id));
        true
    }

    /// Merge `update` into an existing, non-terminal record.
    ///
    /// Never creates a record. Returns whether the update applied.
    pub fn update(&self, id: &str, update: ExecutionUpdate) -> bool {
        {
            let mut records = self.write();
            let Some(record) = records.get_mut(id) else {
                tracing::trace!(target: "flowstream::store", id = %id, "ignoring update for unknown record");
                return false;
            };
            if record.is_terminal() {
                tracing::debug!(target: "flowstream::store", id = %id, "ignoring update on terminal record");
                return false;
            }
            record.merge(update);
        }
        self.notify(StoreEvent::Updated(id.to_string()));
        true
    }

    /// Finalize a record with a terminal `status`.
    ///
    /// No-op when the record is unknown, already terminal, or `status` is not
    /// terminal. `result` and `error` overwrite the stored values when given.
    pub fn complete(
        &self,
        id: &str,
        status: ExecutionStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> bool {
        if !status.is_terminal() {
            tracing::debug!(target: "flowstream::store", id = %id, status = %status, "complete called with non-terminal status");
            return false;
        }
        {
            let mut records = self.write();
            let Some(record) = records.get_mut(id) else {
                return false;
            };
            if record.is_terminal() {
                tracing::debug!(target: "flowstream::store", id = %id, "record already terminal");
                return false;
            }
            record.status = status;
            if result.is_some() {
                record.result = result;
            }
            if error.is_some() {
                record.error = error;
            }
            record.completed_at = Some(Utc::now());
        }
        tracing::debug!(target: "flowstream::store", id = %id, status = %status, "execution completed");
        self.notify(StoreEvent::Completed(id.to_string()));
        true
    }

    /// Delete a record. Unknown ids are fine.
    pub fn remove(&self, id: &str) -> Option<ExecutionRecord> {
        let removed = self.write().remove(id);
        if removed.is_some() {
            self.notify(StoreEvent::Removed(id.to_string()));
        }
        removed
    }

    /// Drop every record.
    pub fn reset(&self) {
        self.write().clear();
        self.notify(StoreEvent::Reset);
    }

    pub fn get(&self, id: &str) -> Option<ExecutionRecord> {
        self.read().get(id).cloned()
    }

    /// Snapshot of all records, oldest first.
    pub fn list(&self) -> Vec<ExecutionRecord> {
        let mut out: Vec<ExecutionRecord> = self.read().values().cloned().collect();
        out.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Receive a [`StoreEvent`] for every write that takes effect.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }
}
