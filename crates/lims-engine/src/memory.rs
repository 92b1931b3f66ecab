//! # In-Memory Store
//!
//! A [`LifecycleStore`] backed by process memory, for tests, demos and
//! single-process deployments.
//!
//! Each row has its own async mutex. A unit of work takes the row's lock in
//! `read_for_update` and keeps the owned guard until it is committed or
//! dropped, so the read-validate-write sequence is serialised per row while
//! different rows proceed in parallel. Writes are buffered in the unit of
//! work and applied in one step on commit; a dropped unit of work simply
//! discards its buffer.
//!
//! The synchronous `parking_lot` locks guarding the maps are never held
//! across an `.await`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::OwnedMutexGuard;

use lims_core::{EntityId, EntityType, OrganizationId, Timestamp};
use lims_state::Status;

use crate::audit::{verify_chain, ChainIntegrity, ChainedAuditRecord, GENESIS_HASH};
use crate::error::EngineError;
use crate::record::{ApprovalAction, AuditRecord, EntityKey, EntityRecord, ReviewState};
use crate::store::{AuditSink, EntityStore, LifecycleStore, UnitOfWork};

struct Row {
    lock: Arc<tokio::sync::Mutex<()>>,
    record: EntityRecord,
}

#[derive(Default)]
struct Inner {
    rows: RwLock<HashMap<EntityKey, Row>>,
    audit: Mutex<Vec<ChainedAuditRecord>>,
    approvals: Mutex<Vec<ApprovalAction>>,
    fail_audit: AtomicBool,
}

/// Shared in-memory store. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("rows", &self.inner.rows.read().len())
            .field("audit_records", &self.inner.audit.lock().len())
            .finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a record from another system as-is. No audit record is written.
    ///
    /// Only new keys are accepted. An existing row's status changes through
    /// the executor alone, and its row lock is never replaced.
    pub fn import(&self, record: EntityRecord) -> Result<(), EngineError> {
        let key = record.key();
        match self.inner.rows.write().entry(key) {
            Entry::Occupied(_) => Err(EngineError::Validation(format!("{key} already exists"))),
            Entry::Vacant(slot) => {
                slot.insert(Row {
                    lock: Arc::default(),
                    record,
                });
                Ok(())
            }
        }
    }

    /// Committed snapshot of one row.
    pub fn get(&self, key: EntityKey) -> Option<EntityRecord> {
        self.inner.rows.read().get(&key).map(|row| row.record.clone())
    }

    /// Every committed audit record, in append order.
    pub fn audit_log(&self) -> Vec<ChainedAuditRecord> {
        self.inner.audit.lock().clone()
    }

    /// Committed audit records of one entity, in append order.
    pub fn audit_log_for(&self, key: EntityKey) -> Vec<ChainedAuditRecord> {
        self.inner
            .audit
            .lock()
            .iter()
            .filter(|r| r.record.key() == key)
            .cloned()
            .collect()
    }

    /// Every committed approval action, in append order.
    pub fn approval_actions(&self) -> Vec<ApprovalAction> {
        self.inner.approvals.lock().clone()
    }

    /// Walk the audit chain of one entity.
    pub fn verify_audit_chain(&self, key: EntityKey) -> ChainIntegrity {
        verify_chain(&self.audit_log_for(key))
    }

    /// Make every subsequent audit append fail until reset.
    pub fn fail_audit_appends(&self, fail: bool) {
        self.inner.fail_audit.store(fail, Ordering::SeqCst);
    }

    fn select(&self, predicate: impl Fn(&EntityRecord) -> bool) -> Vec<EntityRecord> {
        let rows = self.inner.rows.read();
        let mut found: Vec<EntityRecord> = rows
            .values()
            .map(|row| &row.record)
            .filter(|record| predicate(record))
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.updated_at, r.id));
        found
    }
}

impl LifecycleStore for MemoryStore {
    type Work = MemoryUnitOfWork;

    async fn begin(&self) -> Result<MemoryUnitOfWork, EngineError> {
        Ok(MemoryUnitOfWork {
            inner: Arc::clone(&self.inner),
            held: HashMap::new(),
            snapshots: HashMap::new(),
            audit: Vec::new(),
            approvals: Vec::new(),
        })
    }

    async fn create(
        &self,
        entity_type: EntityType,
        organization_id: OrganizationId,
        order_id: Option<EntityId>,
    ) -> Result<EntityRecord, EngineError> {
        let record = EntityRecord::new(entity_type, organization_id, order_id);
        self.import(record.clone())?;
        tracing::debug!(entity = %record.key(), status = %record.status, "entity created");
        Ok(record)
    }

    async fn find(&self, key: EntityKey) -> Result<Option<EntityRecord>, EngineError> {
        Ok(self.get(key))
    }

    async fn list_by_status(
        &self,
        organization_id: OrganizationId,
        status: Status,
    ) -> Result<Vec<EntityRecord>, EngineError> {
        Ok(self.select(|r| r.organization_id == organization_id && r.status == status))
    }

    async fn tests_for_order(&self, order_id: EntityId) -> Result<Vec<EntityRecord>, EngineError> {
        Ok(self.select(|r| r.entity_type == EntityType::Test && r.order_id == Some(order_id)))
    }
}

/// A unit of work over a [`MemoryStore`].
pub struct MemoryUnitOfWork {
    inner: Arc<Inner>,
    held: HashMap<EntityKey, OwnedMutexGuard<()>>,
    /// Locked rows with this unit's pending writes applied.
    snapshots: HashMap<EntityKey, EntityRecord>,
    audit: Vec<AuditRecord>,
    approvals: Vec<ApprovalAction>,
}

impl MemoryUnitOfWork {
    fn locked(&mut self, key: EntityKey) -> Result<&mut EntityRecord, EngineError> {
        self.snapshots
            .get_mut(&key)
            .ok_or_else(|| EngineError::Storage(format!("{key} written without read_for_update")))
    }
}

impl EntityStore for MemoryUnitOfWork {
    async fn read_for_update(&mut self, key: EntityKey) -> Result<EntityRecord, EngineError> {
        if let Some(snapshot) = self.snapshots.get(&key) {
            return Ok(snapshot.clone());
        }

        let lock = {
            let rows = self.inner.rows.read();
            match rows.get(&key) {
                Some(row) => Arc::clone(&row.lock),
                None => return Err(EngineError::not_found(key.entity_type, key.id)),
            }
        };
        let guard = lock.lock_owned().await;

        // Re-read under the row lock; the previous holder may have committed.
        let record = {
            let rows = self.inner.rows.read();
            match rows.get(&key) {
                Some(row) => row.record.clone(),
                None => return Err(EngineError::not_found(key.entity_type, key.id)),
            }
        };
        self.held.insert(key, guard);
        self.snapshots.insert(key, record.clone());
        Ok(record)
    }

    async fn write_status(
        &mut self,
        key: EntityKey,
        status: Status,
        at: Timestamp,
    ) -> Result<(), EngineError> {
        let record = self.locked(key)?;
        record.status = status;
        record.updated_at = at;
        Ok(())
    }

    async fn write_review(&mut self, key: EntityKey, review: ReviewState) -> Result<(), EngineError> {
        self.locked(key)?.review = Some(review);
        Ok(())
    }
}

impl AuditSink for MemoryUnitOfWork {
    async fn append(&mut self, record: AuditRecord) -> Result<(), EngineError> {
        if self.inner.fail_audit.load(Ordering::SeqCst) {
            return Err(EngineError::Storage("audit sink unavailable".into()));
        }
        self.audit.push(record);
        Ok(())
    }

    async fn append_approval(&mut self, action: ApprovalAction) -> Result<(), EngineError> {
        if self.inner.fail_audit.load(Ordering::SeqCst) {
            return Err(EngineError::Storage("audit sink unavailable".into()));
        }
        self.approvals.push(action);
        Ok(())
    }
}

impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(mut self) -> Result<(), EngineError> {
        let snapshots = std::mem::take(&mut self.snapshots);
        let audit = std::mem::take(&mut self.audit);
        let approvals = std::mem::take(&mut self.approvals);

        {
            let mut rows = self.inner.rows.write();
            for (key, snapshot) in snapshots {
                if let Some(row) = rows.get_mut(&key) {
                    row.record = snapshot;
                }
            }
        }
        {
            let mut log = self.inner.audit.lock();
            for record in audit {
                let previous = log
                    .iter()
                    .rev()
                    .find(|r| r.record.key() == record.key())
                    .map_or(GENESIS_HASH.to_string(), |r| r.record_hash.clone());
                log.push(ChainedAuditRecord::link(record, &previous));
            }
        }
        self.inner.approvals.lock().extend(approvals);

        // Row locks are released when `self` drops here.
        Ok(())
    }
}
