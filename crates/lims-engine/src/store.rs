//! # Store Contracts
//!
//! The engine does not own entity rows or the audit log. It talks to them
//! through these traits:
//!
//! - [`LifecycleStore`] opens units of work and answers read-only queries.
//! - A unit of work ([`UnitOfWork`]) is both an [`EntityStore`] and an
//!   [`AuditSink`]. Everything written through it becomes visible on
//!   [`UnitOfWork::commit`] and not before. Dropping it uncommitted rolls
//!   everything back.
//!
//! [`EntityStore::read_for_update`] must lock the row for the rest of the
//! unit of work, so a second unit of work reading the same row waits until
//! the first commits or rolls back and then sees its result.

use std::future::Future;

use lims_core::{EntityId, EntityType, OrganizationId, Timestamp};
use lims_state::Status;

use crate::error::EngineError;
use crate::record::{ApprovalAction, AuditRecord, EntityKey, EntityRecord, ReviewState};

/// Row access inside a unit of work.
pub trait EntityStore: Send {
    /// Read and lock one row. `NotFound` if it does not exist.
    fn read_for_update(
        &mut self,
        key: EntityKey,
    ) -> impl Future<Output = Result<EntityRecord, EngineError>> + Send;

    /// Write a new status to a row locked by this unit of work.
    fn write_status(
        &mut self,
        key: EntityKey,
        status: Status,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Replace the review stamps of a Test locked by this unit of work.
    fn write_review(
        &mut self,
        key: EntityKey,
        review: ReviewState,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}

/// Append-only audit log inside a unit of work.
pub trait AuditSink: Send {
    fn append(&mut self, record: AuditRecord) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn append_approval(
        &mut self,
        action: ApprovalAction,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}

/// An all-or-nothing scope over rows and the audit log.
pub trait UnitOfWork: EntityStore + AuditSink + Sized {
    fn commit(self) -> impl Future<Output = Result<(), EngineError>> + Send;
}

/// A backing store for lifecycle entities.
pub trait LifecycleStore: Send + Sync {
    type Work: UnitOfWork;

    /// Open a unit of work.
    fn begin(&self) -> impl Future<Output = Result<Self::Work, EngineError>> + Send;

    /// Persist a new entity in the initial status of its type.
    fn create(
        &self,
        entity_type: EntityType,
        organization_id: OrganizationId,
        order_id: Option<EntityId>,
    ) -> impl Future<Output = Result<EntityRecord, EngineError>> + Send;

    /// Unlocked read of one row.
    fn find(
        &self,
        key: EntityKey,
    ) -> impl Future<Output = Result<Option<EntityRecord>, EngineError>> + Send;

    /// Every entity of `status`'s type in `status` within one organization.
    fn list_by_status(
        &self,
        organization_id: OrganizationId,
        status: Status,
    ) -> impl Future<Output = Result<Vec<EntityRecord>, EngineError>> + Send;

    /// The Tests belonging to one order.
    fn tests_for_order(
        &self,
        order_id: EntityId,
    ) -> impl Future<Output = Result<Vec<EntityRecord>, EngineError>> + Send;
}
