//! # Transition Executor
//!
//! The only code path that changes an entity's status. One call is one
//! unit of work:
//!
//! ```text
//! begin ─▶ read_for_update ─▶ validate ─▶ write_status ─▶ append audit ─▶ commit
//!                                │              │               │
//!                                └──────────────┴───────────────┴──▶ drop (rollback)
//! ```
//!
//! The read and the write sit under the same row lock, so two callers
//! racing on one entity are serialised: the second re-validates against
//! the first one's result. Any failure after `begin` drops the unit of
//! work, which leaves both the row and the audit log untouched.

use serde_json::Value;

use lims_core::{OrganizationId, Role, Timestamp, UserId, ValidationError};
use lims_state::{authorize_transition, validate_transition, ConflictError, Status, TransitionRule};

use crate::error::EngineError;
use crate::record::{
    ApprovalAction, ApprovalLevel, AuditAction, AuditRecord, EntityKey, EntityRecord, ReviewState,
};
use crate::store::{AuditSink, EntityStore, LifecycleStore, UnitOfWork};

/// A requested status change.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub key: EntityKey,
    pub target: Status,
    /// `None` for system-initiated transitions.
    pub user_id: Option<UserId>,
    /// Caller's organization. When set, entities outside it are not found.
    pub organization_id: Option<OrganizationId>,
    pub metadata: Option<Value>,
}

impl TransitionRequest {
    pub fn new(key: EntityKey, target: impl Into<Status>) -> Self {
        Self {
            key,
            target: target.into(),
            user_id: None,
            organization_id: None,
            metadata: None,
        }
    }

    pub fn by(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn within(mut self, organization_id: OrganizationId) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Extra writes a caller attaches to a transition.
#[derive(Debug, Default)]
pub(crate) struct SideEffects {
    pub review: Option<ReviewState>,
    pub approval: Option<(ApprovalLevel, Option<String>)>,
}

/// Runs transitions against a [`LifecycleStore`].
#[derive(Debug, Clone)]
pub struct TransitionExecutor<S> {
    store: S,
}

impl<S: LifecycleStore> TransitionExecutor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Apply `request` after structural validation only.
    ///
    /// Role gating is the caller's job; see [`Self::execute_authorized`].
    pub async fn execute_transition(
        &self,
        request: TransitionRequest,
    ) -> Result<EntityRecord, EngineError> {
        self.execute_with(request, AuditAction::StatusTransition, None, |_, _| {
            Ok(SideEffects::default())
        })
        .await
    }

    /// Apply `request` if `role` may trigger it from the status read under
    /// the row lock.
    pub async fn execute_authorized(
        &self,
        request: TransitionRequest,
        role: Option<Role>,
    ) -> Result<EntityRecord, EngineError> {
        self.execute_with(request, AuditAction::StatusTransition, None, move |current, rule| {
            authorize_transition(current.entity_type, current.status, rule.to, role)?;
            Ok(SideEffects::default())
        })
        .await
    }

    /// The shared transaction body.
    ///
    /// `entry` restricts the statuses the move may start from, checked
    /// before the table. `guard` runs after structural validation, still
    /// under the row lock, and returns the side effects to write.
    pub(crate) async fn execute_with<G>(
        &self,
        request: TransitionRequest,
        action: AuditAction,
        entry: Option<&'static [Status]>,
        guard: G,
    ) -> Result<EntityRecord, EngineError>
    where
        G: FnOnce(&EntityRecord, &'static TransitionRule) -> Result<SideEffects, EngineError> + Send,
    {
        let TransitionRequest {
            key,
            target,
            user_id,
            organization_id,
            metadata,
        } = request;

        if let Some(metadata) = &metadata {
            ValidationError::require_object(metadata)?;
        }
        if target.entity_type() != key.entity_type {
            return Err(EngineError::from(lims_state::StateError::EntityTypeMismatch {
                expected: key.entity_type,
                found: target.entity_type(),
                status: target,
            }));
        }

        let mut work = self.store.begin().await?;
        let current = work.read_for_update(key).await?;
        if organization_id.is_some_and(|org| org != current.organization_id) {
            let err = EngineError::not_found(key.entity_type, key.id);
            tracing::warn!(entity = %key, to = %target, %action, "transition rejected: caller outside the owning organization");
            return Err(err);
        }

        if let Some(entry) = entry {
            if !entry.contains(&current.status) {
                let err = precondition(&current, target, entry);
                tracing::warn!(entity = %key, from = %current.status, to = %target, %action, "transition rejected: {err}");
                return Err(err.into());
            }
        }

        let rule = match validate_transition(key.entity_type, current.status, target) {
            Ok(rule) => rule,
            Err(err) => {
                tracing::warn!(entity = %key, from = %current.status, to = %target, %action, "transition rejected: {err}");
                return Err(err.into());
            }
        };

        let effects = guard(&current, rule).map_err(|err| {
            tracing::warn!(entity = %key, from = %current.status, to = %target, %action, "transition refused: {err}");
            err
        })?;

        let now = Timestamp::now();
        let mut updated = current.clone();
        updated.status = target;
        updated.updated_at = now;

        let applied = async {
            work.write_status(key, target, now).await?;
            if let Some(review) = effects.review {
                work.write_review(key, review.clone()).await?;
                updated.review = Some(review);
            }
            work.append(AuditRecord {
                organization_id: current.organization_id,
                user_id,
                entity_type: key.entity_type,
                entity_id: key.id,
                action,
                previous_status: current.status,
                new_status: target,
                timestamp: now,
                metadata,
            })
            .await?;
            if let (Some((level, comments)), Some(user_id)) = (effects.approval, user_id) {
                work.append_approval(ApprovalAction {
                    organization_id: current.organization_id,
                    test_id: key.id,
                    user_id,
                    action,
                    level,
                    comments,
                    timestamp: now,
                })
                .await?;
            }
            work.commit().await
        }
        .await;

        if let Err(err) = applied {
            tracing::error!(entity = %key, from = %current.status, to = %target, %action, "transition rolled back: {err}");
            return Err(err);
        }

        tracing::info!(entity = %key, from = %current.status, to = %target, %action, "transition applied");
        Ok(updated)
    }
}

fn precondition(current: &EntityRecord, target: Status, entry: &[Status]) -> ConflictError {
    let names: Vec<&str> = entry.iter().map(Status::as_str).collect();
    ConflictError::precondition(
        current.status,
        target,
        lims_state::transitions(current.entity_type).targets_from(current.status),
        format!("status must be one of {}", names.join(", ")),
    )
}
