//! # Records
//!
//! Entity snapshots returned by the stores and the append-only records the
//! engine writes to the audit sink.

use serde::Serialize;

use lims_core::{EntityId, EntityType, OrganizationId, Timestamp, UserId};
use lims_state::Status;

/// Addresses one entity row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityKey {
    pub entity_type: EntityType,
    pub id: EntityId,
}

impl EntityKey {
    pub fn new(entity_type: EntityType, id: EntityId) -> Self {
        Self { entity_type, id }
    }

    pub fn sample(id: EntityId) -> Self {
        Self::new(EntityType::Sample, id)
    }

    pub fn test(id: EntityId) -> Self {
        Self::new(EntityType::Test, id)
    }

    pub fn order(id: EntityId) -> Self {
        Self::new(EntityType::Order, id)
    }

    pub fn invoice(id: EntityId) -> Self {
        Self::new(EntityType::Invoice, id)
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.entity_type, self.id)
    }
}

/// Review and approval stamps carried by a Test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    pub assigned_analyst_id: Option<UserId>,
    pub submitted_by: Option<UserId>,
    pub submitted_at: Option<Timestamp>,
    pub reviewer_id: Option<UserId>,
    pub reviewed_at: Option<Timestamp>,
    pub review_comments: Option<String>,
    pub approver_id: Option<UserId>,
    pub approved_at: Option<Timestamp>,
    pub approval_comments: Option<String>,
}

/// Snapshot of one entity as the store holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub entity_type: EntityType,
    pub id: EntityId,
    pub organization_id: OrganizationId,
    /// Parent order, for Samples, Tests and Invoices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<EntityId>,
    pub status: Status,
    pub updated_at: Timestamp,
    /// Present for Tests only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewState>,
}

impl EntityRecord {
    /// A new entity in the initial status of its type.
    pub fn new(
        entity_type: EntityType,
        organization_id: OrganizationId,
        order_id: Option<EntityId>,
    ) -> Self {
        Self {
            entity_type,
            id: EntityId::new(),
            organization_id,
            order_id,
            status: Status::initial(entity_type),
            updated_at: Timestamp::now(),
            review: (entity_type == EntityType::Test).then(ReviewState::default),
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.entity_type, self.id)
    }
}

/// What produced an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    StatusTransition,
    SubmitForReview,
    ReviewApprove,
    ReviewReject,
    FinalApprove,
}

impl AuditAction {
    pub const ALL: [AuditAction; 5] = [
        Self::StatusTransition,
        Self::SubmitForReview,
        Self::ReviewApprove,
        Self::ReviewReject,
        Self::FinalApprove,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusTransition => "STATUS_TRANSITION",
            Self::SubmitForReview => "SUBMIT_FOR_REVIEW",
            Self::ReviewApprove => "REVIEW_APPROVE",
            Self::ReviewReject => "REVIEW_REJECT",
            Self::FinalApprove => "FINAL_APPROVE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One applied transition. Written once, never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub organization_id: OrganizationId,
    /// `None` for system-initiated transitions.
    pub user_id: Option<UserId>,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub action: AuditAction,
    pub previous_status: Status,
    pub new_status: Status,
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AuditRecord {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.entity_type, self.entity_id)
    }
}

/// Decision point in the Test approval chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "i16")]
pub enum ApprovalLevel {
    Submit = 0,
    Review = 1,
    Final = 2,
}

impl ApprovalLevel {
    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

impl From<ApprovalLevel> for i16 {
    fn from(level: ApprovalLevel) -> Self {
        level.as_i16()
    }
}

/// One human decision in the approval chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalAction {
    pub organization_id: OrganizationId,
    pub test_id: EntityId,
    pub user_id: UserId,
    pub action: AuditAction,
    pub level: ApprovalLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub timestamp: Timestamp,
}
