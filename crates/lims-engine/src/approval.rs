//! # Test Approval Chain
//!
//! The human sign-off workflow layered on the Test table:
//!
//! ```text
//!            submit (level 0)          review (level 1)
//! COMPLETED ─────────────────▶ IN_REVIEW ─────────────────▶ APPROVED
//!     │                            │                         REVIEW_REJECTED
//!     │                            │ approve (level 2)
//!     └────────────────────────────┴─────────────────▶ APPROVED
//!                approve (level 2)
//! ```
//!
//! Every step is one executor call, so it inherits the row lock, the
//! structural validation and the all-or-nothing audit write. On top of
//! that the chain enforces:
//!
//! - **Role**: reviewer and approver role sets from [`ApprovalPolicy`],
//!   checked before any store access.
//! - **Entry status**: review only from `IN_REVIEW`; approval from
//!   `IN_REVIEW` or `COMPLETED`.
//! - **Identity**: nobody reviews or approves their own work, and the
//!   reviewer cannot also give final approval. Checked against the stamps
//!   read under the row lock.
//!
//! An approving review also stamps the approver fields. Single-tier
//! deployments stop there; two-tier deployments route approval through
//! [`ApprovalChain::approve_test`] instead.

use serde::Serialize;

use lims_core::{EntityId, EntityType, OrganizationId, Role, Timestamp, UserId, ValidationError};
use lims_state::{Status, TestStatus};

use crate::error::EngineError;
use crate::executor::{SideEffects, TransitionExecutor, TransitionRequest};
use crate::policy::ApprovalPolicy;
use crate::record::{ApprovalLevel, AuditAction, EntityKey, EntityRecord, ReviewState};
use crate::store::LifecycleStore;

const REVIEW_ENTRY: &[Status] = &[Status::Test(TestStatus::InReview)];
const APPROVAL_ENTRY: &[Status] = &[
    Status::Test(TestStatus::InReview),
    Status::Test(TestStatus::Completed),
];

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub organization_id: OrganizationId,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role, organization_id: OrganizationId) -> Self {
        Self {
            user_id,
            role,
            organization_id,
        }
    }
}

/// Outcome of a peer review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// Aggregate sign-off state of one order's tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderApprovalStatus {
    pub order_id: EntityId,
    pub total_tests: usize,
    pub approved: usize,
    pub cancelled: usize,
    /// Tests neither approved nor cancelled.
    pub outstanding: usize,
    pub is_fully_approved: bool,
}

impl OrderApprovalStatus {
    fn tally(order_id: EntityId, tests: &[EntityRecord]) -> Self {
        let count = |status: TestStatus| {
            tests
                .iter()
                .filter(|t| t.status == Status::Test(status))
                .count()
        };
        let approved = count(TestStatus::Approved);
        let cancelled = count(TestStatus::Cancelled);
        let outstanding = tests.len() - approved - cancelled;
        Self {
            order_id,
            total_tests: tests.len(),
            approved,
            cancelled,
            outstanding,
            // An order whose tests were all cancelled is not approved.
            is_fully_approved: outstanding == 0 && approved > 0,
        }
    }
}

/// Review and approval operations for Tests.
#[derive(Debug, Clone)]
pub struct ApprovalChain<S> {
    executor: TransitionExecutor<S>,
    policy: ApprovalPolicy,
}

impl<S: LifecycleStore> ApprovalChain<S> {
    pub fn new(store: S, policy: ApprovalPolicy) -> Self {
        Self {
            executor: TransitionExecutor::new(store),
            policy,
        }
    }

    pub fn policy(&self) -> &ApprovalPolicy {
        &self.policy
    }

    pub fn executor(&self) -> &TransitionExecutor<S> {
        &self.executor
    }

    /// Assign `analyst` to a pending test.
    ///
    /// Gated by the table's `PENDING → ASSIGNED` roles. The recorded
    /// analyst is the one barred from reviewing or approving the test.
    pub async fn assign_test(
        &self,
        test_id: EntityId,
        actor: &Actor,
        analyst: UserId,
    ) -> Result<EntityRecord, EngineError> {
        let role = actor.role;
        let request = self.request(test_id, TestStatus::Assigned, actor);
        self.executor
            .execute_with(request, AuditAction::StatusTransition, None, move |current, rule| {
                lims_state::authorize_transition(current.entity_type, current.status, rule.to, Some(role))?;
                let mut review = current.review.clone().unwrap_or_default();
                review.assigned_analyst_id = Some(analyst);
                Ok(SideEffects {
                    review: Some(review),
                    approval: None,
                })
            })
            .await
    }

    /// Move a completed test into review.
    ///
    /// Open to any role. Stamps the submitter, and records them as the
    /// assigned analyst when none was recorded at assignment.
    pub async fn submit_for_review(
        &self,
        test_id: EntityId,
        actor: &Actor,
    ) -> Result<EntityRecord, EngineError> {
        let user = actor.user_id;
        let request = self.request(test_id, TestStatus::InReview, actor);
        self.executor
            .execute_with(request, AuditAction::SubmitForReview, None, move |current, _| {
                let previous = current.review.clone().unwrap_or_default();
                let now = Timestamp::now();
                Ok(SideEffects {
                    review: Some(ReviewState {
                        assigned_analyst_id: previous.assigned_analyst_id.or(Some(user)),
                        submitted_by: Some(user),
                        submitted_at: Some(now),
                        ..ReviewState::default()
                    }),
                    approval: Some((ApprovalLevel::Submit, None)),
                })
            })
            .await
    }

    /// Record a peer review decision on a test in `IN_REVIEW`.
    pub async fn review_test(
        &self,
        test_id: EntityId,
        actor: &Actor,
        decision: ReviewDecision,
        comments: Option<String>,
    ) -> Result<EntityRecord, EngineError> {
        if !self.policy.may_review(actor.role) {
            return Err(EngineError::Forbidden(format!(
                "role {} may not review tests",
                actor.role
            )));
        }
        let comments = normalize(comments);
        if decision == ReviewDecision::Reject && self.policy.require_reject_comments {
            ValidationError::require_non_blank("comments", comments.as_deref().unwrap_or(""))?;
        }

        let (target, action) = match decision {
            ReviewDecision::Approve => (TestStatus::Approved, AuditAction::ReviewApprove),
            ReviewDecision::Reject => (TestStatus::ReviewRejected, AuditAction::ReviewReject),
        };
        let reviewer = actor.user_id;
        let request = self.request(test_id, target, actor);
        self.executor
            .execute_with(request, action, Some(REVIEW_ENTRY), move |current, _| {
                let mut review = current.review.clone().unwrap_or_default();
                if review.assigned_analyst_id == Some(reviewer) {
                    return Err(EngineError::Forbidden(
                        "the assigned analyst may not review their own test".into(),
                    ));
                }
                let now = Timestamp::now();
                review.reviewer_id = Some(reviewer);
                review.reviewed_at = Some(now);
                review.review_comments = comments.clone();
                if decision == ReviewDecision::Approve {
                    review.approver_id = Some(reviewer);
                    review.approved_at = Some(now);
                    review.approval_comments = comments.clone();
                }
                Ok(SideEffects {
                    review: Some(review),
                    approval: Some((ApprovalLevel::Review, comments)),
                })
            })
            .await
    }

    /// Final approval from `IN_REVIEW` or straight from `COMPLETED`.
    pub async fn approve_test(
        &self,
        test_id: EntityId,
        actor: &Actor,
        comments: Option<String>,
    ) -> Result<EntityRecord, EngineError> {
        if !self.policy.may_approve(actor.role) {
            return Err(EngineError::Forbidden(format!(
                "role {} may not approve tests",
                actor.role
            )));
        }
        let comments = normalize(comments);
        let approver = actor.user_id;
        let request = self.request(test_id, TestStatus::Approved, actor);
        self.executor
            .execute_with(
                request,
                AuditAction::FinalApprove,
                Some(APPROVAL_ENTRY),
                move |current, _| {
                    let mut review = current.review.clone().unwrap_or_default();
                    if review.assigned_analyst_id == Some(approver) {
                        return Err(EngineError::Forbidden(
                            "the assigned analyst may not approve their own test".into(),
                        ));
                    }
                    if review.reviewer_id == Some(approver) {
                        return Err(EngineError::Forbidden(
                            "the reviewer may not also give final approval".into(),
                        ));
                    }
                    review.approver_id = Some(approver);
                    review.approved_at = Some(Timestamp::now());
                    review.approval_comments = comments.clone();
                    Ok(SideEffects {
                        review: Some(review),
                        approval: Some((ApprovalLevel::Final, comments)),
                    })
                },
            )
            .await
    }

    /// Tests awaiting review in the caller's organization.
    pub async fn approval_queue(
        &self,
        organization_id: OrganizationId,
        role: Role,
    ) -> Result<Vec<EntityRecord>, EngineError> {
        if !self.policy.may_see_queue(role) {
            return Err(EngineError::Forbidden(format!(
                "role {role} may not view the approval queue"
            )));
        }
        self.executor
            .store()
            .list_by_status(organization_id, TestStatus::InReview.into())
            .await
    }

    /// Whether every test on `order_id` is signed off.
    pub async fn order_approval_status(
        &self,
        order_id: EntityId,
        organization_id: Option<OrganizationId>,
    ) -> Result<OrderApprovalStatus, EngineError> {
        let store = self.executor.store();
        let order = store
            .find(EntityKey::order(order_id))
            .await?
            .filter(|o| organization_id.map_or(true, |org| org == o.organization_id))
            .ok_or_else(|| EngineError::not_found(EntityType::Order, order_id))?;
        let tests = store.tests_for_order(order.id).await?;
        Ok(OrderApprovalStatus::tally(order.id, &tests))
    }

    fn request(&self, test_id: EntityId, target: TestStatus, actor: &Actor) -> TransitionRequest {
        TransitionRequest::new(EntityKey::test(test_id), target)
            .by(actor.user_id)
            .within(actor.organization_id)
    }
}

/// Treat whitespace-only comments as absent.
fn normalize(comments: Option<String>) -> Option<String> {
    comments
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}
