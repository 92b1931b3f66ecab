//! # Order Lifecycle
//!
//! ```text
//! PENDING ──▶ RECEIVED ──▶ IN_PROGRESS ◀──▶ COMPLETED ──▶ REPORTED
//!    │           │              │
//!    └───────────┴──────────────┴──▶ ON_HOLD ──▶ (resume)
//!    PENDING / RECEIVED / ON_HOLD ──▶ CANCELLED
//! ```
//!
//! Whether an order's tests are all signed off is an aggregate query
//! (`order_approval_status` in `lims-engine`), not a status of its own.

use lims_core::Role;

use crate::status::lifecycle_status;
use crate::table::TransitionRule;

lifecycle_status! {
    /// Status of a client order.
    pub enum OrderStatus for Order {
        Pending = "PENDING",
        Received = "RECEIVED",
        InProgress = "IN_PROGRESS",
        Completed = "COMPLETED",
        /// Report issued. Terminal.
        Reported = "REPORTED",
        OnHold = "ON_HOLD",
        /// Terminal.
        Cancelled = "CANCELLED",
    }
}

pub const INITIAL: OrderStatus = OrderStatus::Pending;

pub const TERMINAL: &[OrderStatus] = &[OrderStatus::Reported, OrderStatus::Cancelled];

const DESK: &[Role] = &[Role::Admin, Role::LabManager, Role::Receptionist];
const MANAGERS: &[Role] = &[Role::Admin, Role::LabManager];
const REPORTERS: &[Role] = &[Role::Admin, Role::LabManager, Role::QualityManager];

pub fn explicit_rules() -> Vec<TransitionRule> {
    use OrderStatus::*;
    vec![
        TransitionRule::restricted(Pending, Received, DESK),
        TransitionRule::explicit(Pending, OnHold),
        TransitionRule::restricted(Pending, Cancelled, DESK),
        TransitionRule::explicit(Received, InProgress),
        TransitionRule::explicit(Received, OnHold),
        TransitionRule::restricted(Received, Cancelled, MANAGERS),
        TransitionRule::explicit(InProgress, Completed),
        TransitionRule::explicit(InProgress, OnHold),
        TransitionRule::restricted(Completed, Reported, REPORTERS),
        TransitionRule::explicit(Completed, InProgress),
        TransitionRule::restricted(OnHold, Pending, MANAGERS),
        TransitionRule::restricted(OnHold, Received, MANAGERS),
        TransitionRule::restricted(OnHold, InProgress, MANAGERS),
        TransitionRule::restricted(OnHold, Cancelled, MANAGERS),
    ]
}
