//! # Sample Lifecycle
//!
//! ```text
//! REGISTERED ──▶ RECEIVED ──▶ IN_STORAGE ◀──▶ IN_PROGRESS ──▶ TESTING_COMPLETE
//!     │              │             │                               │
//!     ▼              ▼             ▼                               ▼
//!  REJECTED       REJECTED      DISPOSED ◀── REPORTED ◀──────── APPROVED
//!
//! any non-terminal ──▶ ON_HOLD      (derived)
//! any non-terminal ──▶ CANCELLED    (derived; REGISTERED → CANCELLED is explicit)
//! ```
//!
//! `ON_HOLD` and `CANCELLED` are not hand-listed for every source status.
//! They are [`WILDCARD_TARGETS`], expanded once at table construction by
//! [`crate::table::derive_wildcard_rules`]. The explicit
//! `REGISTERED → CANCELLED` rule carries no role restriction (a sample that
//! never arrived can be withdrawn by whoever registered it) and the derived
//! rule for the same pair must not replace it.

use lims_core::Role;

use crate::status::{lifecycle_status, Status};
use crate::table::{TransitionRule, WildcardTarget};

lifecycle_status! {
    /// Status of a physical sample.
    pub enum SampleStatus for Sample {
        /// Logged, not yet physically received.
        Registered = "REGISTERED",
        /// Physically received at the laboratory.
        Received = "RECEIVED",
        /// Held in storage between analyses.
        InStorage = "IN_STORAGE",
        /// Under active analysis.
        InProgress = "IN_PROGRESS",
        /// All requested tests finished.
        TestingComplete = "TESTING_COMPLETE",
        /// Results signed off.
        Approved = "APPROVED",
        /// Results reported to the client.
        Reported = "REPORTED",
        /// Work suspended pending investigation.
        OnHold = "ON_HOLD",
        /// Destroyed. Terminal.
        Disposed = "DISPOSED",
        /// Refused at reception. Terminal.
        Rejected = "REJECTED",
        /// Withdrawn. Terminal.
        Cancelled = "CANCELLED",
    }
}

/// Status of every newly registered sample.
pub const INITIAL: SampleStatus = SampleStatus::Registered;

/// Statuses with no outgoing transitions.
pub const TERMINAL: &[SampleStatus] = &[
    SampleStatus::Disposed,
    SampleStatus::Rejected,
    SampleStatus::Cancelled,
];

const HANDLERS: &[Role] = &[Role::Admin, Role::LabManager, Role::Technician, Role::Receptionist];
const APPROVERS: &[Role] = &[Role::Admin, Role::LabManager, Role::QualityManager];
const DISPOSAL: &[Role] = &[Role::Admin, Role::LabManager];
const HOLD_RELEASE: &[Role] = &[Role::Admin, Role::LabManager, Role::QualityManager];
const CANCELLERS: &[Role] = &[Role::Admin, Role::LabManager];

/// Targets reachable from every non-terminal sample status.
pub const WILDCARD_TARGETS: &[WildcardTarget] = &[
    WildcardTarget {
        to: Status::Sample(SampleStatus::OnHold),
        required_roles: None,
    },
    WildcardTarget {
        to: Status::Sample(SampleStatus::Cancelled),
        required_roles: Some(CANCELLERS),
    },
];

/// The hand-authored rules, before wildcard derivation.
pub fn explicit_rules() -> Vec<TransitionRule> {
    use SampleStatus::*;
    vec![
        TransitionRule::restricted(Registered, Received, HANDLERS),
        TransitionRule::restricted(Registered, Rejected, HANDLERS),
        TransitionRule::explicit(Registered, Cancelled),
        TransitionRule::explicit(Received, InStorage),
        TransitionRule::explicit(Received, InProgress),
        TransitionRule::restricted(Received, Rejected, HANDLERS),
        TransitionRule::explicit(InStorage, InProgress),
        TransitionRule::restricted(InStorage, Disposed, DISPOSAL),
        TransitionRule::explicit(InProgress, TestingComplete),
        TransitionRule::explicit(InProgress, InStorage),
        TransitionRule::restricted(TestingComplete, Approved, APPROVERS),
        TransitionRule::explicit(TestingComplete, InProgress),
        TransitionRule::restricted(Approved, Reported, APPROVERS),
        TransitionRule::explicit(Reported, InStorage),
        TransitionRule::restricted(Reported, Disposed, DISPOSAL),
        TransitionRule::restricted(OnHold, Received, HOLD_RELEASE),
        TransitionRule::restricted(OnHold, InStorage, HOLD_RELEASE),
        TransitionRule::restricted(OnHold, InProgress, HOLD_RELEASE),
    ]
}
