//! # Invoice Lifecycle
//!
//! Payment states only; amounts, tax and gateway settlement live outside
//! the engine. `PAID`, `VOID` and `WRITTEN_OFF` are terminal.

use lims_core::Role;

use crate::status::lifecycle_status;
use crate::table::TransitionRule;

lifecycle_status! {
    /// Status of an invoice.
    pub enum InvoiceStatus for Invoice {
        Draft = "DRAFT",
        Issued = "ISSUED",
        Sent = "SENT",
        PartiallyPaid = "PARTIALLY_PAID",
        /// Settled in full. Terminal.
        Paid = "PAID",
        Overdue = "OVERDUE",
        Disputed = "DISPUTED",
        /// Cancelled before settlement. Terminal.
        Void = "VOID",
        /// Abandoned as uncollectable. Terminal.
        WrittenOff = "WRITTEN_OFF",
    }
}

pub const INITIAL: InvoiceStatus = InvoiceStatus::Draft;

pub const TERMINAL: &[InvoiceStatus] = &[
    InvoiceStatus::Paid,
    InvoiceStatus::Void,
    InvoiceStatus::WrittenOff,
];

const BILLING: &[Role] = &[Role::Admin, Role::BillingClerk];
const FINANCE_MANAGERS: &[Role] = &[Role::Admin, Role::LabManager];

pub fn explicit_rules() -> Vec<TransitionRule> {
    use InvoiceStatus::*;
    vec![
        TransitionRule::restricted(Draft, Issued, BILLING),
        TransitionRule::restricted(Draft, Void, BILLING),
        TransitionRule::restricted(Issued, Sent, BILLING),
        TransitionRule::restricted(Issued, PartiallyPaid, BILLING),
        TransitionRule::restricted(Issued, Paid, BILLING),
        TransitionRule::restricted(Issued, Void, FINANCE_MANAGERS),
        TransitionRule::restricted(Sent, PartiallyPaid, BILLING),
        TransitionRule::restricted(Sent, Paid, BILLING),
        TransitionRule::restricted(Sent, Overdue, BILLING),
        TransitionRule::explicit(Sent, Disputed),
        TransitionRule::restricted(Sent, Void, FINANCE_MANAGERS),
        TransitionRule::restricted(PartiallyPaid, Paid, BILLING),
        TransitionRule::restricted(PartiallyPaid, Overdue, BILLING),
        TransitionRule::explicit(PartiallyPaid, Disputed),
        TransitionRule::restricted(Overdue, PartiallyPaid, BILLING),
        TransitionRule::restricted(Overdue, Paid, BILLING),
        TransitionRule::explicit(Overdue, Disputed),
        TransitionRule::restricted(Overdue, WrittenOff, FINANCE_MANAGERS),
        TransitionRule::restricted(Disputed, Sent, BILLING),
        TransitionRule::restricted(Disputed, Void, FINANCE_MANAGERS),
        TransitionRule::restricted(Disputed, WrittenOff, FINANCE_MANAGERS),
    ]
}
