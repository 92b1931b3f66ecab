//! # lims-state: Declarative Lifecycle Tables
//!
//! The structural half of the lifecycle engine. Everything here is pure:
//! no I/O, no locks, no interior mutability beyond the one-time table cache.
//! The validator and the authorization filter are safe to call from any
//! number of concurrent readers.
//!
//! ## Lifecycles
//!
//! - **Sample** (`sample.rs`): reception through storage, testing, approval,
//!   reporting and disposal. `ON_HOLD` and `CANCELLED` are wildcard targets
//!   derived for every non-terminal status.
//! - **Test** (`test.rs`): assignment, bench work, and the review chain
//!   `COMPLETED → IN_REVIEW → {APPROVED | REVIEW_REJECTED}`.
//! - **Order** (`order.rs`): client order intake through reporting.
//! - **Invoice** (`invoice.rs`): issue, payment, dispute and write-off.
//!
//! ## Design
//!
//! Each lifecycle is a flat list of `(from, to, required roles)` rules, not
//! a hierarchy of state objects, so a compliance reviewer can read the
//! table (or `lims tables`) without reading the code. Statuses are typed
//! per entity type; the tagged [`Status`] carries the entity type with it,
//! so a Sample status can never be checked against the Test table.
//!
//! "What is structurally legal" ([`validator`]) and "who may do it"
//! ([`authorization`]) are separate modules and are tested independently.

pub mod authorization;
pub mod error;
pub mod invoice;
pub mod order;
pub mod sample;
pub mod status;
pub mod table;
pub mod validator;

pub use authorization::{authorize_transition, available_rules, available_transitions, permits};
pub use error::{ConflictError, ConflictKind, StateError};
pub use invoice::InvoiceStatus;
pub use order::OrderStatus;
pub use sample::SampleStatus;
pub use status::Status;
pub use table::{transitions, RuleOrigin, TransitionRule, TransitionTable, WildcardTarget};
pub use test::TestStatus;
pub use validator::{is_valid_transition, validate_transition};
