//! # lims-engine: Transactional Lifecycle Engine
//!
//! Applies the tables from `lims-state` to stored entities.
//!
//! - [`executor`]: the Transition Executor, the only path that writes a
//!   status. Read, validate, write and audit happen in one unit of work.
//! - [`approval`]: the Test approval chain (submit, review, approve, the
//!   approval queue, order sign-off status).
//! - [`store`]: the entity-store and audit-sink contracts the executor
//!   runs against.
//! - [`memory`] and [`postgres`]: the two store implementations.
//! - [`audit`]: the per-entity SHA-256 audit hash chain.
//! - [`policy`]: reviewer and approver role sets, loadable from YAML.
//!
//! ## Concurrency
//!
//! The engine keeps no locks of its own. Serialisation of concurrent
//! transitions on one entity comes from the store's row lock, taken by
//! `read_for_update` and held until the unit of work commits or drops.
//! Transitions on different entities never wait on each other.
//!
//! ## Crate Policy
//!
//! - No `unwrap()` or `expect()` outside tests.
//! - Every failure after a unit of work opens rolls it back.

pub mod approval;
pub mod audit;
pub mod error;
pub mod executor;
pub mod memory;
pub mod policy;
pub mod postgres;
pub mod record;
pub mod store;

pub use approval::{Actor, ApprovalChain, OrderApprovalStatus, ReviewDecision};
pub use audit::{verify_chain, ChainIntegrity, ChainedAuditRecord};
pub use error::EngineError;
pub use executor::{TransitionExecutor, TransitionRequest};
pub use memory::MemoryStore;
pub use policy::ApprovalPolicy;
pub use postgres::{PgConfig, PgLifecycleStore};
pub use record::{
    ApprovalAction, ApprovalLevel, AuditAction, AuditRecord, EntityKey, EntityRecord, ReviewState,
};
pub use store::{AuditSink, EntityStore, LifecycleStore, UnitOfWork};
