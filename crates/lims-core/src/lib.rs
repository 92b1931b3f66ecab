//! # lims-core: Foundational Types for the Lifecycle Engine
//!
//! The leaf of the crate DAG. Defines the primitives every other crate in
//! the workspace shares: identifier newtypes, the UTC-only [`Timestamp`],
//! the closed [`EntityType`] and [`Role`] enumerations, and the
//! [`ValidationError`] raised for malformed input before any store access.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `lims-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod domain;
pub mod error;
pub mod identity;
pub mod role;
pub mod temporal;

pub use domain::EntityType;
pub use error::ValidationError;
pub use identity::{EntityId, OrganizationId, UserId};
pub use role::Role;
pub use temporal::Timestamp;
