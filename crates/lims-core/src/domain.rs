//! # Entity Types
//!
//! The four lifecycle domains governed by independent state machines.
//! Each has its own status vocabulary and transition table; statuses of
//! one type are never validated against another type's table.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A lifecycle domain. Closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    /// Physical specimen received by the laboratory.
    Sample,
    /// A single analytical test performed on a sample.
    Test,
    /// A client order grouping samples and tests.
    Order,
    /// A billing document raised against an order.
    Invoice,
}

impl EntityType {
    /// Every entity type, in declaration order.
    pub const ALL: [EntityType; 4] = [Self::Sample, Self::Test, Self::Order, Self::Invoice];

    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sample => "SAMPLE",
            Self::Test => "TEST",
            Self::Order => "ORDER",
            Self::Invoice => "INVOICE",
        }
    }

    /// Parse a canonical name. Case-insensitive so CLI input like `sample` works.
    pub fn from_name(name: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| ValidationError::UnknownEntityType(name.to_string()))
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}
