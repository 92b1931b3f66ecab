//! # Status Vocabularies
//!
//! Each entity type owns a closed status enum (`SampleStatus`, `TestStatus`,
//! ...) generated by [`lifecycle_status!`]. The tagged [`Status`] wraps them
//! for code that works across entity types (the executor, the audit trail,
//! the CLI). There are no free-form status strings past the parse boundary.

use serde::Serialize;

use lims_core::EntityType;

use crate::error::StateError;
use crate::{InvoiceStatus, OrderStatus, SampleStatus, TestStatus};

/// Declare a per-entity status enum with its canonical names.
///
/// Generates `ALL`, `as_str()`, `from_name()`, `Display`, serde with the
/// canonical names, and `From<_> for Status`.
macro_rules! lifecycle_status {
    (
        $(#[$meta:meta])*
        pub enum $name:ident for $entity:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $text:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant, )+
        }

        impl $name {
            /// Every status of this vocabulary, in declaration order.
            pub const ALL: &'static [$name] = &[$( $name::$variant, )+];

            /// The canonical upper-case name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text, )+
                }
            }

            /// Parse a canonical name. Exact match only.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $text => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$name> for $crate::status::Status {
            fn from(s: $name) -> Self {
                $crate::status::Status::$entity(s)
            }
        }
    };
}

pub(crate) use lifecycle_status;

/// A status tagged with the entity type whose vocabulary it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    Sample(SampleStatus),
    Test(TestStatus),
    Order(OrderStatus),
    Invoice(InvoiceStatus),
}

impl Status {
    /// The entity type this status belongs to.
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Sample(_) => EntityType::Sample,
            Self::Test(_) => EntityType::Test,
            Self::Order(_) => EntityType::Order,
            Self::Invoice(_) => EntityType::Invoice,
        }
    }

    /// The canonical name, without the entity type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sample(s) => s.as_str(),
            Self::Test(s) => s.as_str(),
            Self::Order(s) => s.as_str(),
            Self::Invoice(s) => s.as_str(),
        }
    }

    /// Parse `name` in the vocabulary of `entity_type`.
    pub fn parse(entity_type: EntityType, name: &str) -> Result<Self, StateError> {
        let parsed = match entity_type {
            EntityType::Sample => SampleStatus::from_name(name).map(Self::Sample),
            EntityType::Test => TestStatus::from_name(name).map(Self::Test),
            EntityType::Order => OrderStatus::from_name(name).map(Self::Order),
            EntityType::Invoice => InvoiceStatus::from_name(name).map(Self::Invoice),
        };
        parsed.ok_or_else(|| StateError::UnknownStatus {
            entity_type,
            name: name.to_string(),
        })
    }

    /// The status every new entity of `entity_type` is created with.
    pub fn initial(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Sample => crate::sample::INITIAL.into(),
            EntityType::Test => crate::test::INITIAL.into(),
            EntityType::Order => crate::order::INITIAL.into(),
            EntityType::Invoice => crate::invoice::INITIAL.into(),
        }
    }

    /// The full vocabulary of `entity_type`, in declaration order.
    pub fn vocabulary(entity_type: EntityType) -> Vec<Self> {
        match entity_type {
            EntityType::Sample => SampleStatus::ALL.iter().map(|&s| s.into()).collect(),
            EntityType::Test => TestStatus::ALL.iter().map(|&s| s.into()).collect(),
            EntityType::Order => OrderStatus::ALL.iter().map(|&s| s.into()).collect(),
            EntityType::Invoice => InvoiceStatus::ALL.iter().map(|&s| s.into()).collect(),
        }
    }

    /// The declared terminal statuses of `entity_type`.
    pub fn terminal(entity_type: EntityType) -> Vec<Self> {
        match entity_type {
            EntityType::Sample => crate::sample::TERMINAL.iter().map(|&s| s.into()).collect(),
            EntityType::Test => crate::test::TERMINAL.iter().map(|&s| s.into()).collect(),
            EntityType::Order => crate::order::TERMINAL.iter().map(|&s| s.into()).collect(),
            EntityType::Invoice => crate::invoice::TERMINAL.iter().map(|&s| s.into()).collect(),
        }
    }

    /// Whether this status is declared terminal for its entity type.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Sample(s) => crate::sample::TERMINAL.contains(s),
            Self::Test(s) => crate::test::TERMINAL.contains(s),
            Self::Order(s) => crate::order::TERMINAL.contains(s),
            Self::Invoice(s) => crate::invoice::TERMINAL.contains(s),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialises as the bare canonical name. There is no matching
/// `Deserialize`: the entity type must come from context, via [`Status::parse`].
impl Serialize for Status {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
