//! # Transition Tables
//!
//! A [`TransitionTable`] is the effective, ordered rule list for one entity
//! type: the authored rules first, then any wildcard-derived rules. Tables
//! are built once per entity type on first use and cached for the life of
//! the process; [`transitions`] hands out `&'static` references, so callers
//! never copy or mutate them.
//!
//! ## Wildcard derivation
//!
//! [`derive_wildcard_rules`] expands each [`WildcardTarget`] into one rule
//! per eligible source status. A source is eligible when it is not declared
//! terminal, is not the target itself, and has no authored rule to the same
//! target. Authored rules always win; derivation only fills gaps.

use std::sync::OnceLock;

use serde::Serialize;

use lims_core::{EntityType, Role};

use crate::status::Status;

/// Where a rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleOrigin {
    /// Hand-authored in the lifecycle module.
    Explicit,
    /// Expanded from a [`WildcardTarget`].
    Wildcard,
}

/// One permitted `(from → to)` move, optionally gated by a role set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRule {
    pub from: Status,
    pub to: Status,
    /// `None` means any authenticated caller may trigger the move.
    pub required_roles: Option<&'static [Role]>,
    pub origin: RuleOrigin,
}

impl TransitionRule {
    /// An authored rule open to any authenticated caller.
    pub fn explicit(from: impl Into<Status>, to: impl Into<Status>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            required_roles: None,
            origin: RuleOrigin::Explicit,
        }
    }

    /// An authored rule restricted to `roles`.
    pub fn restricted(from: impl Into<Status>, to: impl Into<Status>, roles: &'static [Role]) -> Self {
        Self {
            required_roles: Some(roles),
            ..Self::explicit(from, to)
        }
    }

    /// Whether the rule carries a role restriction.
    pub fn is_restricted(&self) -> bool {
        self.required_roles.is_some()
    }
}

/// A status reachable from every non-terminal status of its entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WildcardTarget {
    pub to: Status,
    pub required_roles: Option<&'static [Role]>,
}

/// Expand `wildcards` over `vocabulary`, skipping terminal sources,
/// self-loops, and pairs already present in `explicit`.
///
/// Returns only the derived rules, ordered by source status then by
/// wildcard target.
pub fn derive_wildcard_rules(
    explicit: &[TransitionRule],
    vocabulary: &[Status],
    wildcards: &[WildcardTarget],
) -> Vec<TransitionRule> {
    let mut derived = Vec::new();
    for &from in vocabulary {
        if from.is_terminal() {
            continue;
        }
        for wildcard in wildcards {
            if from == wildcard.to {
                continue;
            }
            let authored = explicit.iter().any(|r| r.from == from && r.to == wildcard.to);
            if authored {
                continue;
            }
            derived.push(TransitionRule {
                from,
                to: wildcard.to,
                required_roles: wildcard.required_roles,
                origin: RuleOrigin::Wildcard,
            });
        }
    }
    derived
}

/// The effective rule list for one entity type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionTable {
    entity_type: EntityType,
    rules: Vec<TransitionRule>,
}

impl TransitionTable {
    /// Build a table from authored rules plus derived wildcard rules.
    pub fn build(
        entity_type: EntityType,
        explicit: Vec<TransitionRule>,
        wildcards: &[WildcardTarget],
    ) -> Self {
        let derived = derive_wildcard_rules(&explicit, &Status::vocabulary(entity_type), wildcards);
        let mut rules = explicit;
        rules.extend(derived);
        Self { entity_type, rules }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// All rules, authored first.
    pub fn rules(&self) -> &[TransitionRule] {
        &self.rules
    }

    /// Rules leaving `from`, in table order.
    pub fn rules_from(&self, from: Status) -> impl Iterator<Item = &TransitionRule> + '_ {
        self.rules.iter().filter(move |r| r.from == from)
    }

    /// The rule for `from → to`, if one exists.
    pub fn find(&self, from: Status, to: Status) -> Option<&TransitionRule> {
        self.rules.iter().find(|r| r.from == from && r.to == to)
    }

    /// Every status reachable in one step from `from`, in table order.
    pub fn targets_from(&self, from: Status) -> Vec<Status> {
        self.rules_from(from).map(|r| r.to).collect()
    }
}

/// The cached effective table for `entity_type`.
pub fn transitions(entity_type: EntityType) -> &'static TransitionTable {
    static SAMPLE: OnceLock<TransitionTable> = OnceLock::new();
    static TEST: OnceLock<TransitionTable> = OnceLock::new();
    static ORDER: OnceLock<TransitionTable> = OnceLock::new();
    static INVOICE: OnceLock<TransitionTable> = OnceLock::new();

    match entity_type {
        EntityType::Sample => SAMPLE.get_or_init(|| {
            TransitionTable::build(
                EntityType::Sample,
                crate::sample::explicit_rules(),
                crate::sample::WILDCARD_TARGETS,
            )
        }),
        EntityType::Test => TEST.get_or_init(|| {
            TransitionTable::build(EntityType::Test, crate::test::explicit_rules(), &[])
        }),
        EntityType::Order => ORDER.get_or_init(|| {
            TransitionTable::build(EntityType::Order, crate::order::explicit_rules(), &[])
        }),
        EntityType::Invoice => INVOICE.get_or_init(|| {
            TransitionTable::build(EntityType::Invoice, crate::invoice::explicit_rules(), &[])
        }),
    }
}
