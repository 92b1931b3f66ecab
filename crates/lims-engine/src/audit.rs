//! # Audit Hash Chain
//!
//! Stored audit records are chained per entity: each carries the SHA-256
//! of its predecessor for the same entity, and its own hash covers that
//! link plus every field of the record. Editing, dropping or reordering a
//! record breaks the chain at that point.
//!
//! Chains are per entity rather than global so that appends only need the
//! entity's row lock, which the unit of work already holds.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::record::AuditRecord;

/// Predecessor hash of the first record in every chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// An audit record as stored, with its chain link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainedAuditRecord {
    #[serde(flatten)]
    pub record: AuditRecord,
    pub previous_hash: String,
    pub record_hash: String,
}

impl ChainedAuditRecord {
    /// Link `record` after `previous_hash`.
    pub fn link(record: AuditRecord, previous_hash: &str) -> Self {
        let record_hash = chain_hash(previous_hash, &record);
        Self {
            record,
            previous_hash: previous_hash.to_string(),
            record_hash,
        }
    }
}

/// SHA-256 over the predecessor hash and the record's fields, hex encoded.
pub fn chain_hash(previous_hash: &str, record: &AuditRecord) -> String {
    let user = record
        .user_id
        .map(|u| u.as_uuid().to_string())
        .unwrap_or_default();
    let metadata = record
        .metadata
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_default();

    let fields: [&str; 10] = [
        previous_hash,
        &record.organization_id.as_uuid().to_string(),
        &user,
        record.entity_type.as_str(),
        &record.entity_id.as_uuid().to_string(),
        record.action.as_str(),
        record.previous_status.as_str(),
        record.new_status.as_str(),
        &record.timestamp.to_iso8601(),
        &metadata,
    ];

    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update([0x1f]);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Result of walking one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainIntegrity {
    pub total_records: usize,
    pub broken_links: usize,
    pub chain_valid: bool,
}

/// Walk one entity's records in append order.
///
/// A record counts as a broken link when its `previous_hash` does not
/// match its predecessor's hash, or when its own hash does not match its
/// contents.
pub fn verify_chain<'a>(records: impl IntoIterator<Item = &'a ChainedAuditRecord>) -> ChainIntegrity {
    let mut total_records = 0;
    let mut broken_links = 0;
    let mut expected_prev = GENESIS_HASH;

    for stored in records {
        total_records += 1;
        let linked = stored.previous_hash == expected_prev;
        let intact = chain_hash(&stored.previous_hash, &stored.record) == stored.record_hash;
        if !(linked && intact) {
            broken_links += 1;
        }
        expected_prev = &stored.record_hash;
    }

    ChainIntegrity {
        total_records,
        broken_links,
        chain_valid: broken_links == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AuditAction;
    use lims_core::{EntityId, EntityType, OrganizationId, Timestamp, UserId};
    use lims_state::SampleStatus;

    fn record(from: SampleStatus, to: SampleStatus) -> AuditRecord {
        AuditRecord {
            organization_id: OrganizationId::new(),
            user_id: Some(UserId::new()),
            entity_type: EntityType::Sample,
            entity_id: EntityId::new(),
            action: AuditAction::StatusTransition,
            previous_status: from.into(),
            new_status: to.into(),
            timestamp: Timestamp::now(),
            metadata: None,
        }
    }

    fn chain() -> Vec<ChainedAuditRecord> {
        let first = ChainedAuditRecord::link(
            record(SampleStatus::Registered, SampleStatus::Received),
            GENESIS_HASH,
        );
        let second = ChainedAuditRecord::link(
            record(SampleStatus::Received, SampleStatus::InStorage),
            &first.record_hash,
        );
        vec![first, second]
    }

    #[test]
    fn hash_is_hex_sha256() {
        let link = &chain()[0];
        assert_eq!(link.record_hash.len(), 64);
        assert!(link.record_hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(link.previous_hash, GENESIS_HASH);
    }

    #[test]
    fn intact_chain_verifies() {
        let integrity = verify_chain(&chain());
        assert_eq!(integrity.total_records, 2);
        assert!(integrity.chain_valid);
    }

    #[test]
    fn empty_chain_is_valid() {
        assert!(verify_chain(&[]).chain_valid);
    }

    #[test]
    fn tampered_status_is_detected() {
        let mut records = chain();
        records[0].record.new_status = SampleStatus::InProgress.into();
        let integrity = verify_chain(&records);
        assert_eq!(integrity.broken_links, 1);
        assert!(!integrity.chain_valid);
    }

    #[test]
    fn dropped_record_is_detected() {
        let records = chain();
        let integrity = verify_chain(&records[1..]);
        assert_eq!(integrity.broken_links, 1);
    }

    #[test]
    fn metadata_is_covered() {
        let plain = record(SampleStatus::Registered, SampleStatus::Received);
        let mut annotated = plain.clone();
        annotated.metadata = Some(serde_json::json!({"reason": "courier"}));
        assert_ne!(chain_hash(GENESIS_HASH, &plain), chain_hash(GENESIS_HASH, &annotated));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn linked(len: usize) -> Vec<ChainedAuditRecord> {
            let mut records: Vec<ChainedAuditRecord> = Vec::with_capacity(len);
            for _ in 0..len {
                let prev = records
                    .last()
                    .map_or(GENESIS_HASH.to_string(), |r| r.record_hash.clone());
                records.push(ChainedAuditRecord::link(
                    record(SampleStatus::Received, SampleStatus::InStorage),
                    &prev,
                ));
            }
            records
        }

        proptest! {
            #[test]
            fn any_tampered_record_breaks_the_chain(len in 1usize..12, pick in any::<prop::sample::Index>()) {
                let mut records = linked(len);
                let victim = pick.index(len);
                records[victim].record.new_status = SampleStatus::OnHold.into();
                let integrity = verify_chain(&records);
                prop_assert_eq!(integrity.total_records, len);
                prop_assert!(!integrity.chain_valid);
            }

            #[test]
            fn any_removed_record_breaks_the_chain(len in 2usize..12, pick in any::<prop::sample::Index>()) {
                let mut records = linked(len);
                let removed = pick.index(len - 1);
                records.remove(removed);
                prop_assert!(!verify_chain(&records).chain_valid);
            }
        }
    }
}
