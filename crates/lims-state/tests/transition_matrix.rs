//! # Lifecycle Transition Matrices
//!
//! Exhaustive NxN checks for every lifecycle. Each expected edge list is
//! written out by hand so that a change to a table has to be mirrored
//! here deliberately.

use lims_core::{EntityType, Role};
use lims_state::{
    is_valid_transition, transitions, InvoiceStatus, OrderStatus, RuleOrigin, SampleStatus,
    Status, TestStatus,
};

fn assert_matrix(entity_type: EntityType, expected: &[(Status, Status)]) {
    let vocabulary = Status::vocabulary(entity_type);
    for &from in &vocabulary {
        for &to in &vocabulary {
            let actual = is_valid_transition(entity_type, from, to);
            let wanted = expected.contains(&(from, to));
            assert_eq!(
                actual, wanted,
                "{entity_type} transition {from} → {to}: expected valid={wanted}, got valid={actual}"
            );
        }
    }
    assert_eq!(transitions(entity_type).rules().len(), expected.len());
}

#[test]
fn test_transition_matrix_exhaustive() {
    use TestStatus::*;
    let edges = [
        (Pending, Assigned),
        (Pending, OnHold),
        (Pending, Cancelled),
        (Assigned, InProgress),
        (Assigned, Pending),
        (Assigned, OnHold),
        (Assigned, Cancelled),
        (InProgress, Completed),
        (InProgress, OnHold),
        (InProgress, Cancelled),
        (Completed, InReview),
        (Completed, Approved),
        (Completed, InProgress),
        (InReview, Approved),
        (InReview, ReviewRejected),
        (ReviewRejected, InProgress),
        (OnHold, Pending),
        (OnHold, Assigned),
        (OnHold, InProgress),
        (OnHold, Cancelled),
    ];
    let expected: Vec<_> = edges
        .iter()
        .map(|&(a, b)| (Status::from(a), Status::from(b)))
        .collect();
    assert_matrix(EntityType::Test, &expected);
}

#[test]
fn order_transition_matrix_exhaustive() {
    use OrderStatus::*;
    let edges = [
        (Pending, Received),
        (Pending, OnHold),
        (Pending, Cancelled),
        (Received, InProgress),
        (Received, OnHold),
        (Received, Cancelled),
        (InProgress, Completed),
        (InProgress, OnHold),
        (Completed, Reported),
        (Completed, InProgress),
        (OnHold, Pending),
        (OnHold, Received),
        (OnHold, InProgress),
        (OnHold, Cancelled),
    ];
    let expected: Vec<_> = edges
        .iter()
        .map(|&(a, b)| (Status::from(a), Status::from(b)))
        .collect();
    assert_matrix(EntityType::Order, &expected);
}

#[test]
fn invoice_transition_matrix_exhaustive() {
    use InvoiceStatus::*;
    let edges = [
        (Draft, Issued),
        (Draft, Void),
        (Issued, Sent),
        (Issued, PartiallyPaid),
        (Issued, Paid),
        (Issued, Void),
        (Sent, PartiallyPaid),
        (Sent, Paid),
        (Sent, Overdue),
        (Sent, Disputed),
        (Sent, Void),
        (PartiallyPaid, Paid),
        (PartiallyPaid, Overdue),
        (PartiallyPaid, Disputed),
        (Overdue, PartiallyPaid),
        (Overdue, Paid),
        (Overdue, Disputed),
        (Overdue, WrittenOff),
        (Disputed, Sent),
        (Disputed, Void),
        (Disputed, WrittenOff),
    ];
    let expected: Vec<_> = edges
        .iter()
        .map(|&(a, b)| (Status::from(a), Status::from(b)))
        .collect();
    assert_matrix(EntityType::Invoice, &expected);
}

#[test]
fn sample_transition_matrix_exhaustive() {
    use SampleStatus::*;
    let mut edges = vec![
        (Registered, Received),
        (Registered, Rejected),
        (Registered, Cancelled),
        (Received, InStorage),
        (Received, InProgress),
        (Received, Rejected),
        (InStorage, InProgress),
        (InStorage, Disposed),
        (InProgress, TestingComplete),
        (InProgress, InStorage),
        (TestingComplete, Approved),
        (TestingComplete, InProgress),
        (Approved, Reported),
        (Reported, InStorage),
        (Reported, Disposed),
        (OnHold, Received),
        (OnHold, InStorage),
        (OnHold, InProgress),
    ];
    // Derived: every non-terminal status reaches ON_HOLD and CANCELLED.
    for &from in &[
        Registered,
        Received,
        InStorage,
        InProgress,
        TestingComplete,
        Approved,
        Reported,
        OnHold,
    ] {
        if from != OnHold {
            edges.push((from, OnHold));
        }
        if from != Registered {
            edges.push((from, Cancelled));
        }
    }
    let expected: Vec<_> = edges
        .iter()
        .map(|&(a, b)| (Status::from(a), Status::from(b)))
        .collect();
    assert_matrix(EntityType::Sample, &expected);
}

#[test]
fn sample_wildcard_rules_are_marked_derived() {
    let table = transitions(EntityType::Sample);
    let derived = table
        .rules()
        .iter()
        .filter(|r| r.origin == RuleOrigin::Wildcard)
        .count();
    // 7 sources → ON_HOLD, 7 sources → CANCELLED (REGISTERED is authored).
    assert_eq!(derived, 14);
}

#[test]
fn closure_holds_for_every_lifecycle() {
    for entity_type in EntityType::ALL {
        let table = transitions(entity_type);
        for status in Status::vocabulary(entity_type) {
            let outgoing = table.rules_from(status).count();
            if status.is_terminal() {
                assert_eq!(outgoing, 0, "{entity_type} terminal {status} has outgoing rules");
            } else {
                assert!(outgoing > 0, "{entity_type} {status} is a dead end");
            }
        }
    }
}

#[test]
fn sample_approval_is_restricted_to_managers() {
    let rule = transitions(EntityType::Sample)
        .find(
            SampleStatus::TestingComplete.into(),
            SampleStatus::Approved.into(),
        )
        .unwrap();
    assert_eq!(
        rule.required_roles,
        Some(&[Role::Admin, Role::LabManager, Role::QualityManager][..])
    );
}
