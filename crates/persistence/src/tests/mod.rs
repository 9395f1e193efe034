// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::Persistence;
use leave_ledger::{
    LedgerError, LedgerStore, MemberRoster, NewTransaction, PolicyProvider, allocate_usage,
    cancel_usage, compute_member_balance, process_expirations,
};
use leave_ledger_domain::{
    Actor, DueExpiration, GrantOccurrence, LeaveBalance, LeavePolicy, LeaveTransaction, Member,
    MemberId, MemberStatus, RequestContext, TransactionId, TransactionStatus, TransactionType,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use time::OffsetDateTime;
use time::macros::date;

fn test_policy() -> LeavePolicy {
    LeavePolicy {
        base_annual_days: 15,
        increment_years: 2,
        increment_days: 1,
        max_annual_days: 25,
        first_year_monthly_grant: dec!(1),
        first_year_max_days: 11,
    }
}

fn seeded_store() -> (Persistence, Member) {
    let store: Persistence = Persistence::new_in_memory().unwrap();
    let member: Member = store
        .insert_member("Test Member", date!(2024 - 03 - 01), MemberStatus::Active)
        .unwrap();
    (store, member)
}

fn grant_for(member: &Member, occurrence: Option<GrantOccurrence>) -> NewTransaction {
    NewTransaction {
        member_id: member.member_id,
        transaction_type: TransactionType::Grant,
        amount: dec!(1),
        grant_date: Some(date!(2024 - 04 - 01)),
        expire_date: Some(date!(2025 - 03 - 01)),
        reference_id: None,
        occurrence,
        request_key: None,
        reason: String::from("monthly grant for service month 1"),
        created_by: Actor::scheduler(),
    }
}

#[test]
fn test_append_round_trips_all_fields() {
    let (store, member) = seeded_store();

    let written: LeaveTransaction = store
        .append(grant_for(&member, Some(GrantOccurrence::monthly(1))))
        .unwrap();
    let fetched: Vec<LeaveTransaction> = store.all_transactions_for(member.member_id).unwrap();

    assert_eq!(fetched.len(), 1);
    let stored: &LeaveTransaction = &fetched[0];
    assert_eq!(stored.transaction_id, written.transaction_id);
    assert_eq!(stored.transaction_type, TransactionType::Grant);
    assert_eq!(stored.amount, dec!(1));
    assert_eq!(stored.grant_date, Some(date!(2024 - 04 - 01)));
    assert_eq!(stored.expire_date, Some(date!(2025 - 03 - 01)));
    assert_eq!(stored.occurrence, Some(GrantOccurrence::monthly(1)));
    assert_eq!(stored.status, TransactionStatus::Active);
    assert!(!stored.is_expired);
    assert_eq!(stored.created_by, "scheduler");
    assert_eq!(stored.reason, "monthly grant for service month 1");
}

#[test]
fn test_occurrence_uniqueness_enforced_by_index() {
    let (store, member) = seeded_store();
    store
        .append(grant_for(&member, Some(GrantOccurrence::monthly(1))))
        .unwrap();

    let result: Result<LeaveTransaction, LedgerError> =
        store.append(grant_for(&member, Some(GrantOccurrence::monthly(1))));

    assert!(matches!(
        result.unwrap_err(),
        LedgerError::DuplicateOccurrence { .. }
    ));
}

#[test]
fn test_occurrence_uniqueness_spans_cancelled_rows() {
    let (store, member) = seeded_store();
    let row: LeaveTransaction = store
        .append(grant_for(&member, Some(GrantOccurrence::monthly(1))))
        .unwrap();
    store.cancel(row.transaction_id, &Actor::system()).unwrap();

    let result: Result<LeaveTransaction, LedgerError> =
        store.append(grant_for(&member, Some(GrantOccurrence::monthly(1))));

    assert!(matches!(
        result.unwrap_err(),
        LedgerError::DuplicateOccurrence { .. }
    ));
}

#[test]
fn test_unscheduled_grants_carry_no_slot() {
    let (store, member) = seeded_store();
    store.append(grant_for(&member, None)).unwrap();
    // A second slotless grant is fine.
    assert!(store.append(grant_for(&member, None)).is_ok());
}

#[test]
fn test_cancel_transitions_and_errors() {
    let (store, member) = seeded_store();
    let row: LeaveTransaction = store.append(grant_for(&member, None)).unwrap();

    store.cancel(row.transaction_id, &Actor::system()).unwrap();
    let stored: LeaveTransaction = store.transaction(row.transaction_id).unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Cancelled);
    assert_eq!(stored.cancelled_by.as_deref(), Some("system"));
    assert!(stored.cancelled_at.is_some());

    assert!(matches!(
        store
            .cancel(row.transaction_id, &Actor::system())
            .unwrap_err(),
        LedgerError::AlreadyCancelled(_)
    ));
    assert!(matches!(
        store
            .cancel(TransactionId::new(999), &Actor::system())
            .unwrap_err(),
        LedgerError::TransactionNotFound(_)
    ));
}

#[test]
fn test_mark_expired_is_idempotent_and_typed() {
    let (store, member) = seeded_store();
    let grant: LeaveTransaction = store.append(grant_for(&member, None)).unwrap();

    store
        .mark_expired(grant.transaction_id, &Actor::scheduler())
        .unwrap();
    store
        .mark_expired(grant.transaction_id, &Actor::scheduler())
        .unwrap();
    let stored: LeaveTransaction = store.transaction(grant.transaction_id).unwrap().unwrap();
    assert!(stored.is_expired);
    assert_eq!(stored.expired_by.as_deref(), Some("scheduler"));

    let request: RequestContext = RequestContext::new(
        member.member_id,
        String::from("annual"),
        date!(2024 - 05 - 01),
        date!(2024 - 05 - 01),
        dec!(1),
    );
    let second: LeaveTransaction = store.append(grant_for(&member, None)).unwrap();
    let usage: LeaveTransaction = store
        .append(NewTransaction::usage(
            &request,
            dec!(1),
            second.transaction_id,
            &Actor::system(),
        ))
        .unwrap();
    assert!(matches!(
        store
            .mark_expired(usage.transaction_id, &Actor::system())
            .unwrap_err(),
        LedgerError::NotAGrant(_)
    ));
}

#[test]
fn test_fifo_allocation_against_sqlite() {
    let (store, member) = seeded_store();
    let early: LeaveTransaction = store
        .append(NewTransaction::manual_grant(
            member.member_id,
            dec!(5),
            date!(2024 - 01 - 01),
            Some(date!(2025 - 01 - 31)),
            String::from("seed"),
            &Actor::system(),
        ))
        .unwrap();
    let late: LeaveTransaction = store
        .append(NewTransaction::manual_grant(
            member.member_id,
            dec!(5),
            date!(2024 - 06 - 01),
            Some(date!(2025 - 06 - 30)),
            String::from("seed"),
            &Actor::system(),
        ))
        .unwrap();

    let request: RequestContext = RequestContext::new(
        member.member_id,
        String::from("annual"),
        date!(2024 - 09 - 02),
        date!(2024 - 09 - 06),
        dec!(7),
    );
    let written: Vec<LeaveTransaction> =
        allocate_usage(&store, &request, &Actor::system()).unwrap();

    assert_eq!(written.len(), 2);
    assert_eq!(written[0].reference_id, Some(early.transaction_id));
    assert_eq!(written[0].amount, dec!(-5));
    assert_eq!(written[1].reference_id, Some(late.transaction_id));
    assert_eq!(written[1].amount, dec!(-2));

    let cancelled: usize = cancel_usage(&store, &request, &Actor::system()).unwrap();
    assert_eq!(cancelled, 2);
    let balance: LeaveBalance = compute_member_balance(&store, member.member_id).unwrap();
    assert_eq!(balance.current_balance, dec!(10));
}

#[test]
fn test_split_expiration_against_sqlite() {
    let (store, member) = seeded_store();
    let grant: LeaveTransaction = store
        .append(NewTransaction::manual_grant(
            member.member_id,
            dec!(10),
            date!(2024 - 01 - 01),
            Some(date!(2025 - 01 - 01)),
            String::from("seed"),
            &Actor::system(),
        ))
        .unwrap();
    let request: RequestContext = RequestContext::new(
        member.member_id,
        String::from("annual"),
        date!(2024 - 05 - 01),
        date!(2024 - 05 - 03),
        dec!(3),
    );
    allocate_usage(&store, &request, &Actor::system()).unwrap();

    let due: Vec<DueExpiration> = vec![DueExpiration {
        transaction_id: grant.transaction_id,
        unused: dec!(7),
        forced: false,
    }];
    process_expirations(&store, member.member_id, &due, &Actor::scheduler()).unwrap();

    let balance: LeaveBalance = compute_member_balance(&store, member.member_id).unwrap();
    assert_eq!(balance.total_granted, dec!(3));
    assert_eq!(balance.total_used, dec!(3));
    assert_eq!(balance.total_expired, dec!(7));
    assert_eq!(balance.current_balance, dec!(0));

    // The usage rows were repointed to the preserved grant.
    let rows: Vec<LeaveTransaction> = store.all_transactions_for(member.member_id).unwrap();
    let preserved: &LeaveTransaction = rows
        .iter()
        .find(|tx| tx.is_consumable_grant())
        .unwrap();
    for usage in rows
        .iter()
        .filter(|tx| tx.transaction_type == TransactionType::Use && tx.is_active())
    {
        assert_eq!(usage.reference_id, Some(preserved.transaction_id));
    }
}

#[test]
fn test_balance_upsert_overwrites_wholesale() {
    let (store, member) = seeded_store();
    let first: LeaveBalance = LeaveBalance {
        member_id: member.member_id,
        total_granted: dec!(5),
        total_used: dec!(1),
        total_expired: dec!(0),
        current_balance: dec!(4),
        last_updated: OffsetDateTime::UNIX_EPOCH,
    };
    store.persist_balances(&[first]).unwrap();

    let second: LeaveBalance = LeaveBalance {
        member_id: member.member_id,
        total_granted: dec!(8),
        total_used: dec!(2.5),
        total_expired: dec!(1),
        current_balance: dec!(5.5),
        last_updated: OffsetDateTime::UNIX_EPOCH,
    };
    store.persist_balances(&[second.clone()]).unwrap();

    let stored: LeaveBalance = store.balance_for(member.member_id).unwrap().unwrap();
    assert_eq!(stored, second);
}

#[test]
fn test_batched_fetch_groups_by_member() {
    let store: Persistence = Persistence::new_in_memory().unwrap();
    let first: Member = store
        .insert_member("First", date!(2024 - 01 - 01), MemberStatus::Active)
        .unwrap();
    let second: Member = store
        .insert_member("Second", date!(2024 - 02 - 01), MemberStatus::Active)
        .unwrap();
    store
        .append(grant_for(&first, Some(GrantOccurrence::monthly(1))))
        .unwrap();

    let grouped = store
        .transactions_for_members(&[first.member_id, second.member_id])
        .unwrap();

    assert_eq!(grouped[&first.member_id].len(), 1);
    assert!(grouped[&second.member_id].is_empty());
}

#[test]
fn test_roster_lists_only_active_members() {
    let store: Persistence = Persistence::new_in_memory().unwrap();
    let active: Member = store
        .insert_member("Active", date!(2024 - 01 - 01), MemberStatus::Active)
        .unwrap();
    store
        .insert_member("Gone", date!(2020 - 01 - 01), MemberStatus::Terminated)
        .unwrap();

    let members: Vec<Member> = store.active_members().unwrap();

    assert_eq!(members.len(), 1);
    assert_eq!(members[0].member_id, active.member_id);
    assert!(matches!(
        store.member(MemberId::new(999)).unwrap_err(),
        LedgerError::MemberNotFound(_)
    ));
}

#[test]
fn test_policy_provider_fails_fast_without_active_row() {
    let store: Persistence = Persistence::new_in_memory().unwrap();

    assert!(matches!(
        store.active_policy().unwrap_err(),
        LedgerError::NoActivePolicy
    ));

    store.activate_policy(&test_policy()).unwrap();
    let policy: LeavePolicy = store.active_policy().unwrap();
    assert_eq!(policy, test_policy());

    // Activating a new policy replaces the old one.
    let mut revised: LeavePolicy = test_policy();
    revised.base_annual_days = 16;
    store.activate_policy(&revised).unwrap();
    assert_eq!(store.active_policy().unwrap().base_annual_days, 16);
}

#[test]
fn test_fractional_amounts_round_trip() {
    let (store, member) = seeded_store();
    let grant: LeaveTransaction = store
        .append(NewTransaction::manual_grant(
            member.member_id,
            dec!(2.5),
            date!(2024 - 01 - 01),
            None,
            String::from("half days"),
            &Actor::system(),
        ))
        .unwrap();

    let stored: LeaveTransaction = store.transaction(grant.transaction_id).unwrap().unwrap();
    assert_eq!(stored.amount, dec!(2.5));
    assert_eq!(stored.expire_date, None);

    let balance: LeaveBalance = compute_member_balance(&store, member.member_id).unwrap();
    assert_eq!(balance.current_balance, Decimal::from_str_exact("2.5").unwrap());
}
