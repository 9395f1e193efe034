// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::{make_member, memory_engine, test_policy};
use crate::{BatchSummary, EngineError, LeaveEngine};
use leave_ledger::{LedgerStore, MemoryLedger};
use leave_ledger_domain::{
    Actor, LeaveBalance, MemberId, MemberStatus, RequestContext, TransactionType,
};
use leave_ledger_persistence::Persistence;
use rust_decimal_macros::dec;
use std::sync::Arc;
use time::macros::date;

fn seeded_memory() -> (Arc<MemoryLedger>, LeaveEngine<MemoryLedger, MemoryLedger, MemoryLedger>) {
    let ledger: Arc<MemoryLedger> = Arc::new(MemoryLedger::new());
    ledger.set_policy(test_policy()).unwrap();
    ledger
        .upsert_member(make_member(1, date!(2023 - 01 - 01)))
        .unwrap();
    let engine = memory_engine(&ledger);
    engine
        .grant_manual(
            MemberId::new(1),
            dec!(10),
            date!(2024 - 01 - 01),
            Some(date!(2025 - 01 - 01)),
            String::from("carried over"),
            &Actor::system(),
        )
        .unwrap();
    (ledger, engine)
}

fn request(days: rust_decimal::Decimal) -> RequestContext {
    RequestContext::new(
        MemberId::new(1),
        String::from("annual"),
        date!(2024 - 05 - 07),
        date!(2024 - 05 - 10),
        days,
    )
}

#[test]
fn test_allocate_and_cancel_round_trip() {
    let (ledger, engine) = seeded_memory();

    engine
        .allocate_usage(&request(dec!(4)), &Actor::system())
        .unwrap();
    let after_allocation: LeaveBalance =
        ledger.balance_for(MemberId::new(1)).unwrap().unwrap();
    assert_eq!(after_allocation.current_balance, dec!(6));
    assert_eq!(after_allocation.total_used, dec!(4));

    let cancelled: usize = engine
        .cancel_usage(&request(dec!(4)), &Actor::system())
        .unwrap();
    assert_eq!(cancelled, 1);
    let after_cancel: LeaveBalance = ledger.balance_for(MemberId::new(1)).unwrap().unwrap();
    assert_eq!(after_cancel.current_balance, dec!(10));
    assert_eq!(after_cancel.total_used, dec!(0));
}

#[test]
fn test_insufficient_balance_surfaced_with_no_side_effects() {
    let (ledger, engine) = seeded_memory();

    let result: Result<(), EngineError> =
        engine.allocate_usage(&request(dec!(11)), &Actor::system());

    let err: EngineError = result.unwrap_err();
    assert!(err.is_insufficient_balance());
    let uses: usize = ledger
        .all_transactions_for(MemberId::new(1))
        .unwrap()
        .into_iter()
        .filter(|tx| tx.transaction_type == TransactionType::Use)
        .count();
    assert_eq!(uses, 0);
}

#[test]
fn test_manual_grant_and_adjustment_update_cache() {
    let (ledger, engine) = seeded_memory();

    engine
        .adjust_balance(
            MemberId::new(1),
            dec!(-1.5),
            String::from("attendance correction"),
            &Actor::new(String::from("hr-admin"), String::from("user")),
        )
        .unwrap();

    let cached: LeaveBalance = ledger.balance_for(MemberId::new(1)).unwrap().unwrap();
    assert_eq!(cached.total_granted, dec!(10));
    assert_eq!(cached.current_balance, dec!(8.5));
}

#[test]
fn test_calculate_balance_refreshes_cache() {
    let (ledger, engine) = seeded_memory();

    let balance: LeaveBalance = engine.calculate_balance(MemberId::new(1)).unwrap();

    assert_eq!(balance.current_balance, dec!(10));
    let cached: LeaveBalance = ledger.balance_for(MemberId::new(1)).unwrap().unwrap();
    assert_eq!(cached.current_balance, balance.current_balance);
}

#[tokio::test]
async fn test_engine_over_sqlite_end_to_end() {
    let store: Arc<Persistence> = Arc::new(Persistence::new_in_memory().unwrap());
    store.activate_policy(&test_policy()).unwrap();
    let member = store
        .insert_member("Integration", date!(2024 - 03 - 01), MemberStatus::Active)
        .unwrap();
    let engine: LeaveEngine<Persistence, Persistence, Persistence> = LeaveEngine::new(
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&store),
    );

    let summary: BatchSummary = engine
        .run_daily_update(date!(2024 - 06 - 01), None)
        .await
        .unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.granted, 3);

    let request: RequestContext = RequestContext::new(
        member.member_id,
        String::from("annual"),
        date!(2024 - 06 - 10),
        date!(2024 - 06 - 11),
        dec!(2),
    );
    engine.allocate_usage(&request, &Actor::system()).unwrap();
    let cached: LeaveBalance = store.balance_for(member.member_id).unwrap().unwrap();
    assert_eq!(cached.current_balance, dec!(1));

    engine.cancel_usage(&request, &Actor::system()).unwrap();
    let restored: LeaveBalance = store.balance_for(member.member_id).unwrap().unwrap();
    assert_eq!(restored.current_balance, dec!(3));
}
