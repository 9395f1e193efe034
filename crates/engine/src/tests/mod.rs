// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod facade_tests;

use crate::LeaveEngine;
use leave_ledger::MemoryLedger;
use leave_ledger_domain::{LeavePolicy, Member, MemberId, MemberStatus};
use rust_decimal_macros::dec;
use std::sync::Arc;
use time::Date;

pub fn test_policy() -> LeavePolicy {
    LeavePolicy {
        base_annual_days: 15,
        increment_years: 2,
        increment_days: 1,
        max_annual_days: 25,
        first_year_monthly_grant: dec!(1),
        first_year_max_days: 11,
    }
}

pub fn make_member(id: i64, join_date: Date) -> Member {
    Member::new(
        MemberId::new(id),
        format!("Member {id}"),
        join_date,
        MemberStatus::Active,
    )
}

/// A memory-backed engine where the ledger doubles as roster and policy
/// provider.
pub fn memory_engine(
    ledger: &Arc<MemoryLedger>,
) -> LeaveEngine<MemoryLedger, MemoryLedger, MemoryLedger> {
    LeaveEngine::new(
        Arc::clone(ledger),
        Arc::clone(ledger),
        Arc::clone(ledger),
    )
}
