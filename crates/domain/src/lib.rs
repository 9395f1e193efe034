// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]

mod accrual;
mod balance;
mod error;
mod types;

pub use accrual::{
    AccrualAssessment, DueExpiration, PlannedGrant, ServicePhase, add_months,
    annual_entitlement_days, assess_accrual, monthly_anchor, one_year_anchor, years_of_service,
};
pub use balance::compute_balance;
pub use error::DomainError;
pub use types::{
    Actor, GrantKind, GrantOccurrence, LeaveBalance, LeavePolicy, LeaveTransaction, Member,
    MemberId, MemberStatus, RequestContext, TransactionId, TransactionStatus, TransactionType,
};
