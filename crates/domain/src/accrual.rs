// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Accrual policy calculation for a single member.
//!
//! This module provides the pure, deterministic calculation that decides,
//! for a member at a target date, which scheduled grants are owed but not
//! yet recorded, which grants are due for expiration, and when the next
//! grant and expiration fall. It never touches storage: callers pass the
//! member's full transaction history in and apply the resulting plan
//! through the ledger.

use crate::error::DomainError;
use crate::types::{
    GrantKind, GrantOccurrence, LeavePolicy, LeaveTransaction, Member, TransactionId,
    TransactionType,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use time::{Date, Month};

/// The accrual phase a member is in at a given date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServicePhase {
    /// Before the first service anniversary: monthly grants.
    FirstYear,
    /// From the first service anniversary on: one grant per anniversary.
    Annual,
}

/// A scheduled grant that is owed but not yet recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedGrant {
    /// The occurrence slot this grant fills.
    pub occurrence: GrantOccurrence,
    /// Days to grant.
    pub amount: Decimal,
    /// The anchor date the grant is effective from.
    pub grant_date: Date,
    /// When the granted days lapse.
    pub expire_date: Date,
    /// Audit description.
    pub reason: String,
}

/// An existing grant whose unused remainder is due for expiration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueExpiration {
    /// The grant transaction to expire.
    pub transaction_id: TransactionId,
    /// The unused remainder (grant amount minus active usage against it).
    pub unused: Decimal,
    /// True when the grant is swept by the one-year boundary rather than by
    /// its own expire date. First-year leave cannot roll over.
    pub forced: bool,
}

/// Result of assessing a member's accrual state at a target date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualAssessment {
    /// The phase the member is in at the target date.
    pub phase: ServicePhase,
    /// Calendar-approximate years of service at the target date.
    pub years_of_service: f64,
    /// Grants owed by now but missing from the ledger, in schedule order.
    pub planned_grants: Vec<PlannedGrant>,
    /// Grants whose unused remainder is due for expiration.
    pub due_expirations: Vec<DueExpiration>,
    /// Anniversary indices older than the current one that have no recorded
    /// grant. These are NOT backfilled (catch-up is bounded to the most
    /// recent anniversary) but callers may want to log them.
    pub skipped_annual_backfills: Vec<u16>,
    /// The next date a scheduled grant falls on.
    pub next_grant_date: Date,
    /// The earliest future expiration among held and planned grants.
    pub next_expire_date: Option<Date>,
}

/// Adds whole months to a date, clamping the day to the last day of the
/// target month (e.g., Jan 31 + 1 month = Feb 28/29).
///
/// # Errors
///
/// Returns an error if the resulting date is outside the supported range.
pub fn add_months(date: Date, months: u32) -> Result<Date, DomainError> {
    let overflow = || DomainError::DateArithmeticOverflow {
        operation: format!("adding {months} months to {date}"),
    };

    let month_index: i64 =
        i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1 + i64::from(months);
    let year: i32 = i32::try_from(month_index.div_euclid(12)).map_err(|_| overflow())?;
    let month_number: u8 = u8::try_from(month_index.rem_euclid(12) + 1).map_err(|_| overflow())?;
    let month: Month = Month::try_from(month_number).map_err(|_| overflow())?;

    let last_day: u8 = time::util::days_in_year_month(year, month);
    let day: u8 = date.day().min(last_day);

    Date::from_calendar_date(year, month, day).map_err(|_| overflow())
}

/// The Nth monthly grant anchor: `join_date` + N months, day-clamped.
///
/// # Errors
///
/// Returns an error on date arithmetic overflow.
pub fn monthly_anchor(join_date: Date, service_month: u16) -> Result<Date, DomainError> {
    add_months(join_date, u32::from(service_month))
}

/// The first-anniversary boundary: monthly grants stop and force-expire here.
///
/// # Errors
///
/// Returns an error on date arithmetic overflow.
pub fn one_year_anchor(join_date: Date) -> Result<Date, DomainError> {
    add_months(join_date, 12)
}

/// Calendar-approximate years of service: elapsed days / 365.25.
///
/// This is intentionally not leap-exact; phase boundaries use anniversary
/// dates, not this figure.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn years_of_service(join_date: Date, target_date: Date) -> f64 {
    let days: i64 = (target_date - join_date).whole_days();
    days as f64 / 365.25
}

/// Annual entitlement by seniority.
///
/// Service years 1–2 receive the base; from year 3 on, the base grows by
/// `increment_days` per completed `increment_years`, capped at
/// `max_annual_days`.
#[must_use]
pub fn annual_entitlement_days(policy: &LeavePolicy, service_year: u16) -> Decimal {
    let increments: u16 = service_year.saturating_sub(1) / policy.increment_years.max(1);
    let days: u16 = policy
        .base_annual_days
        .saturating_add(policy.increment_days.saturating_mul(increments))
        .min(policy.max_annual_days);
    Decimal::from(days)
}

/// Assesses a member's accrual state at a target date.
///
/// Pure function of the member's join date, the active policy, and the
/// member's full transaction history (cancelled rows included; a cancelled
/// grant still consumed its occurrence slot).
///
/// # Arguments
///
/// * `member` - The member to assess
/// * `policy` - The active leave policy
/// * `history` - The member's complete transaction history
/// * `target_date` - The date to assess as of
///
/// # Errors
///
/// Returns an error if the policy is invalid, the join date is after the
/// target date, or date arithmetic overflows.
#[allow(clippy::too_many_lines)]
pub fn assess_accrual(
    member: &Member,
    policy: &LeavePolicy,
    history: &[LeaveTransaction],
    target_date: Date,
) -> Result<AccrualAssessment, DomainError> {
    policy.validate()?;

    let join_date: Date = member.join_date;
    if join_date > target_date {
        return Err(DomainError::InvalidJoinDate {
            reason: format!("join date {join_date} is after target date {target_date}"),
        });
    }

    let anchor: Date = one_year_anchor(join_date)?;
    let phase: ServicePhase = if target_date < anchor {
        ServicePhase::FirstYear
    } else {
        ServicePhase::Annual
    };

    // Occurrence slots already consumed, regardless of row status.
    let mut monthly_taken: HashSet<u16> = HashSet::new();
    let mut annual_taken: HashSet<u16> = HashSet::new();
    let mut monthly_granted_days: Decimal = Decimal::ZERO;
    for tx in history {
        if let Some(occurrence) = tx.occurrence {
            match occurrence.kind {
                GrantKind::Monthly => {
                    monthly_taken.insert(occurrence.period_index);
                    monthly_granted_days += tx.amount;
                }
                GrantKind::Annual => {
                    annual_taken.insert(occurrence.period_index);
                }
            }
        }
    }

    // First-year monthly grants with backfill, capped by first_year_max_days.
    let first_year_cap: Decimal = Decimal::from(policy.first_year_max_days);
    let mut planned_grants: Vec<PlannedGrant> = Vec::new();
    let mut planned_monthly_days: Decimal = Decimal::ZERO;
    for service_month in 1..12_u16 {
        let month_anchor: Date = monthly_anchor(join_date, service_month)?;
        if month_anchor > target_date {
            break;
        }
        if monthly_taken.contains(&service_month) {
            continue;
        }
        let amount: Decimal = policy.first_year_monthly_grant;
        if monthly_granted_days + planned_monthly_days + amount > first_year_cap {
            break;
        }
        planned_grants.push(PlannedGrant {
            occurrence: GrantOccurrence::monthly(service_month),
            amount,
            grant_date: month_anchor,
            expire_date: anchor,
            reason: format!("monthly grant for service month {service_month}"),
        });
        planned_monthly_days += amount;
    }

    // Annual grant: only the single most recent missing anniversary is
    // backfilled. Older anniversaries are reported, never recovered.
    let mut skipped_annual_backfills: Vec<u16> = Vec::new();
    let current_anniversary: Option<u16> = if phase == ServicePhase::Annual {
        let mut index: u16 = 1;
        while add_months(join_date, u32::from(index + 1) * 12)? <= target_date {
            index += 1;
        }
        Some(index)
    } else {
        None
    };
    if let Some(index) = current_anniversary {
        if !annual_taken.contains(&index) {
            let amount: Decimal = annual_entitlement_days(policy, index);
            planned_grants.push(PlannedGrant {
                occurrence: GrantOccurrence::annual(index),
                amount,
                grant_date: add_months(join_date, u32::from(index) * 12)?,
                expire_date: add_months(join_date, u32::from(index + 1) * 12)?,
                reason: format!("annual grant for service year {index}"),
            });
        }
        skipped_annual_backfills = (1..index).filter(|n| !annual_taken.contains(n)).collect();
    }

    // Active usage per referenced grant.
    let mut used_by_grant: HashMap<TransactionId, Decimal> = HashMap::new();
    for tx in history {
        if tx.transaction_type == TransactionType::Use && tx.is_active() {
            if let Some(reference_id) = tx.reference_id {
                *used_by_grant.entry(reference_id).or_insert(Decimal::ZERO) += tx.amount.abs();
            }
        }
    }

    // Grants due for expiration: past their own expire date, or, once the
    // one-year boundary has passed, any monthly grant with days remaining.
    let mut due_expirations: Vec<DueExpiration> = Vec::new();
    for tx in history {
        if !tx.is_consumable_grant() {
            continue;
        }
        let used: Decimal = used_by_grant
            .get(&tx.transaction_id)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let unused: Decimal = tx.amount - used;
        if unused <= Decimal::ZERO {
            continue;
        }
        let past_expiry: bool = tx.expire_date.is_some_and(|d| d <= target_date);
        let forced: bool = !past_expiry
            && target_date >= anchor
            && tx.occurrence.is_some_and(|o| o.kind == GrantKind::Monthly);
        if past_expiry || forced {
            due_expirations.push(DueExpiration {
                transaction_id: tx.transaction_id,
                unused,
                forced,
            });
        }
    }
    due_expirations.sort_by_key(|due| due.transaction_id);

    // Next scheduled grant date.
    let next_grant_date: Date = match current_anniversary {
        Some(index) => add_months(join_date, u32::from(index + 1) * 12)?,
        None => {
            let mut next: Date = anchor;
            for service_month in 1..12_u16 {
                let month_anchor: Date = monthly_anchor(join_date, service_month)?;
                if month_anchor > target_date {
                    next = month_anchor;
                    break;
                }
            }
            next
        }
    };

    // Earliest future expiration among held and planned grants.
    let mut next_expire_date: Option<Date> = None;
    let mut consider = |candidate: Date| {
        if candidate > target_date {
            next_expire_date = Some(match next_expire_date {
                Some(current) if current <= candidate => current,
                _ => candidate,
            });
        }
    };
    for tx in history {
        if !tx.is_consumable_grant() {
            continue;
        }
        let used: Decimal = used_by_grant
            .get(&tx.transaction_id)
            .copied()
            .unwrap_or(Decimal::ZERO);
        if tx.amount - used <= Decimal::ZERO {
            continue;
        }
        if let Some(expire_date) = tx.expire_date {
            consider(expire_date);
        }
    }
    for grant in &planned_grants {
        consider(grant.expire_date);
    }

    Ok(AccrualAssessment {
        phase,
        years_of_service: years_of_service(join_date, target_date),
        planned_grants,
        due_expirations,
        skipped_annual_backfills,
        next_grant_date,
        next_expire_date,
    })
}
