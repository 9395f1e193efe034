// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Balance aggregation.
//!
//! The balance cache is always recomputed wholesale from the transaction
//! ledger. The invariant: `current_balance` = active non-expired grants
//! minus active usage (absolute) plus active adjustments. Expired grants
//! contribute to `total_expired` only.

use crate::types::{LeaveBalance, LeaveTransaction, MemberId, TransactionType};
use rust_decimal::Decimal;
use time::OffsetDateTime;

/// Recomputes a member's balance from their transaction rows.
///
/// Cancelled rows are ignored entirely. Expired grants are excluded from
/// the positive side and reported separately. `Expire`-type rows, if an
/// installation records them explicitly, count toward `total_expired` by
/// absolute amount.
///
/// # Arguments
///
/// * `member_id` - The member the rows belong to
/// * `transactions` - The member's transaction rows (any mix of statuses)
/// * `as_of` - Timestamp recorded on the resulting balance
#[must_use]
pub fn compute_balance(
    member_id: MemberId,
    transactions: &[LeaveTransaction],
    as_of: OffsetDateTime,
) -> LeaveBalance {
    let mut total_granted: Decimal = Decimal::ZERO;
    let mut total_used: Decimal = Decimal::ZERO;
    let mut total_expired: Decimal = Decimal::ZERO;
    let mut total_adjusted: Decimal = Decimal::ZERO;

    for tx in transactions {
        if !tx.is_active() {
            continue;
        }
        match tx.transaction_type {
            TransactionType::Grant | TransactionType::ManualGrant => {
                if tx.is_expired {
                    total_expired += tx.amount;
                } else {
                    total_granted += tx.amount;
                }
            }
            TransactionType::Use => total_used += tx.amount.abs(),
            TransactionType::Expire => total_expired += tx.amount.abs(),
            TransactionType::Adjust => total_adjusted += tx.amount,
        }
    }

    LeaveBalance {
        member_id,
        total_granted,
        total_used,
        total_expired,
        current_balance: total_granted - total_used + total_adjusted,
        last_updated: as_of,
    }
}
