// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Expiration processing.
//!
//! A grant past its expiry with nothing used is expired in place. A
//! partially used grant is split: the original row is cancelled, a
//! preserved grant is inserted for exactly the used amount and the
//! original's usage rows are repointed to it, and the unused remainder is
//! inserted as a second grant that is immediately marked expired. The
//! audit trail keeps every leave-day attributable to its grant while
//! expired days never reappear in a balance.
//!
//! Must not run concurrently with itself for the same member: the split
//! rewrites `reference_id` links. The batch runner processes each member's
//! expirations sequentially inside that member's task.

use crate::error::LedgerError;
use crate::store::{LedgerStore, NewTransaction};
use leave_ledger_domain::{
    Actor, DueExpiration, LeaveTransaction, MemberId, TransactionId, TransactionType,
};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Summary of one member's expiration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpirationOutcome {
    /// Grants expired (in place or via split remnant).
    pub expired_grants: usize,
    /// How many of those required a split.
    pub splits: usize,
    /// Total days removed from the member's balance.
    pub expired_days: Decimal,
}

/// Resolves a member's due expirations against the store.
///
/// Safe to re-run: grants that were already expired or cancelled by an
/// earlier pass are skipped, and remainders are recomputed from the
/// store's current rows rather than trusted from the assessment.
///
/// # Errors
///
/// Returns a store error if any write fails. Writes already performed for
/// earlier due grants are not rolled back; a retry completes the rest.
pub fn process_expirations<S: LedgerStore + ?Sized>(
    store: &S,
    member_id: MemberId,
    due: &[DueExpiration],
    actor: &Actor,
) -> Result<ExpirationOutcome, LedgerError> {
    let active_rows: Vec<LeaveTransaction> = store.active_transactions_for(member_id)?;

    let mut used_by_grant: HashMap<TransactionId, Decimal> = HashMap::new();
    for tx in &active_rows {
        if tx.transaction_type == TransactionType::Use {
            if let Some(reference_id) = tx.reference_id {
                *used_by_grant.entry(reference_id).or_insert(Decimal::ZERO) += tx.amount.abs();
            }
        }
    }

    let mut outcome: ExpirationOutcome = ExpirationOutcome::default();
    for item in due {
        let Some(grant) = active_rows
            .iter()
            .find(|tx| tx.transaction_id == item.transaction_id)
        else {
            continue;
        };
        if !grant.is_consumable_grant() {
            continue;
        }

        let used: Decimal = used_by_grant
            .get(&grant.transaction_id)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let unused: Decimal = grant.amount - used;
        if unused <= Decimal::ZERO {
            continue;
        }

        if used == Decimal::ZERO {
            store.mark_expired(grant.transaction_id, actor)?;
        } else {
            split_grant(store, grant, used, unused, actor)?;
            outcome.splits += 1;
        }
        outcome.expired_grants += 1;
        outcome.expired_days += unused;
    }
    Ok(outcome)
}

/// Splits a partially used grant into a preserved-used remnant and an
/// expired-unused remnant.
///
/// The preserved grant's identifier comes straight from the insert; the
/// usage rows are repointed to it before the remainder is written, so a
/// failure mid-split leaves every use row attached to a live grant.
fn split_grant<S: LedgerStore + ?Sized>(
    store: &S,
    grant: &LeaveTransaction,
    used: Decimal,
    unused: Decimal,
    actor: &Actor,
) -> Result<(), LedgerError> {
    store.cancel(grant.transaction_id, actor)?;

    let preserved: LeaveTransaction = store.append(NewTransaction::split_grant(
        grant,
        used,
        format!("preserved used portion of grant {}", grant.transaction_id),
        actor,
    ))?;
    store.repoint_uses(grant.transaction_id, preserved.transaction_id)?;

    let remainder: LeaveTransaction = store.append(NewTransaction::split_grant(
        grant,
        unused,
        format!("expired unused remainder of grant {}", grant.transaction_id),
        actor,
    ))?;
    store.mark_expired(remainder.transaction_id, actor)?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::allocator::allocate_usage;
    use crate::memory::MemoryLedger;
    use crate::store::compute_member_balance;
    use leave_ledger_domain::{LeaveBalance, RequestContext, TransactionStatus};
    use rust_decimal_macros::dec;
    use time::macros::date;

    fn seed_grant(ledger: &MemoryLedger, amount: Decimal) -> TransactionId {
        ledger
            .append(NewTransaction::manual_grant(
                MemberId::new(1),
                amount,
                date!(2024 - 01 - 01),
                Some(date!(2025 - 01 - 01)),
                String::from("seed grant"),
                &Actor::system(),
            ))
            .unwrap()
            .transaction_id
    }

    fn use_days(ledger: &MemoryLedger, days: Decimal) {
        let request: RequestContext = RequestContext::new(
            MemberId::new(1),
            String::from("annual"),
            date!(2024 - 05 - 01),
            date!(2024 - 05 - 07),
            days,
        );
        allocate_usage(ledger, &request, &Actor::system()).unwrap();
    }

    #[test]
    fn test_untouched_grant_expires_in_place() {
        let ledger: MemoryLedger = MemoryLedger::new();
        let grant_id: TransactionId = seed_grant(&ledger, dec!(10));
        let due: Vec<DueExpiration> = vec![DueExpiration {
            transaction_id: grant_id,
            unused: dec!(10),
            forced: false,
        }];

        let outcome: ExpirationOutcome =
            process_expirations(&ledger, MemberId::new(1), &due, &Actor::scheduler()).unwrap();

        assert_eq!(outcome.expired_grants, 1);
        assert_eq!(outcome.splits, 0);
        assert_eq!(outcome.expired_days, dec!(10));
        let stored: LeaveTransaction = ledger.transaction(grant_id).unwrap().unwrap();
        assert!(stored.is_expired);
        assert_eq!(stored.status, TransactionStatus::Active);
    }

    #[test]
    fn test_partially_used_grant_is_split() {
        let ledger: MemoryLedger = MemoryLedger::new();
        let grant_id: TransactionId = seed_grant(&ledger, dec!(10));
        use_days(&ledger, dec!(3));
        let due: Vec<DueExpiration> = vec![DueExpiration {
            transaction_id: grant_id,
            unused: dec!(7),
            forced: false,
        }];

        let before: LeaveBalance = compute_member_balance(&ledger, MemberId::new(1)).unwrap();
        let outcome: ExpirationOutcome =
            process_expirations(&ledger, MemberId::new(1), &due, &Actor::scheduler()).unwrap();

        assert_eq!(outcome.expired_grants, 1);
        assert_eq!(outcome.splits, 1);
        assert_eq!(outcome.expired_days, dec!(7));

        // Original cancelled; one active 3-day grant holding the usage
        // links; one expired 7-day grant.
        let rows: Vec<LeaveTransaction> = ledger.all_transactions_for(MemberId::new(1)).unwrap();
        let original: &LeaveTransaction = rows
            .iter()
            .find(|tx| tx.transaction_id == grant_id)
            .unwrap();
        assert_eq!(original.status, TransactionStatus::Cancelled);

        let preserved: &LeaveTransaction = rows
            .iter()
            .find(|tx| tx.is_consumable_grant())
            .unwrap();
        assert_eq!(preserved.amount, dec!(3));
        assert_eq!(preserved.grant_date, original.grant_date);
        assert_eq!(preserved.expire_date, original.expire_date);

        let expired: &LeaveTransaction = rows
            .iter()
            .find(|tx| tx.is_grant() && tx.is_expired && tx.is_active())
            .unwrap();
        assert_eq!(expired.amount, dec!(7));

        // Usage rows now reference the preserved grant.
        let usage_rows: Vec<&LeaveTransaction> = rows
            .iter()
            .filter(|tx| tx.transaction_type == TransactionType::Use && tx.is_active())
            .collect();
        assert!(!usage_rows.is_empty());
        for usage in usage_rows {
            assert_eq!(usage.reference_id, Some(preserved.transaction_id));
        }

        // total_used is unchanged by the split; expired days leave the
        // balance.
        let after: LeaveBalance = compute_member_balance(&ledger, MemberId::new(1)).unwrap();
        assert_eq!(after.total_used, before.total_used);
        assert_eq!(after.total_expired, dec!(7));
        assert_eq!(after.current_balance, dec!(0));
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let ledger: MemoryLedger = MemoryLedger::new();
        let grant_id: TransactionId = seed_grant(&ledger, dec!(10));
        use_days(&ledger, dec!(3));
        let due: Vec<DueExpiration> = vec![DueExpiration {
            transaction_id: grant_id,
            unused: dec!(7),
            forced: false,
        }];

        process_expirations(&ledger, MemberId::new(1), &due, &Actor::scheduler()).unwrap();
        let second: ExpirationOutcome =
            process_expirations(&ledger, MemberId::new(1), &due, &Actor::scheduler()).unwrap();

        assert_eq!(second.expired_grants, 0);
        assert_eq!(second.expired_days, dec!(0));
        let after: LeaveBalance = compute_member_balance(&ledger, MemberId::new(1)).unwrap();
        assert_eq!(after.total_expired, dec!(7));
        assert_eq!(after.total_granted, dec!(3));
    }

    #[test]
    fn test_stale_remainder_recomputed_from_store() {
        // The assessment said 7 unused, but a cancellation since then
        // restored a use row; the processor trusts the store.
        let ledger: MemoryLedger = MemoryLedger::new();
        let grant_id: TransactionId = seed_grant(&ledger, dec!(10));
        use_days(&ledger, dec!(10));
        let due: Vec<DueExpiration> = vec![DueExpiration {
            transaction_id: grant_id,
            unused: dec!(7),
            forced: false,
        }];

        let outcome: ExpirationOutcome =
            process_expirations(&ledger, MemberId::new(1), &due, &Actor::scheduler()).unwrap();

        // Fully used by now: nothing to expire.
        assert_eq!(outcome.expired_grants, 0);
    }

    #[test]
    fn test_multiple_due_grants_processed_sequentially() {
        let ledger: MemoryLedger = MemoryLedger::new();
        let first: TransactionId = seed_grant(&ledger, dec!(2));
        let second: TransactionId = seed_grant(&ledger, dec!(3));
        let due: Vec<DueExpiration> = vec![
            DueExpiration {
                transaction_id: first,
                unused: dec!(2),
                forced: false,
            },
            DueExpiration {
                transaction_id: second,
                unused: dec!(3),
                forced: true,
            },
        ];

        let outcome: ExpirationOutcome =
            process_expirations(&ledger, MemberId::new(1), &due, &Actor::scheduler()).unwrap();

        assert_eq!(outcome.expired_grants, 2);
        assert_eq!(outcome.expired_days, dec!(5));
        let balance: LeaveBalance = compute_member_balance(&ledger, MemberId::new(1)).unwrap();
        assert_eq!(balance.current_balance, dec!(0));
        assert_eq!(balance.total_expired, dec!(5));
    }
}
