// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! FIFO allocation of leave usage against grants.
//!
//! Usage is drawn from the earliest-expiring grant first, so leave that is
//! about to lapse is spent before leave with more runway. Allocation is
//! all-or-nothing: the plan is computed in full before any row is written,
//! and an insufficient balance writes nothing.

use crate::error::LedgerError;
use crate::store::{LedgerStore, NewTransaction};
use leave_ledger_domain::{
    Actor, DomainError, LeaveTransaction, MemberId, RequestContext, TransactionId, TransactionType,
};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// One planned consumption: `days` drawn from `grant_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// The grant to consume from.
    pub grant_id: TransactionId,
    /// Days to consume (positive).
    pub days: Decimal,
}

/// Plans a FIFO allocation of `days_needed` against a member's active rows.
///
/// Pure function: consumable grants (active, non-expired, positive
/// remainder) are sorted by `expire_date` ascending with undated grants
/// last, tie-broken by `grant_date`, and walked until the request is
/// covered.
///
/// # Errors
///
/// Returns `InsufficientBalance` if the grants cannot cover `days_needed`,
/// or a domain violation if `days_needed` is not positive.
pub fn plan_allocation(
    member_id: MemberId,
    active_rows: &[LeaveTransaction],
    days_needed: Decimal,
) -> Result<Vec<Allocation>, LedgerError> {
    if days_needed <= Decimal::ZERO {
        return Err(DomainError::InvalidAmount {
            reason: String::from("allocation requires a positive day count"),
        }
        .into());
    }

    let mut used_by_grant: HashMap<TransactionId, Decimal> = HashMap::new();
    for tx in active_rows {
        if tx.transaction_type == TransactionType::Use {
            if let Some(reference_id) = tx.reference_id {
                *used_by_grant.entry(reference_id).or_insert(Decimal::ZERO) += tx.amount.abs();
            }
        }
    }

    let mut grants: Vec<(&LeaveTransaction, Decimal)> = active_rows
        .iter()
        .filter(|tx| tx.is_consumable_grant())
        .filter_map(|tx| {
            let used: Decimal = used_by_grant
                .get(&tx.transaction_id)
                .copied()
                .unwrap_or(Decimal::ZERO);
            let remaining: Decimal = tx.amount - used;
            (remaining > Decimal::ZERO).then_some((tx, remaining))
        })
        .collect();
    grants.sort_by_key(|(tx, _)| {
        (
            tx.expire_date.is_none(),
            tx.expire_date,
            tx.grant_date,
            tx.transaction_id,
        )
    });

    let available: Decimal = grants
        .iter()
        .fold(Decimal::ZERO, |acc, (_, remaining)| acc + remaining);
    if available < days_needed {
        return Err(LedgerError::InsufficientBalance {
            member_id,
            requested: days_needed,
            available,
        });
    }

    let mut plan: Vec<Allocation> = Vec::new();
    let mut outstanding: Decimal = days_needed;
    for (tx, remaining) in grants {
        if outstanding <= Decimal::ZERO {
            break;
        }
        let consumed: Decimal = remaining.min(outstanding);
        plan.push(Allocation {
            grant_id: tx.transaction_id,
            days: consumed,
        });
        outstanding -= consumed;
    }
    Ok(plan)
}

/// Allocates a leave request's days against the member's grants, writing
/// one `Use` row per consumed grant.
///
/// # Errors
///
/// Returns `InsufficientBalance` with zero side effects if the member's
/// grants cannot cover the request.
pub fn allocate_usage<S: LedgerStore + ?Sized>(
    store: &S,
    request: &RequestContext,
    actor: &Actor,
) -> Result<Vec<LeaveTransaction>, LedgerError> {
    let active_rows: Vec<LeaveTransaction> = store.active_transactions_for(request.member_id)?;
    let plan: Vec<Allocation> = plan_allocation(request.member_id, &active_rows, request.total_days)?;

    let mut written: Vec<LeaveTransaction> = Vec::with_capacity(plan.len());
    for allocation in plan {
        let row: LeaveTransaction = store.append(NewTransaction::usage(
            request,
            allocation.days,
            allocation.grant_id,
            actor,
        ))?;
        written.push(row);
    }
    Ok(written)
}

/// Cancels every active `Use` row written for a request, restoring the
/// consumed amounts to their original grants. Compensating action: prior
/// rows are cancelled, never deleted, and allocation is not re-run.
///
/// Returns the number of rows cancelled. Cancelling a request with no
/// active usage is a no-op.
///
/// # Errors
///
/// Returns a store error if the fetch or a cancellation fails.
pub fn cancel_usage<S: LedgerStore + ?Sized>(
    store: &S,
    request: &RequestContext,
    actor: &Actor,
) -> Result<usize, LedgerError> {
    let key: String = request.request_key();
    let active_rows: Vec<LeaveTransaction> = store.active_transactions_for(request.member_id)?;

    let mut cancelled: usize = 0;
    for tx in active_rows {
        if tx.transaction_type == TransactionType::Use && tx.request_key.as_deref() == Some(&*key) {
            store.cancel(tx.transaction_id, actor)?;
            cancelled += 1;
        }
    }
    Ok(cancelled)
}
