// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Write operations. All writes go through these functions; rows are only
//! ever inserted or have their monotonic flags advanced, never deleted.

use crate::data_models::{BalanceRow, NewMemberRow, NewPolicyRow, NewTransactionRow};
use crate::diesel_schema::{leave_balances, leave_policies, leave_transactions, members};
use crate::error::PersistenceError;
use diesel::prelude::*;

/// Inserts a transaction row and returns the assigned identifier directly
/// from the insert, so callers never rediscover rows by content matching.
pub fn insert_transaction(
    conn: &mut SqliteConnection,
    row: &NewTransactionRow,
) -> Result<i64, PersistenceError> {
    let transaction_id: i64 = diesel::insert_into(leave_transactions::table)
        .values(row)
        .returning(leave_transactions::transaction_id)
        .get_result(conn)?;
    Ok(transaction_id)
}

/// Transitions an active transaction to cancelled. Returns the number of
/// rows updated (zero when the row is missing or already cancelled).
pub fn set_cancelled(
    conn: &mut SqliteConnection,
    transaction_id: i64,
    actor_id: &str,
    cancelled_at: &str,
) -> Result<usize, PersistenceError> {
    let updated: usize = diesel::update(
        leave_transactions::table
            .filter(leave_transactions::transaction_id.eq(transaction_id))
            .filter(leave_transactions::status.eq("active")),
    )
    .set((
        leave_transactions::status.eq("cancelled"),
        leave_transactions::cancelled_by.eq(actor_id),
        leave_transactions::cancelled_at.eq(cancelled_at),
    ))
    .execute(conn)?;
    Ok(updated)
}

/// Sets the expiry flag on a not-yet-expired grant row. Returns the number
/// of rows updated (zero when already expired).
pub fn set_expired(
    conn: &mut SqliteConnection,
    transaction_id: i64,
    actor_id: &str,
    expired_at: &str,
) -> Result<usize, PersistenceError> {
    let updated: usize = diesel::update(
        leave_transactions::table
            .filter(leave_transactions::transaction_id.eq(transaction_id))
            .filter(leave_transactions::is_expired.eq(0)),
    )
    .set((
        leave_transactions::is_expired.eq(1),
        leave_transactions::expired_by.eq(actor_id),
        leave_transactions::expired_at.eq(expired_at),
    ))
    .execute(conn)?;
    Ok(updated)
}

/// Retargets every active use row referencing `from` to reference `to`.
/// Returns the number of rows repointed.
pub fn repoint_uses(
    conn: &mut SqliteConnection,
    from: i64,
    to: i64,
) -> Result<usize, PersistenceError> {
    let updated: usize = diesel::update(
        leave_transactions::table
            .filter(leave_transactions::transaction_type.eq("use"))
            .filter(leave_transactions::status.eq("active"))
            .filter(leave_transactions::reference_id.eq(from)),
    )
    .set(leave_transactions::reference_id.eq(to))
    .execute(conn)?;
    Ok(updated)
}

/// Replaces a member's balance row wholesale.
pub fn upsert_balance(conn: &mut SqliteConnection, row: &BalanceRow) -> Result<(), PersistenceError> {
    diesel::insert_into(leave_balances::table)
        .values(row)
        .on_conflict(leave_balances::member_id)
        .do_update()
        .set((
            leave_balances::total_granted.eq(&row.total_granted),
            leave_balances::total_used.eq(&row.total_used),
            leave_balances::total_expired.eq(&row.total_expired),
            leave_balances::current_balance.eq(&row.current_balance),
            leave_balances::last_updated.eq(&row.last_updated),
        ))
        .execute(conn)?;
    Ok(())
}

/// Inserts a roster member and returns the assigned identifier.
pub fn insert_member(
    conn: &mut SqliteConnection,
    row: &NewMemberRow,
) -> Result<i64, PersistenceError> {
    let member_id: i64 = diesel::insert_into(members::table)
        .values(row)
        .returning(members::member_id)
        .get_result(conn)?;
    Ok(member_id)
}

/// Clears the active flag on every policy row.
pub fn deactivate_policies(conn: &mut SqliteConnection) -> Result<(), PersistenceError> {
    diesel::update(leave_policies::table)
        .set(leave_policies::is_active.eq(0))
        .execute(conn)?;
    Ok(())
}

/// Inserts a policy row.
pub fn insert_policy(
    conn: &mut SqliteConnection,
    row: &NewPolicyRow,
) -> Result<i64, PersistenceError> {
    let policy_id: i64 = diesel::insert_into(leave_policies::table)
        .values(row)
        .returning(leave_policies::policy_id)
        .get_result(conn)?;
    Ok(policy_id)
}
