// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Read operations.

use crate::data_models::{BalanceRow, MemberRow, PolicyRow, TransactionRow};
use crate::diesel_schema::{leave_balances, leave_policies, leave_transactions, members};
use crate::error::PersistenceError;
use diesel::prelude::*;

/// Fetches a single transaction row by identifier.
pub fn get_transaction(
    conn: &mut SqliteConnection,
    transaction_id: i64,
) -> Result<Option<TransactionRow>, PersistenceError> {
    leave_transactions::table
        .filter(leave_transactions::transaction_id.eq(transaction_id))
        .first::<TransactionRow>(conn)
        .optional()
        .map_err(|e| PersistenceError::QueryFailed(format!("get_transaction: {e}")))
}

/// Every row for a member, cancelled included, in insertion order.
pub fn transactions_for_member(
    conn: &mut SqliteConnection,
    member_id: i64,
) -> Result<Vec<TransactionRow>, PersistenceError> {
    leave_transactions::table
        .filter(leave_transactions::member_id.eq(member_id))
        .order(leave_transactions::transaction_id.asc())
        .load::<TransactionRow>(conn)
        .map_err(|e| PersistenceError::QueryFailed(format!("transactions_for_member: {e}")))
}

/// Active-status rows for a member (expired grants included).
pub fn active_transactions_for_member(
    conn: &mut SqliteConnection,
    member_id: i64,
) -> Result<Vec<TransactionRow>, PersistenceError> {
    leave_transactions::table
        .filter(leave_transactions::member_id.eq(member_id))
        .filter(leave_transactions::status.eq("active"))
        .order(leave_transactions::transaction_id.asc())
        .load::<TransactionRow>(conn)
        .map_err(|e| {
            PersistenceError::QueryFailed(format!("active_transactions_for_member: {e}"))
        })
}

/// Every row for a set of members in one batched query.
pub fn transactions_for_members(
    conn: &mut SqliteConnection,
    member_ids: &[i64],
) -> Result<Vec<TransactionRow>, PersistenceError> {
    leave_transactions::table
        .filter(leave_transactions::member_id.eq_any(member_ids.iter().copied()))
        .order(leave_transactions::transaction_id.asc())
        .load::<TransactionRow>(conn)
        .map_err(|e| PersistenceError::QueryFailed(format!("transactions_for_members: {e}")))
}

/// The cached balance row for a member, if any.
pub fn balance_for_member(
    conn: &mut SqliteConnection,
    member_id: i64,
) -> Result<Option<BalanceRow>, PersistenceError> {
    leave_balances::table
        .filter(leave_balances::member_id.eq(member_id))
        .first::<BalanceRow>(conn)
        .optional()
        .map_err(|e| PersistenceError::QueryFailed(format!("balance_for_member: {e}")))
}

/// Members with active employment status.
pub fn active_members(conn: &mut SqliteConnection) -> Result<Vec<MemberRow>, PersistenceError> {
    members::table
        .filter(members::status.eq("active"))
        .order(members::member_id.asc())
        .load::<MemberRow>(conn)
        .map_err(|e| PersistenceError::QueryFailed(format!("active_members: {e}")))
}

/// Fetches a single member row.
pub fn get_member(
    conn: &mut SqliteConnection,
    member_id: i64,
) -> Result<Option<MemberRow>, PersistenceError> {
    members::table
        .filter(members::member_id.eq(member_id))
        .first::<MemberRow>(conn)
        .optional()
        .map_err(|e| PersistenceError::QueryFailed(format!("get_member: {e}")))
}

/// The single active policy row, if configured.
pub fn active_policy(conn: &mut SqliteConnection) -> Result<Option<PolicyRow>, PersistenceError> {
    leave_policies::table
        .filter(leave_policies::is_active.eq(1))
        .first::<PolicyRow>(conn)
        .optional()
        .map_err(|e| PersistenceError::QueryFailed(format!("active_policy: {e}")))
}
