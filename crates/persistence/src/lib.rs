// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Persistence layer for the Leave Ledger.
//!
//! This crate provides the Diesel/SQLite-backed implementation of the
//! ledger store and of the roster/policy provider traits. `SQLite` is the
//! only backend: development, unit tests, and production deployments all
//! run against it, with fast in-memory databases for tests.
//!
//! The adapter holds its connection behind a mutex so the batch runner's
//! parallel per-member tasks can share one handle. There is no transaction
//! or locking discipline beyond that: correctness relies on occurrence-slot
//! uniqueness (enforced by a partial unique index), all-or-nothing
//! allocation planning, and monotonic status transitions.

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
#![allow(clippy::multiple_crate_versions)]

mod data_models;
mod diesel_schema;
mod error;
mod mutations;
mod queries;
mod schema;

#[cfg(test)]
mod tests;

use diesel::prelude::*;
use diesel::SqliteConnection;
use leave_ledger::{LedgerError, LedgerStore, MemberRoster, NewTransaction, PolicyProvider};
use leave_ledger_domain::{
    Actor, LeaveBalance, LeavePolicy, LeaveTransaction, Member, MemberId, MemberStatus,
    TransactionId,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use time::{Date, OffsetDateTime};
use tracing::{debug, info};

pub use error::PersistenceError;
pub use schema::initialize_schema;

use data_models::{
    BalanceRow, MemberRow, NewMemberRow, PolicyRow, TransactionRow, balance_row, format_date,
    format_datetime, new_policy_row, new_transaction_row,
};

/// Diesel/SQLite-backed store and provider adapter.
pub struct Persistence {
    conn: Mutex<SqliteConnection>,
}

impl Persistence {
    /// Opens (and initializes) a database at the given URL or path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or schema initialization fails.
    pub fn open(database_url: &str) -> Result<Self, PersistenceError> {
        let mut conn: SqliteConnection = SqliteConnection::establish(database_url)?;
        schema::initialize_schema(&mut conn)?;
        info!(database_url, "Opened leave ledger database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a fresh in-memory database. Used by tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or schema initialization fails.
    pub fn new_in_memory() -> Result<Self, PersistenceError> {
        Self::open(":memory:")
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteConnection>, PersistenceError> {
        self.conn
            .lock()
            .map_err(|_| PersistenceError::Other(String::from("connection mutex poisoned")))
    }

    /// Inserts a roster member, returning it with the assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert_member(
        &self,
        name: &str,
        join_date: Date,
        status: MemberStatus,
    ) -> Result<Member, PersistenceError> {
        let mut conn: MutexGuard<'_, SqliteConnection> = self.lock()?;
        let row: NewMemberRow = NewMemberRow {
            name: name.to_string(),
            join_date: format_date(join_date),
            status: status.as_str().to_string(),
        };
        let member_id: i64 = mutations::insert_member(&mut conn, &row)?;
        debug!(member_id, name, "Inserted member");
        Ok(Member::new(
            MemberId::new(member_id),
            name.to_string(),
            join_date,
            status,
        ))
    }

    /// Makes `policy` the single active policy, deactivating any other.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails.
    pub fn activate_policy(&self, policy: &LeavePolicy) -> Result<(), PersistenceError> {
        let mut conn: MutexGuard<'_, SqliteConnection> = self.lock()?;
        mutations::deactivate_policies(&mut conn)?;
        let policy_id: i64 = mutations::insert_policy(&mut conn, &new_policy_row(policy, true))?;
        info!(policy_id, "Activated leave policy");
        Ok(())
    }

    /// Fetches a single transaction, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch or conversion fails.
    pub fn transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<LeaveTransaction>, PersistenceError> {
        let mut conn: MutexGuard<'_, SqliteConnection> = self.lock()?;
        queries::get_transaction(&mut conn, id.value())?
            .map(LeaveTransaction::try_from)
            .transpose()
    }
}

fn convert_rows(rows: Vec<TransactionRow>) -> Result<Vec<LeaveTransaction>, PersistenceError> {
    rows.into_iter().map(LeaveTransaction::try_from).collect()
}

impl LedgerStore for Persistence {
    fn append(&self, new: NewTransaction) -> Result<LeaveTransaction, LedgerError> {
        new.validate()?;
        let created_at: OffsetDateTime = OffsetDateTime::now_utc();
        let row = new_transaction_row(&new, created_at).map_err(LedgerError::from)?;

        let mut conn: MutexGuard<'_, SqliteConnection> = self.lock().map_err(LedgerError::from)?;
        let transaction_id: i64 = match mutations::insert_transaction(&mut conn, &row) {
            Ok(id) => id,
            Err(PersistenceError::DuplicateKey(_)) => {
                // The only unique index is the occurrence slot.
                if let Some(occurrence) = new.occurrence {
                    return Err(LedgerError::DuplicateOccurrence {
                        member_id: new.member_id,
                        occurrence,
                    });
                }
                return Err(LedgerError::Store(String::from(
                    "unexpected unique constraint violation",
                )));
            }
            Err(err) => return Err(err.into()),
        };
        debug!(
            transaction_id,
            member_id = new.member_id.value(),
            transaction_type = new.transaction_type.as_str(),
            "Appended transaction"
        );

        Ok(LeaveTransaction {
            transaction_id: TransactionId::new(transaction_id),
            member_id: new.member_id,
            transaction_type: new.transaction_type,
            amount: new.amount,
            grant_date: new.grant_date,
            expire_date: new.expire_date,
            reference_id: new.reference_id,
            occurrence: new.occurrence,
            request_key: new.request_key,
            status: leave_ledger_domain::TransactionStatus::Active,
            is_expired: false,
            reason: new.reason,
            created_by: new.created_by.id,
            created_at,
            cancelled_by: None,
            cancelled_at: None,
            expired_by: None,
            expired_at: None,
        })
    }

    fn cancel(&self, id: TransactionId, actor: &Actor) -> Result<(), LedgerError> {
        let cancelled_at: String =
            format_datetime(OffsetDateTime::now_utc()).map_err(LedgerError::from)?;
        let mut conn: MutexGuard<'_, SqliteConnection> = self.lock().map_err(LedgerError::from)?;

        let updated: usize = mutations::set_cancelled(&mut conn, id.value(), &actor.id, &cancelled_at)
            .map_err(LedgerError::from)?;
        if updated == 0 {
            let existing: Option<TransactionRow> =
                queries::get_transaction(&mut conn, id.value()).map_err(LedgerError::from)?;
            return match existing {
                None => Err(LedgerError::TransactionNotFound(id)),
                Some(_) => Err(LedgerError::AlreadyCancelled(id)),
            };
        }
        debug!(transaction_id = id.value(), actor = %actor.id, "Cancelled transaction");
        Ok(())
    }

    fn mark_expired(&self, id: TransactionId, actor: &Actor) -> Result<(), LedgerError> {
        let expired_at: String =
            format_datetime(OffsetDateTime::now_utc()).map_err(LedgerError::from)?;
        let mut conn: MutexGuard<'_, SqliteConnection> = self.lock().map_err(LedgerError::from)?;

        let existing: TransactionRow = queries::get_transaction(&mut conn, id.value())
            .map_err(LedgerError::from)?
            .ok_or(LedgerError::TransactionNotFound(id))?;
        if existing.transaction_type != "grant" && existing.transaction_type != "manual_grant" {
            return Err(LedgerError::NotAGrant(id));
        }
        if existing.is_expired != 0 {
            return Ok(());
        }
        mutations::set_expired(&mut conn, id.value(), &actor.id, &expired_at)
            .map_err(LedgerError::from)?;
        debug!(transaction_id = id.value(), actor = %actor.id, "Expired grant");
        Ok(())
    }

    fn repoint_uses(&self, from: TransactionId, to: TransactionId) -> Result<usize, LedgerError> {
        let mut conn: MutexGuard<'_, SqliteConnection> = self.lock().map_err(LedgerError::from)?;
        let repointed: usize = mutations::repoint_uses(&mut conn, from.value(), to.value())
            .map_err(LedgerError::from)?;
        debug!(
            from = from.value(),
            to = to.value(),
            repointed,
            "Repointed use rows"
        );
        Ok(repointed)
    }

    fn active_transactions_for(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<LeaveTransaction>, LedgerError> {
        let mut conn: MutexGuard<'_, SqliteConnection> = self.lock().map_err(LedgerError::from)?;
        let rows: Vec<TransactionRow> =
            queries::active_transactions_for_member(&mut conn, member_id.value())
                .map_err(LedgerError::from)?;
        convert_rows(rows).map_err(LedgerError::from)
    }

    fn all_transactions_for(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<LeaveTransaction>, LedgerError> {
        let mut conn: MutexGuard<'_, SqliteConnection> = self.lock().map_err(LedgerError::from)?;
        let rows: Vec<TransactionRow> =
            queries::transactions_for_member(&mut conn, member_id.value())
                .map_err(LedgerError::from)?;
        convert_rows(rows).map_err(LedgerError::from)
    }

    fn transactions_for_members(
        &self,
        member_ids: &[MemberId],
    ) -> Result<HashMap<MemberId, Vec<LeaveTransaction>>, LedgerError> {
        let ids: Vec<i64> = member_ids.iter().copied().map(MemberId::value).collect();
        let mut conn: MutexGuard<'_, SqliteConnection> = self.lock().map_err(LedgerError::from)?;
        let rows: Vec<TransactionRow> =
            queries::transactions_for_members(&mut conn, &ids).map_err(LedgerError::from)?;

        let mut grouped: HashMap<MemberId, Vec<LeaveTransaction>> =
            member_ids.iter().map(|id| (*id, Vec::new())).collect();
        for row in rows {
            let tx: LeaveTransaction = LeaveTransaction::try_from(row).map_err(LedgerError::from)?;
            if let Some(bucket) = grouped.get_mut(&tx.member_id) {
                bucket.push(tx);
            }
        }
        Ok(grouped)
    }

    fn balance_for(&self, member_id: MemberId) -> Result<Option<LeaveBalance>, LedgerError> {
        let mut conn: MutexGuard<'_, SqliteConnection> = self.lock().map_err(LedgerError::from)?;
        queries::balance_for_member(&mut conn, member_id.value())
            .map_err(LedgerError::from)?
            .map(LeaveBalance::try_from)
            .transpose()
            .map_err(LedgerError::from)
    }

    fn persist_balances(&self, balances: &[LeaveBalance]) -> Result<(), LedgerError> {
        let mut conn: MutexGuard<'_, SqliteConnection> = self.lock().map_err(LedgerError::from)?;
        for balance in balances {
            let row: BalanceRow = balance_row(balance).map_err(LedgerError::from)?;
            mutations::upsert_balance(&mut conn, &row).map_err(LedgerError::from)?;
        }
        debug!(count = balances.len(), "Persisted balances");
        Ok(())
    }
}

impl MemberRoster for Persistence {
    fn active_members(&self) -> Result<Vec<Member>, LedgerError> {
        let mut conn: MutexGuard<'_, SqliteConnection> = self.lock().map_err(LedgerError::from)?;
        let rows: Vec<MemberRow> = queries::active_members(&mut conn).map_err(LedgerError::from)?;
        rows.into_iter()
            .map(|row| Member::try_from(row).map_err(LedgerError::from))
            .collect()
    }

    fn member(&self, member_id: MemberId) -> Result<Member, LedgerError> {
        let mut conn: MutexGuard<'_, SqliteConnection> = self.lock().map_err(LedgerError::from)?;
        let row: MemberRow = queries::get_member(&mut conn, member_id.value())
            .map_err(LedgerError::from)?
            .ok_or(LedgerError::MemberNotFound(member_id))?;
        Member::try_from(row).map_err(LedgerError::from)
    }
}

impl PolicyProvider for Persistence {
    fn active_policy(&self) -> Result<LeavePolicy, LedgerError> {
        let mut conn: MutexGuard<'_, SqliteConnection> = self.lock().map_err(LedgerError::from)?;
        let row: PolicyRow = queries::active_policy(&mut conn)
            .map_err(LedgerError::from)?
            .ok_or(LedgerError::NoActivePolicy)?;
        LeavePolicy::try_from(row).map_err(LedgerError::from)
    }
}
