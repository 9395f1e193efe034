// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use diesel::SqliteConnection;
use diesel::connection::SimpleConnection;
use tracing::info;

use crate::error::PersistenceError;

/// Initializes the database schema.
///
/// Idempotent: every statement is `IF NOT EXISTS`, so opening an existing
/// database is safe.
///
/// # Arguments
///
/// * `conn` - The database connection to initialize
///
/// # Errors
///
/// Returns an error if schema creation fails.
pub fn initialize_schema(conn: &mut SqliteConnection) -> Result<(), PersistenceError> {
    info!("Initializing database schema");

    conn.batch_execute(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS members (
            member_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            join_date TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('active', 'terminated'))
        );

        CREATE TABLE IF NOT EXISTS leave_policies (
            policy_id INTEGER PRIMARY KEY AUTOINCREMENT,
            base_annual_days INTEGER NOT NULL,
            increment_years INTEGER NOT NULL,
            increment_days INTEGER NOT NULL,
            max_annual_days INTEGER NOT NULL,
            first_year_monthly_grant TEXT NOT NULL,
            first_year_max_days INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 0 CHECK(is_active IN (0, 1))
        );

        CREATE TABLE IF NOT EXISTS leave_transactions (
            transaction_id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id INTEGER NOT NULL,
            transaction_type TEXT NOT NULL
                CHECK(transaction_type IN ('grant', 'manual_grant', 'use', 'expire', 'adjust')),
            amount TEXT NOT NULL,
            grant_date TEXT,
            expire_date TEXT,
            reference_id INTEGER,
            grant_kind TEXT CHECK(grant_kind IN ('monthly', 'annual')),
            period_index INTEGER,
            request_key TEXT,
            status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active', 'cancelled')),
            is_expired INTEGER NOT NULL DEFAULT 0 CHECK(is_expired IN (0, 1)),
            reason TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            cancelled_by TEXT,
            cancelled_at TEXT,
            expired_by TEXT,
            expired_at TEXT,
            FOREIGN KEY(member_id) REFERENCES members(member_id)
        );

        CREATE INDEX IF NOT EXISTS idx_transactions_member
            ON leave_transactions(member_id);

        CREATE INDEX IF NOT EXISTS idx_transactions_reference
            ON leave_transactions(reference_id);

        -- The grant occurrence slot is the idempotency guard against
        -- double-granting: unique per member across active AND cancelled
        -- rows.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_occurrence
            ON leave_transactions(member_id, grant_kind, period_index)
            WHERE grant_kind IS NOT NULL;

        CREATE TABLE IF NOT EXISTS leave_balances (
            member_id INTEGER PRIMARY KEY,
            total_granted TEXT NOT NULL,
            total_used TEXT NOT NULL,
            total_expired TEXT NOT NULL,
            current_balance TEXT NOT NULL,
            last_updated TEXT NOT NULL,
            FOREIGN KEY(member_id) REFERENCES members(member_id)
        );
        ",
    )
    .map_err(|e| PersistenceError::InitializationError(e.to_string()))?;

    Ok(())
}
