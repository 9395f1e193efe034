// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Row structs and conversions between stored text columns and domain
//! types. Dates are ISO-8601, timestamps RFC 3339, day amounts canonical
//! decimal strings.

use crate::error::PersistenceError;
use diesel::prelude::*;
use leave_ledger::NewTransaction;
use leave_ledger_domain::{
    GrantKind, GrantOccurrence, LeaveBalance, LeavePolicy, LeaveTransaction, Member, MemberId,
    MemberStatus, TransactionId, TransactionStatus, TransactionType,
};
use rust_decimal::Decimal;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{Date, OffsetDateTime};

/// A full `leave_transactions` row.
#[derive(Debug, Clone, Queryable)]
pub struct TransactionRow {
    pub transaction_id: i64,
    pub member_id: i64,
    pub transaction_type: String,
    pub amount: String,
    pub grant_date: Option<String>,
    pub expire_date: Option<String>,
    pub reference_id: Option<i64>,
    pub grant_kind: Option<String>,
    pub period_index: Option<i32>,
    pub request_key: Option<String>,
    pub status: String,
    pub is_expired: i32,
    pub reason: String,
    pub created_by: String,
    pub created_at: String,
    pub cancelled_by: Option<String>,
    pub cancelled_at: Option<String>,
    pub expired_by: Option<String>,
    pub expired_at: Option<String>,
}

/// An insertable `leave_transactions` row (identifier assigned by SQLite).
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::diesel_schema::leave_transactions)]
pub struct NewTransactionRow {
    pub member_id: i64,
    pub transaction_type: String,
    pub amount: String,
    pub grant_date: Option<String>,
    pub expire_date: Option<String>,
    pub reference_id: Option<i64>,
    pub grant_kind: Option<String>,
    pub period_index: Option<i32>,
    pub request_key: Option<String>,
    pub status: String,
    pub is_expired: i32,
    pub reason: String,
    pub created_by: String,
    pub created_at: String,
}

/// A full `members` row.
#[derive(Debug, Clone, Queryable)]
pub struct MemberRow {
    pub member_id: i64,
    pub name: String,
    pub join_date: String,
    pub status: String,
}

/// An insertable `members` row.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::diesel_schema::members)]
pub struct NewMemberRow {
    pub name: String,
    pub join_date: String,
    pub status: String,
}

/// A full `leave_policies` row.
#[derive(Debug, Clone, Queryable)]
pub struct PolicyRow {
    pub policy_id: i64,
    pub base_annual_days: i32,
    pub increment_years: i32,
    pub increment_days: i32,
    pub max_annual_days: i32,
    pub first_year_monthly_grant: String,
    pub first_year_max_days: i32,
    pub is_active: i32,
}

/// An insertable `leave_policies` row.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::diesel_schema::leave_policies)]
pub struct NewPolicyRow {
    pub base_annual_days: i32,
    pub increment_years: i32,
    pub increment_days: i32,
    pub max_annual_days: i32,
    pub first_year_monthly_grant: String,
    pub first_year_max_days: i32,
    pub is_active: i32,
}

/// A `leave_balances` row; queryable and insertable (the upsert replaces
/// the row wholesale).
#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::diesel_schema::leave_balances)]
pub struct BalanceRow {
    pub member_id: i64,
    pub total_granted: String,
    pub total_used: String,
    pub total_expired: String,
    pub current_balance: String,
    pub last_updated: String,
}

pub fn format_date(date: Date) -> String {
    date.to_string()
}

pub fn parse_date(value: &str) -> Result<Date, PersistenceError> {
    Date::parse(value, &Iso8601::DEFAULT).map_err(|e| {
        PersistenceError::SerializationError(format!("invalid date '{value}': {e}"))
    })
}

pub fn format_datetime(value: OffsetDateTime) -> Result<String, PersistenceError> {
    value.format(&Rfc3339).map_err(|e| {
        PersistenceError::SerializationError(format!("unformattable timestamp: {e}"))
    })
}

pub fn parse_datetime(value: &str) -> Result<OffsetDateTime, PersistenceError> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| {
        PersistenceError::SerializationError(format!("invalid timestamp '{value}': {e}"))
    })
}

pub fn parse_decimal(value: &str) -> Result<Decimal, PersistenceError> {
    value.parse::<Decimal>().map_err(|e| {
        PersistenceError::SerializationError(format!("invalid decimal '{value}': {e}"))
    })
}

fn parse_occurrence(
    grant_kind: Option<&str>,
    period_index: Option<i32>,
) -> Result<Option<GrantOccurrence>, PersistenceError> {
    match (grant_kind, period_index) {
        (None, None) => Ok(None),
        (Some(kind), Some(index)) => {
            let kind: GrantKind = kind.parse().map_err(|e| {
                PersistenceError::SerializationError(format!("invalid grant kind: {e}"))
            })?;
            let index: u16 = u16::try_from(index).map_err(|_| {
                PersistenceError::SerializationError(format!("invalid period index {index}"))
            })?;
            Ok(Some(GrantOccurrence::new(kind, index)))
        }
        _ => Err(PersistenceError::SerializationError(String::from(
            "grant_kind and period_index must be set together",
        ))),
    }
}

impl TryFrom<TransactionRow> for LeaveTransaction {
    type Error = PersistenceError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let transaction_type: TransactionType = row.transaction_type.parse().map_err(|e| {
            PersistenceError::SerializationError(format!("invalid transaction type: {e}"))
        })?;
        let status: TransactionStatus = row.status.parse().map_err(|e| {
            PersistenceError::SerializationError(format!("invalid status: {e}"))
        })?;
        Ok(Self {
            transaction_id: TransactionId::new(row.transaction_id),
            member_id: MemberId::new(row.member_id),
            transaction_type,
            amount: parse_decimal(&row.amount)?,
            grant_date: row.grant_date.as_deref().map(parse_date).transpose()?,
            expire_date: row.expire_date.as_deref().map(parse_date).transpose()?,
            reference_id: row.reference_id.map(TransactionId::new),
            occurrence: parse_occurrence(row.grant_kind.as_deref(), row.period_index)?,
            request_key: row.request_key,
            status,
            is_expired: row.is_expired != 0,
            reason: row.reason,
            created_by: row.created_by,
            created_at: parse_datetime(&row.created_at)?,
            cancelled_by: row.cancelled_by,
            cancelled_at: row
                .cancelled_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            expired_by: row.expired_by,
            expired_at: row.expired_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

/// Builds an insertable row from a pending transaction.
///
/// # Errors
///
/// Returns an error if the creation timestamp cannot be formatted.
pub fn new_transaction_row(
    new: &NewTransaction,
    created_at: OffsetDateTime,
) -> Result<NewTransactionRow, PersistenceError> {
    Ok(NewTransactionRow {
        member_id: new.member_id.value(),
        transaction_type: new.transaction_type.as_str().to_string(),
        amount: new.amount.to_string(),
        grant_date: new.grant_date.map(format_date),
        expire_date: new.expire_date.map(format_date),
        reference_id: new.reference_id.map(TransactionId::value),
        grant_kind: new.occurrence.map(|o| o.kind.as_str().to_string()),
        period_index: new.occurrence.map(|o| i32::from(o.period_index)),
        request_key: new.request_key.clone(),
        status: TransactionStatus::Active.as_str().to_string(),
        is_expired: 0,
        reason: new.reason.clone(),
        created_by: new.created_by.id.clone(),
        created_at: format_datetime(created_at)?,
    })
}

impl TryFrom<MemberRow> for Member {
    type Error = PersistenceError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let status: MemberStatus = row.status.parse().map_err(|e| {
            PersistenceError::SerializationError(format!("invalid member status: {e}"))
        })?;
        Ok(Self {
            member_id: MemberId::new(row.member_id),
            name: row.name,
            join_date: parse_date(&row.join_date)?,
            status,
        })
    }
}

impl TryFrom<PolicyRow> for LeavePolicy {
    type Error = PersistenceError;

    fn try_from(row: PolicyRow) -> Result<Self, Self::Error> {
        let day_field = |value: i32, name: &str| {
            u16::try_from(value).map_err(|_| {
                PersistenceError::SerializationError(format!("invalid {name} value {value}"))
            })
        };
        Ok(Self {
            base_annual_days: day_field(row.base_annual_days, "base_annual_days")?,
            increment_years: day_field(row.increment_years, "increment_years")?,
            increment_days: day_field(row.increment_days, "increment_days")?,
            max_annual_days: day_field(row.max_annual_days, "max_annual_days")?,
            first_year_monthly_grant: parse_decimal(&row.first_year_monthly_grant)?,
            first_year_max_days: day_field(row.first_year_max_days, "first_year_max_days")?,
        })
    }
}

/// Builds an insertable policy row.
#[must_use]
pub fn new_policy_row(policy: &LeavePolicy, is_active: bool) -> NewPolicyRow {
    NewPolicyRow {
        base_annual_days: i32::from(policy.base_annual_days),
        increment_years: i32::from(policy.increment_years),
        increment_days: i32::from(policy.increment_days),
        max_annual_days: i32::from(policy.max_annual_days),
        first_year_monthly_grant: policy.first_year_monthly_grant.to_string(),
        first_year_max_days: i32::from(policy.first_year_max_days),
        is_active: i32::from(is_active),
    }
}

impl TryFrom<BalanceRow> for LeaveBalance {
    type Error = PersistenceError;

    fn try_from(row: BalanceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            member_id: MemberId::new(row.member_id),
            total_granted: parse_decimal(&row.total_granted)?,
            total_used: parse_decimal(&row.total_used)?,
            total_expired: parse_decimal(&row.total_expired)?,
            current_balance: parse_decimal(&row.current_balance)?,
            last_updated: parse_datetime(&row.last_updated)?,
        })
    }
}

/// Builds a storable balance row.
///
/// # Errors
///
/// Returns an error if the timestamp cannot be formatted.
pub fn balance_row(balance: &LeaveBalance) -> Result<BalanceRow, PersistenceError> {
    Ok(BalanceRow {
        member_id: balance.member_id.value(),
        total_granted: balance.total_granted.to_string(),
        total_used: balance.total_used.to_string(),
        total_expired: balance.total_expired.to_string(),
        current_balance: balance.current_balance.to_string(),
        last_updated: format_datetime(balance.last_updated)?,
    })
}
