// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use leave_ledger_domain::{DomainError, GrantOccurrence, MemberId, TransactionId};
use rust_decimal::Decimal;

/// Errors that can occur in ledger operations.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// A domain rule was violated.
    DomainViolation(DomainError),
    /// The referenced transaction does not exist.
    TransactionNotFound(TransactionId),
    /// The operation requires a grant-type transaction.
    NotAGrant(TransactionId),
    /// The transaction has already been cancelled.
    AlreadyCancelled(TransactionId),
    /// The grant occurrence slot has already been consumed.
    DuplicateOccurrence {
        /// The member whose slot is taken.
        member_id: MemberId,
        /// The occurrence that was attempted twice.
        occurrence: GrantOccurrence,
    },
    /// Not enough unconsumed leave to satisfy an allocation.
    InsufficientBalance {
        /// The member short on leave.
        member_id: MemberId,
        /// Days requested.
        requested: Decimal,
        /// Days actually available across all consumable grants.
        available: Decimal,
    },
    /// No active leave policy is configured.
    NoActivePolicy,
    /// The member does not exist in the roster.
    MemberNotFound(MemberId),
    /// The backing store failed.
    Store(String),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DomainViolation(err) => write!(f, "Domain violation: {err}"),
            Self::TransactionNotFound(id) => write!(f, "Transaction {id} not found"),
            Self::NotAGrant(id) => write!(f, "Transaction {id} is not a grant"),
            Self::AlreadyCancelled(id) => {
                write!(f, "Transaction {id} has already been cancelled")
            }
            Self::DuplicateOccurrence {
                member_id,
                occurrence,
            } => {
                write!(
                    f,
                    "Member {member_id} already holds a {} grant for period {}",
                    occurrence.kind, occurrence.period_index
                )
            }
            Self::InsufficientBalance {
                member_id,
                requested,
                available,
            } => {
                write!(
                    f,
                    "Member {member_id} has {available} days available, {requested} requested"
                )
            }
            Self::NoActivePolicy => write!(f, "No active leave policy is configured"),
            Self::MemberNotFound(id) => write!(f, "Member {id} not found"),
            Self::Store(msg) => write!(f, "Store error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<DomainError> for LedgerError {
    fn from(err: DomainError) -> Self {
        Self::DomainViolation(err)
    }
}
