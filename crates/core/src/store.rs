// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The ledger store abstraction.
//!
//! The store is an append-style transaction log: rows are inserted once and
//! only their monotonic flags ever change (`Active` → `Cancelled`,
//! `is_expired` set-only). `append` returns the stored row, including the
//! identifier the store assigned, so callers never rediscover rows by
//! content matching.

use crate::error::LedgerError;
use leave_ledger_domain::{
    Actor, GrantOccurrence, LeaveBalance, LeavePolicy, LeaveTransaction, Member, MemberId,
    PlannedGrant, RequestContext, TransactionId, TransactionType, compute_balance,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use time::{Date, OffsetDateTime};

/// A transaction to be appended to the ledger.
///
/// The store assigns the identifier, the `Active` status, and the creation
/// timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// The member the row belongs to.
    pub member_id: MemberId,
    /// What kind of ledger entry this is.
    pub transaction_type: TransactionType,
    /// Signed day count; `Use` rows negative.
    pub amount: Decimal,
    /// Grant-type rows only.
    pub grant_date: Option<Date>,
    /// Grant-type rows only.
    pub expire_date: Option<Date>,
    /// `Use` rows only: the grant consumed from.
    pub reference_id: Option<TransactionId>,
    /// Scheduled grants only: the idempotency slot.
    pub occurrence: Option<GrantOccurrence>,
    /// `Use` rows only: the cancellation key.
    pub request_key: Option<String>,
    /// Audit description.
    pub reason: String,
    /// The actor writing the row.
    pub created_by: Actor,
}

impl NewTransaction {
    /// A scheduled (policy-driven) grant produced by the accrual assessment.
    #[must_use]
    pub fn scheduled_grant(member_id: MemberId, planned: &PlannedGrant, actor: &Actor) -> Self {
        Self {
            member_id,
            transaction_type: TransactionType::Grant,
            amount: planned.amount,
            grant_date: Some(planned.grant_date),
            expire_date: Some(planned.expire_date),
            reference_id: None,
            occurrence: Some(planned.occurrence),
            request_key: None,
            reason: planned.reason.clone(),
            created_by: actor.clone(),
        }
    }

    /// An admin-issued grant outside the policy schedule.
    #[must_use]
    pub fn manual_grant(
        member_id: MemberId,
        amount: Decimal,
        grant_date: Date,
        expire_date: Option<Date>,
        reason: String,
        actor: &Actor,
    ) -> Self {
        Self {
            member_id,
            transaction_type: TransactionType::ManualGrant,
            amount,
            grant_date: Some(grant_date),
            expire_date,
            reference_id: None,
            occurrence: None,
            request_key: None,
            reason,
            created_by: actor.clone(),
        }
    }

    /// A consumption row drawing `consumed` days from one grant.
    #[must_use]
    pub fn usage(
        request: &RequestContext,
        consumed: Decimal,
        grant_id: TransactionId,
        actor: &Actor,
    ) -> Self {
        Self {
            member_id: request.member_id,
            transaction_type: TransactionType::Use,
            amount: -consumed,
            grant_date: None,
            expire_date: None,
            reference_id: Some(grant_id),
            occurrence: None,
            request_key: Some(request.request_key()),
            reason: format!(
                "leave from {} to {} ({})",
                request.start_date, request.end_date, request.leave_type
            ),
            created_by: actor.clone(),
        }
    }

    /// A signed balance adjustment.
    #[must_use]
    pub fn adjustment(member_id: MemberId, amount: Decimal, reason: String, actor: &Actor) -> Self {
        Self {
            member_id,
            transaction_type: TransactionType::Adjust,
            amount,
            grant_date: None,
            expire_date: None,
            reference_id: None,
            occurrence: None,
            request_key: None,
            reason,
            created_by: actor.clone(),
        }
    }

    /// A split remnant carrying part of an existing grant's amount. Keeps
    /// the original's type and dates; never claims an occurrence slot.
    #[must_use]
    pub fn split_grant(
        original: &LeaveTransaction,
        amount: Decimal,
        reason: String,
        actor: &Actor,
    ) -> Self {
        Self {
            member_id: original.member_id,
            transaction_type: original.transaction_type,
            amount,
            grant_date: original.grant_date,
            expire_date: original.expire_date,
            reference_id: None,
            occurrence: None,
            request_key: None,
            reason,
            created_by: actor.clone(),
        }
    }

    /// Validates field combinations before the row is stored.
    ///
    /// # Errors
    ///
    /// Returns a domain violation if amounts or linked fields do not match
    /// the transaction type.
    pub fn validate(&self) -> Result<(), LedgerError> {
        use leave_ledger_domain::DomainError;

        match self.transaction_type {
            TransactionType::Grant | TransactionType::ManualGrant => {
                if self.amount <= Decimal::ZERO {
                    return Err(DomainError::InvalidAmount {
                        reason: String::from("grant amount must be positive"),
                    }
                    .into());
                }
                if self.grant_date.is_none() {
                    return Err(DomainError::InvalidAmount {
                        reason: String::from("grant rows require a grant date"),
                    }
                    .into());
                }
            }
            TransactionType::Use => {
                if self.amount >= Decimal::ZERO {
                    return Err(DomainError::InvalidAmount {
                        reason: String::from("use amount must be negative"),
                    }
                    .into());
                }
                if self.reference_id.is_none() {
                    return Err(DomainError::InvalidAmount {
                        reason: String::from("use rows require a grant reference"),
                    }
                    .into());
                }
            }
            TransactionType::Expire | TransactionType::Adjust => {
                if self.amount == Decimal::ZERO {
                    return Err(DomainError::InvalidAmount {
                        reason: String::from("amount must be non-zero"),
                    }
                    .into());
                }
            }
        }
        if self.occurrence.is_some() && !self.transaction_type.is_grant() {
            return Err(DomainError::InvalidAmount {
                reason: String::from("only grant rows may carry an occurrence"),
            }
            .into());
        }
        Ok(())
    }
}

/// Append-style transaction log plus the derived balance cache.
///
/// Implementations are `Send + Sync` with interior mutability: the batch
/// runner calls them from parallel per-member tasks.
pub trait LedgerStore: Send + Sync {
    /// Appends a transaction. The row is stored `Active`; the assigned
    /// identifier is returned in the stored row. Enforces occurrence
    /// uniqueness per member across active and cancelled rows.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateOccurrence` if the occurrence slot is taken, or a
    /// validation/store error.
    fn append(&self, new: NewTransaction) -> Result<LeaveTransaction, LedgerError>;

    /// Cancels a transaction (status → `Cancelled`), recording the actor.
    /// Never deletes.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound` or `AlreadyCancelled`.
    fn cancel(&self, id: TransactionId, actor: &Actor) -> Result<(), LedgerError>;

    /// Marks a grant-type transaction expired, recording the actor.
    /// Idempotent: marking an already-expired grant is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound` or `NotAGrant`.
    fn mark_expired(&self, id: TransactionId, actor: &Actor) -> Result<(), LedgerError>;

    /// Retargets every active `Use` row referencing `from` to reference
    /// `to` instead. Used only by the expiration split. Returns the number
    /// of rows repointed.
    ///
    /// # Errors
    ///
    /// Returns a store error if the update fails.
    fn repoint_uses(&self, from: TransactionId, to: TransactionId) -> Result<usize, LedgerError>;

    /// All `Active`-status rows for a member (expired grants included).
    ///
    /// # Errors
    ///
    /// Returns a store error if the fetch fails.
    fn active_transactions_for(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<LeaveTransaction>, LedgerError>;

    /// Every row for a member, cancelled included. Used for idempotency and
    /// backfill checks.
    ///
    /// # Errors
    ///
    /// Returns a store error if the fetch fails.
    fn all_transactions_for(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<LeaveTransaction>, LedgerError>;

    /// Every row for a set of members in one batched fetch, grouped by
    /// member. Members with no rows map to empty vectors.
    ///
    /// # Errors
    ///
    /// Returns a store error if the fetch fails.
    fn transactions_for_members(
        &self,
        member_ids: &[MemberId],
    ) -> Result<HashMap<MemberId, Vec<LeaveTransaction>>, LedgerError>;

    /// The cached balance for a member, if one has been persisted.
    ///
    /// # Errors
    ///
    /// Returns a store error if the fetch fails.
    fn balance_for(&self, member_id: MemberId) -> Result<Option<LeaveBalance>, LedgerError>;

    /// Overwrites the balance cache for every given member in one batch
    /// upsert. Balances are replaced wholesale, never patched.
    ///
    /// # Errors
    ///
    /// Returns a store error if the upsert fails.
    fn persist_balances(&self, balances: &[LeaveBalance]) -> Result<(), LedgerError>;
}

/// Read-only view of the member roster, owned by an external collaborator.
pub trait MemberRoster: Send + Sync {
    /// Members with `Active` employment status.
    ///
    /// # Errors
    ///
    /// Returns a store error if the fetch fails.
    fn active_members(&self) -> Result<Vec<Member>, LedgerError>;

    /// Looks up a single member.
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` if the member does not exist.
    fn member(&self, member_id: MemberId) -> Result<Member, LedgerError>;
}

/// Read-only view of the leave policy configuration.
pub trait PolicyProvider: Send + Sync {
    /// The single active policy.
    ///
    /// # Errors
    ///
    /// Returns `NoActivePolicy` if none is configured, fatal for any
    /// calculation.
    fn active_policy(&self) -> Result<LeavePolicy, LedgerError>;
}

/// Recomputes a member's balance from the store's current active rows.
///
/// # Errors
///
/// Returns a store error if the fetch fails.
pub fn compute_member_balance<S: LedgerStore + ?Sized>(
    store: &S,
    member_id: MemberId,
) -> Result<LeaveBalance, LedgerError> {
    let rows: Vec<LeaveTransaction> = store.active_transactions_for(member_id)?;
    Ok(compute_balance(
        member_id,
        &rows,
        OffsetDateTime::now_utc(),
    ))
}
