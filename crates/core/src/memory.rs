// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! In-memory ledger store.
//!
//! Backs unit tests and embedded use. The same rows, flags, and occurrence
//! uniqueness rules as the database-backed store, held under a single
//! read/write lock.

use crate::error::LedgerError;
use crate::store::{LedgerStore, MemberRoster, NewTransaction, PolicyProvider};
use leave_ledger_domain::{
    Actor, LeaveBalance, LeavePolicy, LeaveTransaction, Member, MemberId, MemberStatus,
    TransactionId, TransactionStatus, TransactionType,
};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use time::OffsetDateTime;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    transactions: Vec<LeaveTransaction>,
    balances: HashMap<MemberId, LeaveBalance>,
    members: Vec<Member>,
    policy: Option<LeavePolicy>,
}

/// An in-memory implementation of the store and provider traits.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: RwLock<Inner>,
}

impl MemoryLedger {
    /// Creates an empty in-memory ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, LedgerError> {
        self.inner
            .read()
            .map_err(|_| LedgerError::Store(String::from("ledger lock poisoned")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, LedgerError> {
        self.inner
            .write()
            .map_err(|_| LedgerError::Store(String::from("ledger lock poisoned")))
    }

    /// Adds or replaces a roster member.
    ///
    /// # Errors
    ///
    /// Returns a store error if the lock is poisoned.
    pub fn upsert_member(&self, member: Member) -> Result<(), LedgerError> {
        let mut inner: RwLockWriteGuard<'_, Inner> = self.write()?;
        inner.members.retain(|m| m.member_id != member.member_id);
        inner.members.push(member);
        Ok(())
    }

    /// Sets the active policy.
    ///
    /// # Errors
    ///
    /// Returns a store error if the lock is poisoned.
    pub fn set_policy(&self, policy: LeavePolicy) -> Result<(), LedgerError> {
        let mut inner: RwLockWriteGuard<'_, Inner> = self.write()?;
        inner.policy = Some(policy);
        Ok(())
    }

    /// Fetches a single transaction by id, if present.
    ///
    /// # Errors
    ///
    /// Returns a store error if the lock is poisoned.
    pub fn transaction(&self, id: TransactionId) -> Result<Option<LeaveTransaction>, LedgerError> {
        let inner: RwLockReadGuard<'_, Inner> = self.read()?;
        Ok(inner
            .transactions
            .iter()
            .find(|tx| tx.transaction_id == id)
            .cloned())
    }
}

impl LedgerStore for MemoryLedger {
    fn append(&self, new: NewTransaction) -> Result<LeaveTransaction, LedgerError> {
        new.validate()?;
        let mut inner: RwLockWriteGuard<'_, Inner> = self.write()?;

        if let Some(occurrence) = new.occurrence {
            let taken: bool = inner
                .transactions
                .iter()
                .any(|tx| tx.member_id == new.member_id && tx.occurrence == Some(occurrence));
            if taken {
                return Err(LedgerError::DuplicateOccurrence {
                    member_id: new.member_id,
                    occurrence,
                });
            }
        }

        inner.next_id += 1;
        let row: LeaveTransaction = LeaveTransaction {
            transaction_id: TransactionId::new(inner.next_id),
            member_id: new.member_id,
            transaction_type: new.transaction_type,
            amount: new.amount,
            grant_date: new.grant_date,
            expire_date: new.expire_date,
            reference_id: new.reference_id,
            occurrence: new.occurrence,
            request_key: new.request_key,
            status: TransactionStatus::Active,
            is_expired: false,
            reason: new.reason,
            created_by: new.created_by.id,
            created_at: OffsetDateTime::now_utc(),
            cancelled_by: None,
            cancelled_at: None,
            expired_by: None,
            expired_at: None,
        };
        inner.transactions.push(row.clone());
        Ok(row)
    }

    fn cancel(&self, id: TransactionId, actor: &Actor) -> Result<(), LedgerError> {
        let mut inner: RwLockWriteGuard<'_, Inner> = self.write()?;
        let row: &mut LeaveTransaction = inner
            .transactions
            .iter_mut()
            .find(|tx| tx.transaction_id == id)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        if row.status == TransactionStatus::Cancelled {
            return Err(LedgerError::AlreadyCancelled(id));
        }
        row.status = TransactionStatus::Cancelled;
        row.cancelled_by = Some(actor.id.clone());
        row.cancelled_at = Some(OffsetDateTime::now_utc());
        Ok(())
    }

    fn mark_expired(&self, id: TransactionId, actor: &Actor) -> Result<(), LedgerError> {
        let mut inner: RwLockWriteGuard<'_, Inner> = self.write()?;
        let row: &mut LeaveTransaction = inner
            .transactions
            .iter_mut()
            .find(|tx| tx.transaction_id == id)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        if !row.is_grant() {
            return Err(LedgerError::NotAGrant(id));
        }
        if row.is_expired {
            return Ok(());
        }
        row.is_expired = true;
        row.expired_by = Some(actor.id.clone());
        row.expired_at = Some(OffsetDateTime::now_utc());
        Ok(())
    }

    fn repoint_uses(&self, from: TransactionId, to: TransactionId) -> Result<usize, LedgerError> {
        let mut inner: RwLockWriteGuard<'_, Inner> = self.write()?;
        let mut repointed: usize = 0;
        for tx in &mut inner.transactions {
            if tx.transaction_type == TransactionType::Use
                && tx.is_active()
                && tx.reference_id == Some(from)
            {
                tx.reference_id = Some(to);
                repointed += 1;
            }
        }
        Ok(repointed)
    }

    fn active_transactions_for(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<LeaveTransaction>, LedgerError> {
        let inner: RwLockReadGuard<'_, Inner> = self.read()?;
        Ok(inner
            .transactions
            .iter()
            .filter(|tx| tx.member_id == member_id && tx.is_active())
            .cloned()
            .collect())
    }

    fn all_transactions_for(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<LeaveTransaction>, LedgerError> {
        let inner: RwLockReadGuard<'_, Inner> = self.read()?;
        Ok(inner
            .transactions
            .iter()
            .filter(|tx| tx.member_id == member_id)
            .cloned()
            .collect())
    }

    fn transactions_for_members(
        &self,
        member_ids: &[MemberId],
    ) -> Result<HashMap<MemberId, Vec<LeaveTransaction>>, LedgerError> {
        let inner: RwLockReadGuard<'_, Inner> = self.read()?;
        let mut grouped: HashMap<MemberId, Vec<LeaveTransaction>> = member_ids
            .iter()
            .map(|id| (*id, Vec::new()))
            .collect();
        for tx in &inner.transactions {
            if let Some(rows) = grouped.get_mut(&tx.member_id) {
                rows.push(tx.clone());
            }
        }
        Ok(grouped)
    }

    fn balance_for(&self, member_id: MemberId) -> Result<Option<LeaveBalance>, LedgerError> {
        let inner: RwLockReadGuard<'_, Inner> = self.read()?;
        Ok(inner.balances.get(&member_id).cloned())
    }

    fn persist_balances(&self, balances: &[LeaveBalance]) -> Result<(), LedgerError> {
        let mut inner: RwLockWriteGuard<'_, Inner> = self.write()?;
        for balance in balances {
            inner.balances.insert(balance.member_id, balance.clone());
        }
        Ok(())
    }
}

impl MemberRoster for MemoryLedger {
    fn active_members(&self) -> Result<Vec<Member>, LedgerError> {
        let inner: RwLockReadGuard<'_, Inner> = self.read()?;
        Ok(inner
            .members
            .iter()
            .filter(|m| m.status == MemberStatus::Active)
            .cloned()
            .collect())
    }

    fn member(&self, member_id: MemberId) -> Result<Member, LedgerError> {
        let inner: RwLockReadGuard<'_, Inner> = self.read()?;
        inner
            .members
            .iter()
            .find(|m| m.member_id == member_id)
            .cloned()
            .ok_or(LedgerError::MemberNotFound(member_id))
    }
}

impl PolicyProvider for MemoryLedger {
    fn active_policy(&self) -> Result<LeavePolicy, LedgerError> {
        let inner: RwLockReadGuard<'_, Inner> = self.read()?;
        inner.policy.clone().ok_or(LedgerError::NoActivePolicy)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use leave_ledger_domain::GrantOccurrence;
    use rust_decimal_macros::dec;
    use time::macros::date;

    fn grant_row(member: i64, occurrence: Option<GrantOccurrence>) -> NewTransaction {
        NewTransaction {
            member_id: MemberId::new(member),
            transaction_type: TransactionType::Grant,
            amount: dec!(1),
            grant_date: Some(date!(2024 - 04 - 01)),
            expire_date: Some(date!(2025 - 03 - 01)),
            reference_id: None,
            occurrence,
            request_key: None,
            reason: String::from("monthly grant for service month 1"),
            created_by: Actor::scheduler(),
        }
    }

    #[test]
    fn test_append_assigns_sequential_ids() {
        let ledger: MemoryLedger = MemoryLedger::new();

        let first: LeaveTransaction = ledger
            .append(grant_row(1, Some(GrantOccurrence::monthly(1))))
            .unwrap();
        let second: LeaveTransaction = ledger
            .append(grant_row(1, Some(GrantOccurrence::monthly(2))))
            .unwrap();

        assert_eq!(first.transaction_id, TransactionId::new(1));
        assert_eq!(second.transaction_id, TransactionId::new(2));
        assert_eq!(first.status, TransactionStatus::Active);
    }

    #[test]
    fn test_duplicate_occurrence_rejected() {
        let ledger: MemoryLedger = MemoryLedger::new();
        ledger
            .append(grant_row(1, Some(GrantOccurrence::monthly(1))))
            .unwrap();

        let result: Result<LeaveTransaction, LedgerError> =
            ledger.append(grant_row(1, Some(GrantOccurrence::monthly(1))));

        assert!(matches!(
            result.unwrap_err(),
            LedgerError::DuplicateOccurrence { .. }
        ));
    }

    #[test]
    fn test_duplicate_occurrence_spans_cancelled_rows() {
        let ledger: MemoryLedger = MemoryLedger::new();
        let row: LeaveTransaction = ledger
            .append(grant_row(1, Some(GrantOccurrence::monthly(1))))
            .unwrap();
        ledger.cancel(row.transaction_id, &Actor::system()).unwrap();

        let result: Result<LeaveTransaction, LedgerError> =
            ledger.append(grant_row(1, Some(GrantOccurrence::monthly(1))));

        assert!(matches!(
            result.unwrap_err(),
            LedgerError::DuplicateOccurrence { .. }
        ));
    }

    #[test]
    fn test_same_occurrence_allowed_for_other_member() {
        let ledger: MemoryLedger = MemoryLedger::new();
        ledger
            .append(grant_row(1, Some(GrantOccurrence::monthly(1))))
            .unwrap();

        assert!(
            ledger
                .append(grant_row(2, Some(GrantOccurrence::monthly(1))))
                .is_ok()
        );
    }

    #[test]
    fn test_cancel_is_monotonic() {
        let ledger: MemoryLedger = MemoryLedger::new();
        let row: LeaveTransaction = ledger.append(grant_row(1, None)).unwrap();

        ledger.cancel(row.transaction_id, &Actor::system()).unwrap();
        let again: Result<(), LedgerError> = ledger.cancel(row.transaction_id, &Actor::system());

        assert!(matches!(
            again.unwrap_err(),
            LedgerError::AlreadyCancelled(_)
        ));
        let stored: LeaveTransaction = ledger.transaction(row.transaction_id).unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Cancelled);
        assert_eq!(stored.cancelled_by.as_deref(), Some("system"));
    }

    #[test]
    fn test_mark_expired_is_idempotent() {
        let ledger: MemoryLedger = MemoryLedger::new();
        let row: LeaveTransaction = ledger.append(grant_row(1, None)).unwrap();

        ledger
            .mark_expired(row.transaction_id, &Actor::scheduler())
            .unwrap();
        ledger
            .mark_expired(row.transaction_id, &Actor::scheduler())
            .unwrap();

        let stored: LeaveTransaction = ledger.transaction(row.transaction_id).unwrap().unwrap();
        assert!(stored.is_expired);
        assert_eq!(stored.expired_by.as_deref(), Some("scheduler"));
    }

    #[test]
    fn test_mark_expired_rejects_non_grants() {
        let ledger: MemoryLedger = MemoryLedger::new();
        let grant: LeaveTransaction = ledger.append(grant_row(1, None)).unwrap();
        let request: leave_ledger_domain::RequestContext = leave_ledger_domain::RequestContext::new(
            MemberId::new(1),
            String::from("annual"),
            date!(2024 - 05 - 01),
            date!(2024 - 05 - 01),
            dec!(1),
        );
        let usage: LeaveTransaction = ledger
            .append(NewTransaction::usage(
                &request,
                dec!(1),
                grant.transaction_id,
                &Actor::system(),
            ))
            .unwrap();

        let result: Result<(), LedgerError> =
            ledger.mark_expired(usage.transaction_id, &Actor::system());

        assert!(matches!(result.unwrap_err(), LedgerError::NotAGrant(_)));
    }

    #[test]
    fn test_batched_fetch_groups_by_member() {
        let ledger: MemoryLedger = MemoryLedger::new();
        ledger
            .append(grant_row(1, Some(GrantOccurrence::monthly(1))))
            .unwrap();
        ledger
            .append(grant_row(2, Some(GrantOccurrence::monthly(1))))
            .unwrap();

        let grouped: HashMap<MemberId, Vec<LeaveTransaction>> = ledger
            .transactions_for_members(&[MemberId::new(1), MemberId::new(2), MemberId::new(3)])
            .unwrap();

        assert_eq!(grouped[&MemberId::new(1)].len(), 1);
        assert_eq!(grouped[&MemberId::new(2)].len(), 1);
        assert!(grouped[&MemberId::new(3)].is_empty());
    }
}
