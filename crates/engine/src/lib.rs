// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Engine facade for the Leave Ledger.
//!
//! Collaborators (the approval workflow, admin tooling, and the daily
//! scheduler) talk to the engine through [`LeaveEngine`]. The facade wires
//! a ledger store together with the externally-owned roster and policy
//! providers, refreshes the balance cache after every interactive write,
//! and exposes the batch runner.

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

mod batch;
mod error;

#[cfg(test)]
mod tests;

pub use batch::{BatchConfig, BatchError, BatchProgress, BatchSummary, run_daily_update};
pub use error::EngineError;

use leave_ledger::{
    LedgerStore, MemberRoster, NewTransaction, PolicyProvider, allocate_usage, cancel_usage,
    compute_member_balance,
};
use leave_ledger_domain::{
    Actor, LeaveBalance, MemberId, RequestContext, TransactionId,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use time::Date;
use tracing::info;

/// The engine facade handed to collaborators.
pub struct LeaveEngine<S, R, P> {
    store: Arc<S>,
    roster: Arc<R>,
    policies: Arc<P>,
    config: BatchConfig,
}

impl<S, R, P> LeaveEngine<S, R, P>
where
    S: LedgerStore + 'static,
    R: MemberRoster,
    P: PolicyProvider,
{
    /// Creates an engine over a store and the external providers.
    #[must_use]
    pub fn new(store: Arc<S>, roster: Arc<R>, policies: Arc<P>) -> Self {
        Self {
            store,
            roster,
            policies,
            config: BatchConfig::default(),
        }
    }

    /// Overrides the batch chunk size.
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    /// Recomputes a member's balance from the ledger and refreshes the
    /// cache row. The ledger, not the cache, is the source of truth.
    ///
    /// # Errors
    ///
    /// Returns an error if the member's rows cannot be fetched or the
    /// cache cannot be written.
    pub fn calculate_balance(&self, member_id: MemberId) -> Result<LeaveBalance, EngineError> {
        self.refresh_balance(member_id)
    }

    /// Allocates an approved leave request against the member's grants,
    /// earliest-expiring first.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` with zero side effects if the
    /// member's grants cannot cover the request.
    pub fn allocate_usage(
        &self,
        request: &RequestContext,
        actor: &Actor,
    ) -> Result<(), EngineError> {
        let written = allocate_usage(self.store.as_ref(), request, actor)?;
        info!(
            member_id = request.member_id.value(),
            days = %request.total_days,
            rows = written.len(),
            "Allocated leave usage"
        );
        self.refresh_balance(request.member_id)?;
        Ok(())
    }

    /// Cancels a previously allocated request, restoring the consumed
    /// amounts to their grants. Returns the number of usage rows cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch or a cancellation fails.
    pub fn cancel_usage(
        &self,
        request: &RequestContext,
        actor: &Actor,
    ) -> Result<usize, EngineError> {
        let cancelled: usize = cancel_usage(self.store.as_ref(), request, actor)?;
        info!(
            member_id = request.member_id.value(),
            cancelled, "Cancelled leave usage"
        );
        self.refresh_balance(request.member_id)?;
        Ok(cancelled)
    }

    /// Records an admin-issued grant outside the policy schedule.
    ///
    /// # Errors
    ///
    /// Returns an error if validation or the write fails.
    pub fn grant_manual(
        &self,
        member_id: MemberId,
        days: Decimal,
        grant_date: Date,
        expire_date: Option<Date>,
        reason: String,
        actor: &Actor,
    ) -> Result<TransactionId, EngineError> {
        let row = self.store.append(NewTransaction::manual_grant(
            member_id, days, grant_date, expire_date, reason, actor,
        ))?;
        info!(
            member_id = member_id.value(),
            transaction_id = row.transaction_id.value(),
            days = %days,
            "Recorded manual grant"
        );
        self.refresh_balance(member_id)?;
        Ok(row.transaction_id)
    }

    /// Records a signed balance adjustment.
    ///
    /// # Errors
    ///
    /// Returns an error if validation or the write fails.
    pub fn adjust_balance(
        &self,
        member_id: MemberId,
        days: Decimal,
        reason: String,
        actor: &Actor,
    ) -> Result<TransactionId, EngineError> {
        let row = self
            .store
            .append(NewTransaction::adjustment(member_id, days, reason, actor))?;
        info!(
            member_id = member_id.value(),
            transaction_id = row.transaction_id.value(),
            days = %days,
            "Recorded balance adjustment"
        );
        self.refresh_balance(member_id)?;
        Ok(row.transaction_id)
    }

    /// Runs the daily re-synchronization across every active member.
    ///
    /// # Errors
    ///
    /// Fails fast with `NoActivePolicy`; per-member failures are collected
    /// into the summary instead.
    pub async fn run_daily_update(
        &self,
        target_date: Date,
        progress: Option<&(dyn Fn(BatchProgress) + Send + Sync)>,
    ) -> Result<BatchSummary, EngineError> {
        run_daily_update(
            &self.store,
            self.roster.as_ref(),
            self.policies.as_ref(),
            target_date,
            self.config,
            progress,
        )
        .await
    }

    fn refresh_balance(&self, member_id: MemberId) -> Result<LeaveBalance, EngineError> {
        let balance: LeaveBalance = compute_member_balance(self.store.as_ref(), member_id)?;
        self.store.persist_balances(std::slice::from_ref(&balance))?;
        Ok(balance)
    }
}
