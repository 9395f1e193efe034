// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The daily batch runner.
//!
//! One logical job: load every active member, the active policy, and all
//! transactions in one batched fetch; process member chunks sequentially
//! with the members inside a chunk running as parallel tasks; collect each
//! member's recomputed balance; persist every balance in one pass at the
//! end.
//!
//! Members never share mutable state, so intra-chunk parallelism is safe.
//! The one operation that must not race with itself, expiration splitting
//! for a single member, runs sequentially inside that member's task. A
//! member's failure lands in the error list and never aborts the run; the
//! whole job is idempotent (occurrence slots guard grants, expiration
//! re-derives remainders from the store), so a re-run recovers anything a
//! partial failure missed.

use crate::error::EngineError;
use futures::future::join_all;
use leave_ledger::{
    LedgerError, LedgerStore, MemberRoster, NewTransaction, PolicyProvider,
    compute_member_balance, process_expirations,
};
use leave_ledger_domain::{
    AccrualAssessment, Actor, LeaveBalance, LeavePolicy, LeaveTransaction, Member, MemberId,
    assess_accrual,
};
use std::collections::HashMap;
use std::sync::Arc;
use time::Date;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Tuning for the batch runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Members processed in parallel per chunk.
    pub chunk_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { chunk_size: 10 }
    }
}

/// Progress notification delivered after each completed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Members completed so far (including failures).
    pub completed: usize,
    /// Total members in this run.
    pub total: usize,
}

/// A per-member failure recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchError {
    /// The member whose processing failed.
    pub member_id: MemberId,
    /// Human-readable failure description.
    pub message: String,
}

/// Result of one daily update run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchSummary {
    /// Members processed successfully.
    pub processed: usize,
    /// Grant transactions written.
    pub granted: usize,
    /// Grants expired (in place or via split).
    pub expired: usize,
    /// Per-member failures. Operational, not user-facing.
    pub errors: Vec<BatchError>,
}

struct MemberOutcome {
    balance: LeaveBalance,
    granted: usize,
    expired: usize,
}

/// Runs the daily re-synchronization across every active member.
///
/// # Errors
///
/// Fails fast with `NoActivePolicy` before touching any member; store
/// failures on the initial batch fetch or the final balance persist also
/// abort the run. Per-member failures do not; they are collected into the
/// summary's error list.
pub async fn run_daily_update<S, R, P>(
    store: &Arc<S>,
    roster: &R,
    policies: &P,
    target_date: Date,
    config: BatchConfig,
    progress: Option<&(dyn Fn(BatchProgress) + Send + Sync)>,
) -> Result<BatchSummary, EngineError>
where
    S: LedgerStore + 'static,
    R: MemberRoster + ?Sized,
    P: PolicyProvider + ?Sized,
{
    let policy: LeavePolicy = policies.active_policy()?;
    policy.validate().map_err(LedgerError::from)?;

    let members: Vec<Member> = roster.active_members()?;
    let total: usize = members.len();
    info!(total, %target_date, "Starting daily leave update");

    let member_ids: Vec<MemberId> = members.iter().map(|m| m.member_id).collect();
    let mut history_by_member: HashMap<MemberId, Vec<LeaveTransaction>> =
        store.transactions_for_members(&member_ids)?;

    let chunk_size: usize = config.chunk_size.max(1);
    let mut summary: BatchSummary = BatchSummary::default();
    let mut balances: Vec<LeaveBalance> = Vec::with_capacity(total);
    let mut completed: usize = 0;

    for chunk in members.chunks(chunk_size) {
        let handles: Vec<JoinHandle<Result<MemberOutcome, LedgerError>>> = chunk
            .iter()
            .map(|member| {
                let store: Arc<S> = Arc::clone(store);
                let member: Member = member.clone();
                let policy: LeavePolicy = policy.clone();
                let history: Vec<LeaveTransaction> = history_by_member
                    .remove(&member.member_id)
                    .unwrap_or_default();
                tokio::spawn(async move {
                    process_member(store.as_ref(), &member, &policy, &history, target_date)
                })
            })
            .collect();

        for (member, joined) in chunk.iter().zip(join_all(handles).await) {
            completed += 1;
            match joined {
                Ok(Ok(outcome)) => {
                    summary.processed += 1;
                    summary.granted += outcome.granted;
                    summary.expired += outcome.expired;
                    balances.push(outcome.balance);
                }
                Ok(Err(err)) => {
                    warn!(member_id = member.member_id.value(), error = %err, "Member update failed");
                    summary.errors.push(BatchError {
                        member_id: member.member_id,
                        message: err.to_string(),
                    });
                }
                Err(err) => {
                    warn!(member_id = member.member_id.value(), error = %err, "Member task panicked");
                    summary.errors.push(BatchError {
                        member_id: member.member_id,
                        message: err.to_string(),
                    });
                }
            }
        }

        if let Some(callback) = progress {
            callback(BatchProgress { completed, total });
        }
    }

    store.persist_balances(&balances)?;
    info!(
        processed = summary.processed,
        granted = summary.granted,
        expired = summary.expired,
        errors = summary.errors.len(),
        "Daily leave update finished"
    );
    Ok(summary)
}

/// Processes one member: assess, append missing grants, resolve due
/// expirations sequentially, recompute the balance.
fn process_member<S: LedgerStore + ?Sized>(
    store: &S,
    member: &Member,
    policy: &LeavePolicy,
    history: &[LeaveTransaction],
    target_date: Date,
) -> Result<MemberOutcome, LedgerError> {
    let actor: Actor = Actor::scheduler();
    let assessment: AccrualAssessment =
        assess_accrual(member, policy, history, target_date)?;
    if !assessment.skipped_annual_backfills.is_empty() {
        warn!(
            member_id = member.member_id.value(),
            skipped = ?assessment.skipped_annual_backfills,
            "Older missed annual grants are not backfilled"
        );
    }

    let mut granted: usize = 0;
    for planned in &assessment.planned_grants {
        match store.append(NewTransaction::scheduled_grant(
            member.member_id,
            planned,
            &actor,
        )) {
            Ok(row) => {
                debug!(
                    member_id = member.member_id.value(),
                    transaction_id = row.transaction_id.value(),
                    reason = %planned.reason,
                    "Backfilled grant"
                );
                granted += 1;
            }
            // Another writer got there first; the slot being taken is the
            // outcome we wanted.
            Err(LedgerError::DuplicateOccurrence { .. }) => {
                debug!(
                    member_id = member.member_id.value(),
                    reason = %planned.reason,
                    "Grant already recorded"
                );
            }
            Err(err) => return Err(err),
        }
    }

    // A late run can create grants that are already past expiry (e.g. a
    // first-year backfill performed after the anniversary). Re-assess from
    // the store so the expiration pass sees them.
    let due = if granted > 0 {
        let refreshed: Vec<LeaveTransaction> = store.all_transactions_for(member.member_id)?;
        assess_accrual(member, policy, &refreshed, target_date)?.due_expirations
    } else {
        assessment.due_expirations
    };

    let expiration = process_expirations(store, member.member_id, &due, &actor)?;

    let balance: LeaveBalance = compute_member_balance(store, member.member_id)?;
    Ok(MemberOutcome {
        balance,
        granted,
        expired: expiration.expired_grants,
    })
}
