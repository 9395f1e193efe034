// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::error::DomainError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use time::{Date, OffsetDateTime};

/// Canonical numeric identifier for a member.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MemberId(i64);

impl MemberId {
    /// Creates a new `MemberId`.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the numeric identifier.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical numeric identifier for a ledger transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TransactionId(i64);

impl TransactionId {
    /// Creates a new `TransactionId`.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the numeric identifier.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Employment status of a member.
///
/// Only `Active` members are processed by the daily batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberStatus {
    /// Currently employed.
    Active,
    /// No longer employed.
    Terminated,
}

impl MemberStatus {
    /// Converts this status to its string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Terminated => "terminated",
        }
    }
}

impl FromStr for MemberStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "terminated" => Ok(Self::Terminated),
            _ => Err(DomainError::InvalidMemberStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A member of the organization, as consumed from the roster.
///
/// The roster is owned by an external collaborator; this engine only reads
/// the fields that anchor accrual: the join date and the employment status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The member's canonical identifier.
    pub member_id: MemberId,
    /// Display name.
    pub name: String,
    /// The date employment began. Anchors the first-year/annual phase
    /// boundary and every grant's expiry date.
    pub join_date: Date,
    /// Employment status.
    pub status: MemberStatus,
}

impl Member {
    /// Creates a new `Member`.
    #[must_use]
    pub const fn new(member_id: MemberId, name: String, join_date: Date, status: MemberStatus) -> Self {
        Self {
            member_id,
            name,
            join_date,
            status,
        }
    }
}

/// The entity performing a ledger write.
///
/// Recorded on every transaction for audit attribution: a user, the
/// scheduler, or the system itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The unique identifier for this actor.
    pub id: String,
    /// The type of actor (e.g., "user", "system", "scheduler").
    pub actor_type: String,
}

impl Actor {
    /// Creates a new `Actor`.
    #[must_use]
    pub const fn new(id: String, actor_type: String) -> Self {
        Self { id, actor_type }
    }

    /// The system actor, used for automated ledger maintenance.
    #[must_use]
    pub fn system() -> Self {
        Self::new(String::from("system"), String::from("system"))
    }

    /// The scheduler actor, used for daily batch writes.
    #[must_use]
    pub fn scheduler() -> Self {
        Self::new(String::from("scheduler"), String::from("scheduler"))
    }
}

/// The kind of transaction recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// A policy-driven grant of leave days.
    Grant,
    /// An admin-issued grant outside the policy schedule.
    ManualGrant,
    /// Consumption of leave days against a specific grant.
    Use,
    /// An explicit expiration entry.
    Expire,
    /// A balance adjustment.
    Adjust,
}

impl TransactionType {
    /// Converts this type to its string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::ManualGrant => "manual_grant",
            Self::Use => "use",
            Self::Expire => "expire",
            Self::Adjust => "adjust",
        }
    }

    /// Whether this type carries grant semantics (`grant_date`, `expire_date`,
    /// and the `is_expired` flag are only meaningful on grant-type rows).
    #[must_use]
    pub const fn is_grant(&self) -> bool {
        matches!(self, Self::Grant | Self::ManualGrant)
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grant" => Ok(Self::Grant),
            "manual_grant" => Ok(Self::ManualGrant),
            "use" => Ok(Self::Use),
            "expire" => Ok(Self::Expire),
            "adjust" => Ok(Self::Adjust),
            _ => Err(DomainError::InvalidTransactionType(s.to_string())),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a transaction.
///
/// Transitions are monotonic: `Active` → `Cancelled` only. Rows are never
/// deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// The row contributes to balance aggregation.
    Active,
    /// The row has been cancelled; it remains for audit and idempotency
    /// checks but no longer contributes to balances.
    Cancelled,
}

impl TransactionStatus {
    /// Converts this status to its string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(DomainError::InvalidTransactionStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The schedule a policy-driven grant belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantKind {
    /// One of the monthly grants issued during the first year of service.
    Monthly,
    /// An annual grant issued on a service anniversary.
    Annual,
}

impl GrantKind {
    /// Converts this kind to its string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Annual => "annual",
        }
    }
}

impl FromStr for GrantKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Self::Monthly),
            "annual" => Ok(Self::Annual),
            _ => Err(DomainError::InvalidGrantKind(s.to_string())),
        }
    }
}

impl std::fmt::Display for GrantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifies one specific occurrence of a scheduled grant.
///
/// The pair `(member_id, kind, period_index)` is unique across the ledger,
/// counting cancelled rows: a cancelled grant still consumed its slot. This
/// is the idempotency guard against double-granting: the same occurrence can
/// never be recorded twice, no matter how often the batch job re-runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantOccurrence {
    /// The grant schedule this occurrence belongs to.
    pub kind: GrantKind,
    /// 1-based index within the schedule: the service month for monthly
    /// grants, the service year for annual grants.
    pub period_index: u16,
}

impl GrantOccurrence {
    /// Creates a new `GrantOccurrence`.
    #[must_use]
    pub const fn new(kind: GrantKind, period_index: u16) -> Self {
        Self { kind, period_index }
    }

    /// A monthly occurrence for the given service month.
    #[must_use]
    pub const fn monthly(service_month: u16) -> Self {
        Self::new(GrantKind::Monthly, service_month)
    }

    /// An annual occurrence for the given service year.
    #[must_use]
    pub const fn annual(service_year: u16) -> Self {
        Self::new(GrantKind::Annual, service_year)
    }
}

/// A single row in the leave ledger.
///
/// Rows are immutable once written except for the monotonic status and
/// expiry flags. `Use` rows carry a negative amount and a `reference_id`
/// linking them to the grant they draw from; grant-type rows carry dates,
/// an optional scheduled occurrence, and the `is_expired` flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveTransaction {
    /// Canonical identifier assigned by the store.
    pub transaction_id: TransactionId,
    /// The member this row belongs to.
    pub member_id: MemberId,
    /// What kind of ledger entry this is.
    pub transaction_type: TransactionType,
    /// Signed day count. `Use` rows are negative; fractional days allowed.
    pub amount: Decimal,
    /// Set only on grant-type rows.
    pub grant_date: Option<Date>,
    /// Set only on grant-type rows.
    pub expire_date: Option<Date>,
    /// For `Use` rows, the grant transaction consumed from. Weak reference:
    /// many `Use` rows may point at one grant.
    pub reference_id: Option<TransactionId>,
    /// Idempotency key for scheduled grants. `None` on manual grants, split
    /// remnants, and non-grant rows.
    pub occurrence: Option<GrantOccurrence>,
    /// Cancellation key for `Use` rows, derived from the leave request.
    pub request_key: Option<String>,
    /// Lifecycle status.
    pub status: TransactionStatus,
    /// Set only on grant-type rows, independent of `status`. Set-only.
    pub is_expired: bool,
    /// Free-text audit string. Not load-bearing.
    pub reason: String,
    /// Identifier of the actor that wrote this row.
    pub created_by: String,
    /// When this row was written.
    pub created_at: OffsetDateTime,
    /// Identifier of the actor that cancelled this row, if any.
    pub cancelled_by: Option<String>,
    /// When this row was cancelled, if ever.
    pub cancelled_at: Option<OffsetDateTime>,
    /// Identifier of the actor that expired this row, if any.
    pub expired_by: Option<String>,
    /// When this row was expired, if ever.
    pub expired_at: Option<OffsetDateTime>,
}

impl LeaveTransaction {
    /// Whether this row is a grant-type row.
    #[must_use]
    pub const fn is_grant(&self) -> bool {
        self.transaction_type.is_grant()
    }

    /// Whether this row is active (not cancelled).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, TransactionStatus::Active)
    }

    /// Whether this row is an active, non-expired grant, the only rows
    /// that contribute to the positive side of the balance.
    #[must_use]
    pub const fn is_consumable_grant(&self) -> bool {
        self.is_grant() && self.is_active() && !self.is_expired
    }
}

/// The active leave policy.
///
/// Exactly one policy row is active at a time; every calculation receives it
/// as an explicit argument. There is no ambient policy state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeavePolicy {
    /// Annual days granted in service years 1–2.
    pub base_annual_days: u16,
    /// Number of service years per seniority increment.
    pub increment_years: u16,
    /// Days added per seniority increment.
    pub increment_days: u16,
    /// Upper bound on the annual grant.
    pub max_annual_days: u16,
    /// Days granted per monthly occurrence during the first year.
    pub first_year_monthly_grant: Decimal,
    /// Cap on total monthly-granted days during the first year.
    pub first_year_max_days: u16,
}

impl LeavePolicy {
    /// Validates the policy's field combination.
    ///
    /// # Errors
    ///
    /// Returns an error if `increment_years` is zero, the monthly grant is
    /// not positive, or the annual cap is below the base.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.increment_years == 0 {
            return Err(DomainError::InvalidPolicy {
                reason: String::from("increment_years must be at least 1"),
            });
        }
        if self.first_year_monthly_grant <= Decimal::ZERO {
            return Err(DomainError::InvalidPolicy {
                reason: String::from("first_year_monthly_grant must be positive"),
            });
        }
        if self.max_annual_days < self.base_annual_days {
            return Err(DomainError::InvalidPolicy {
                reason: String::from("max_annual_days must not be below base_annual_days"),
            });
        }
        Ok(())
    }
}

/// The derived balance cache for one member.
///
/// Always recomputed wholesale from the transaction ledger, never patched
/// incrementally, never the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveBalance {
    /// The member this balance belongs to.
    pub member_id: MemberId,
    /// Sum of active, non-expired grant amounts.
    pub total_granted: Decimal,
    /// Sum of active use amounts, absolute.
    pub total_used: Decimal,
    /// Sum of active, expired grant amounts. Reporting only; excluded from
    /// `current_balance`.
    pub total_expired: Decimal,
    /// `total_granted` − `total_used` + active adjustments.
    pub current_balance: Decimal,
    /// When this balance was recomputed.
    pub last_updated: OffsetDateTime,
}

/// A leave request as handed over by the approval workflow.
///
/// `total_days` is pre-computed by the caller from the work schedule: days
/// off are excluded and partial-day leave types contribute fractional days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// The member taking leave.
    pub member_id: MemberId,
    /// The leave type configured in the workflow (e.g., "annual", "half_day_am").
    pub leave_type: String,
    /// First day of the leave range.
    pub start_date: Date,
    /// Last day of the leave range.
    pub end_date: Date,
    /// Days to deduct, fractional allowed.
    pub total_days: Decimal,
}

impl RequestContext {
    /// Creates a new `RequestContext`.
    #[must_use]
    pub const fn new(
        member_id: MemberId,
        leave_type: String,
        start_date: Date,
        end_date: Date,
        total_days: Decimal,
    ) -> Self {
        Self {
            member_id,
            leave_type,
            start_date,
            end_date,
            total_days,
        }
    }

    /// Deterministic cancellation key for this request.
    ///
    /// Every `Use` row written for this request carries this key; cancelling
    /// the request cancels exactly the rows that match it. This replaces
    /// free-text reason matching as the cancellation mechanism.
    #[must_use]
    pub fn request_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.member_id, self.leave_type, self.start_date, self.end_date
        )
    }
}
