// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use leave_ledger::LedgerError;
use leave_ledger_domain::DomainError;
use thiserror::Error;

/// Errors surfaced at the engine facade.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A ledger operation failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    /// A domain calculation failed.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
}

impl EngineError {
    /// Whether this error is an insufficient-balance rejection, the one
    /// failure the approval workflow surfaces to the requesting user.
    #[must_use]
    pub const fn is_insufficient_balance(&self) -> bool {
        matches!(
            self,
            Self::Ledger(LedgerError::InsufficientBalance { .. })
        )
    }
}
