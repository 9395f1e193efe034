// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

/// Errors that can occur during domain calculations and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A member's join date is missing or unusable.
    InvalidJoinDate {
        /// Description of the validation error.
        reason: String,
    },
    /// Failed to parse a date from a string.
    DateParseError {
        /// The invalid date string.
        date_string: String,
        /// The parsing error message.
        error: String,
    },
    /// Date arithmetic overflow.
    DateArithmeticOverflow {
        /// Description of the operation that failed.
        operation: String,
    },
    /// The leave policy contains an invalid field combination.
    InvalidPolicy {
        /// Description of the validation error.
        reason: String,
    },
    /// A day amount is invalid for the requested operation.
    InvalidAmount {
        /// Description of the validation error.
        reason: String,
    },
    /// Transaction type string is not recognized.
    InvalidTransactionType(String),
    /// Transaction status string is not recognized.
    InvalidTransactionStatus(String),
    /// Grant kind string is not recognized.
    InvalidGrantKind(String),
    /// Member status string is not recognized.
    InvalidMemberStatus(String),
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJoinDate { reason } => write!(f, "Invalid join date: {reason}"),
            Self::DateParseError { date_string, error } => {
                write!(f, "Failed to parse date '{date_string}': {error}")
            }
            Self::DateArithmeticOverflow { operation } => {
                write!(f, "Date arithmetic overflow while {operation}")
            }
            Self::InvalidPolicy { reason } => write!(f, "Invalid leave policy: {reason}"),
            Self::InvalidAmount { reason } => write!(f, "Invalid amount: {reason}"),
            Self::InvalidTransactionType(value) => {
                write!(f, "Invalid transaction type: '{value}'")
            }
            Self::InvalidTransactionStatus(value) => {
                write!(f, "Invalid transaction status: '{value}'")
            }
            Self::InvalidGrantKind(value) => write!(f, "Invalid grant kind: '{value}'"),
            Self::InvalidMemberStatus(value) => write!(f, "Invalid member status: '{value}'"),
        }
    }
}

impl std::error::Error for DomainError {}
