// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

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

mod allocator;
mod error;
mod expiration;
mod memory;
mod store;

pub use allocator::{Allocation, allocate_usage, cancel_usage, plan_allocation};
pub use error::LedgerError;
pub use expiration::{ExpirationOutcome, process_expirations};
pub use memory::MemoryLedger;
pub use store::{
    LedgerStore, MemberRoster, NewTransaction, PolicyProvider, compute_member_balance,
};
