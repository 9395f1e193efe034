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
    clippy::all
)]
#![allow(clippy::multiple_crate_versions)]

use clap::Parser;
use leave_ledger_engine::{BatchProgress, BatchSummary, LeaveEngine};
use leave_ledger_persistence::Persistence;
use std::sync::Arc;
use time::format_description::well_known::Iso8601;
use time::{Date, OffsetDateTime};
use tracing::{info, warn};

/// Leave Ledger daily update - re-synchronizes every member's balance.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the `SQLite` database file. If not provided, uses an
    /// in-memory database (useful only for smoke tests).
    #[arg(short, long)]
    database: Option<String>,

    /// Target date for the run (ISO 8601). Defaults to today (UTC).
    #[arg(short, long)]
    target_date: Option<String>,

    /// Members processed in parallel per chunk.
    #[arg(long, default_value_t = 10)]
    chunk_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let target_date: Date = match args.target_date {
        Some(raw) => Date::parse(&raw, &Iso8601::DEFAULT)?,
        None => OffsetDateTime::now_utc().date(),
    };

    let store: Arc<Persistence> = Arc::new(match args.database {
        Some(path) => Persistence::open(&path)?,
        None => Persistence::new_in_memory()?,
    });

    let engine: LeaveEngine<Persistence, Persistence, Persistence> = LeaveEngine::new(
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&store),
    )
    .with_chunk_size(args.chunk_size);

    let progress = |progress: BatchProgress| {
        info!(
            completed = progress.completed,
            total = progress.total,
            "Chunk finished"
        );
    };

    let summary: BatchSummary = engine.run_daily_update(target_date, Some(&progress)).await?;

    info!(
        processed = summary.processed,
        granted = summary.granted,
        expired = summary.expired,
        "Daily update complete"
    );
    for error in &summary.errors {
        warn!(member_id = error.member_id.value(), message = %error.message, "Member failed");
    }

    Ok(())
}
