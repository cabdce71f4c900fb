//! Formation directory event consumer.
//!
//! # Responsibility
//! - Apply directory events from the external sync job into the local
//!   formation store.
//!
//! # Invariants
//! - Events are applied in input order; re-applying a batch is idempotent.
//! - The consumer never fails the whole batch on one bad event; it skips it
//!   and reports what was applied.

use crate::repo::formation_repo::{DirectoryRepoError, FormationDirectory};
use log::{info, warn};

/// One formation record change emitted by the external directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEvent {
    pub code: String,
    pub title: String,
    /// `false` retires the formation from gate lookups.
    pub is_active: bool,
    /// Epoch ms the change occurred at the source.
    pub occurred_at: i64,
}

/// Outcome of one batch application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub applied: usize,
    pub skipped: usize,
}

/// Applies a batch of directory events into the formation store.
///
/// Events with invalid codes are skipped and counted; storage transport
/// failures abort the batch.
pub fn apply_directory_events<F: FormationDirectory>(
    store: &F,
    events: &[DirectoryEvent],
) -> Result<SyncReport, DirectoryRepoError> {
    let mut applied = 0;
    let mut skipped = 0;

    for event in events {
        match store.upsert_formation(&event.code, &event.title, event.is_active, event.occurred_at)
        {
            Ok(_) => applied += 1,
            Err(DirectoryRepoError::Validation(err)) => {
                warn!(
                    "event=directory_sync module=sync status=skip code={} error={}",
                    event.code, err
                );
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    info!(
        "event=directory_sync module=sync status=ok applied={} skipped={}",
        applied, skipped
    );

    Ok(SyncReport { applied, skipped })
}
