//! # Idempotency Claim Store
//!
//! The `processed_payments` table is a two-phase lock: inserting the
//! provider session id IS the claim, and primary-key uniqueness arbitrates
//! concurrent webhook deliveries. A claim older than the stale threshold
//! is presumed abandoned by a crashed handler and reclaimed, which is safe
//! because the reservation transitions behind it are idempotent on status.

use crate::{time, Database, StoreError};
use chrono::{Duration, Utc};
use rusqlite::OptionalExtension;
use shared_types::ProcessedPayment;
use tracing::debug;

/// Outcome of a claim attempt.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// This caller owns the session id; proceed.
    Claimed,
    /// Another delivery already processed (or is processing) this session.
    AlreadyClaimed(ProcessedPayment),
}

/// Store over the `processed_payments` table.
#[derive(Clone)]
pub struct ClaimStore {
    db: Database,
    stale_threshold: Duration,
}

impl ClaimStore {
    /// Default threshold after which a dangling claim is reclaimable.
    pub const DEFAULT_STALE_THRESHOLD_SECS: i64 = 5 * 60;

    /// Create a store with the default stale threshold.
    pub fn new(db: Database) -> Self {
        Self::with_stale_threshold(db, Duration::seconds(Self::DEFAULT_STALE_THRESHOLD_SECS))
    }

    /// Create a store with an explicit stale threshold.
    pub fn with_stale_threshold(db: Database, stale_threshold: Duration) -> Self {
        Self {
            db,
            stale_threshold,
        }
    }

    /// Attempt to claim a session id.
    ///
    /// On conflict with a row older than the stale threshold, the row is
    /// deleted and the insert retried exactly once.
    ///
    /// # Errors
    ///
    /// Database failures other than the uniqueness conflict propagate.
    pub fn claim(&self, session_id: &str) -> Result<ClaimOutcome, StoreError> {
        match self.try_insert(session_id) {
            Ok(()) => return Ok(ClaimOutcome::Claimed),
            Err(e) if e.is_unique_violation() => {}
            Err(e) => return Err(e),
        }

        // Row vanished between insert and read: a concurrent unclaim won;
        // fall through and retry the insert once.
        if let Some(existing) = self.is_processed(session_id)? {
            let age = Utc::now().signed_duration_since(existing.processed_at);
            if age <= self.stale_threshold {
                return Ok(ClaimOutcome::AlreadyClaimed(existing));
            }
            debug!(
                session_id,
                age_secs = age.num_seconds(),
                "reclaiming stale payment claim"
            );
            self.unclaim(session_id)?;
        }

        match self.try_insert(session_id) {
            Ok(()) => Ok(ClaimOutcome::Claimed),
            Err(e) if e.is_unique_violation() => {
                // A concurrent delivery re-claimed first; it owns the work.
                let row = self.is_processed(session_id)?.ok_or(StoreError::NotFound)?;
                Ok(ClaimOutcome::AlreadyClaimed(row))
            }
            Err(e) => Err(e),
        }
    }

    fn try_insert(&self, session_id: &str) -> Result<(), StoreError> {
        self.db.with(|c| {
            c.execute(
                "INSERT INTO processed_payments (provider_session_id, processed_at)
                 VALUES (?1, ?2)",
                [session_id, time::now_iso().as_str()],
            )
        })?;
        Ok(())
    }

    /// Read the claim row, if any.
    pub fn is_processed(&self, session_id: &str) -> Result<Option<ProcessedPayment>, StoreError> {
        self.db.with(|c| {
            c.query_row(
                "SELECT provider_session_id, processed_at FROM processed_payments
                 WHERE provider_session_id = ?1",
                [session_id],
                |r| {
                    Ok(ProcessedPayment {
                        provider_session_id: r.get(0)?,
                        processed_at: time::from_iso(&r.get::<_, String>(1)?).unwrap_or_default(),
                    })
                },
            )
            .optional()
        })
    }

    /// Release a claim.
    pub fn unclaim(&self, session_id: &str) -> Result<(), StoreError> {
        self.db.with(|c| {
            c.execute(
                "DELETE FROM processed_payments WHERE provider_session_id = ?1",
                [session_id],
            )
        })?;
        Ok(())
    }
}
