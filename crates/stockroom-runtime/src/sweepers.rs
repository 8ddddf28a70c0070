//! Background sweepers.
//!
//! Two periodic tasks keep the store self-healing: pending reservations
//! abandoned mid-redirect expire after an hour, and session rows past
//! their expiry are removed. Sweep failures log and the loop continues.

use chrono::Duration as ChronoDuration;
use std::time::Duration;
use stockroom_gateway::AppState;
use tracing::debug;

/// How often the reservation sweeper runs.
const RESERVATION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Pending reservations older than this are presumed abandoned.
const STALE_RESERVATION_AGE_SECS: i64 = 60 * 60;

/// How often the session sweeper runs.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Spawn both sweepers onto the runtime.
pub fn spawn(state: &AppState) {
    let engine = state.engine.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(RESERVATION_SWEEP_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            match engine.sweep_stale(ChronoDuration::seconds(STALE_RESERVATION_AGE_SECS)) {
                Ok(0) => {}
                Ok(swept) => debug!(swept, "reservation sweep"),
                Err(e) => debug!(error = %e, "reservation sweep failed"),
            }
        }
    });

    let auth_sessions = state.auth.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            match auth_sessions.sweep_sessions() {
                Ok(0) => {}
                Ok(swept) => debug!(swept, "session sweep"),
                Err(e) => debug!(error = %e, "session sweep failed"),
            }
        }
    });
}
