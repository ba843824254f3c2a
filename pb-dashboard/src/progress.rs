//! Synthetic upload progress
//!
//! This is a UX simulation, not a transfer measurement: while the prediction
//! request is outstanding the percentage climbs by a fixed step on a fixed
//! period and stops short of completion. It says nothing about bytes sent.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::state::DashboardState;

pub const PROGRESS_STEP: u8 = 10;

/// Synthetic progress never reaches this value; only a response does
pub const PROGRESS_CAP: u8 = 90;

/// Next synthetic value after `current`
pub fn next_progress(current: u8) -> u8 {
    current.saturating_add(PROGRESS_STEP).min(PROGRESS_CAP)
}

/// Background task advancing one attempt's progress
pub struct ProgressTicker {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    /// Start ticking every `period` (first tick one period from now)
    pub fn start(state: Arc<DashboardState>, attempt: u64, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !state.advance_progress(attempt) {
                            // Attempt superseded or finished
                            break;
                        }
                    }
                }
            }
            tracing::trace!(attempt, "Progress ticker stopped");
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Cancel and wait for the task, so no tick lands after this returns
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
