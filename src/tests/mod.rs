//! Unit tests for the session, profile and configuration modules
//!
//! These suites drive a real manager loop over the in-process provider and
//! store; fault injection and lookup gates stand in for a flaky network.

use std::time::Duration;

use tokio::time::sleep;

use crate::{AuthSnapshot, SessionHandle, SessionStats};


/// How long a polled condition may take before a suite gives up
pub const WAIT_BUDGET: Duration = Duration::from_secs(2);

/// Poll the published snapshot until `pred` holds, then return it
pub async fn wait_for_snapshot<F>(handle: &SessionHandle, mut pred: F) -> AuthSnapshot
where
    F: FnMut(&AuthSnapshot) -> bool,
{
    let start = std::time::Instant::now();
    loop {
        let snapshot = handle.snapshot();
        if pred(&snapshot) {
            return snapshot;
        }
        if start.elapsed() > WAIT_BUDGET {
            panic!("snapshot condition not reached in time: {:?}", snapshot);
        }
        sleep(Duration::from_millis(10)).await;
    }
}

/// Poll the manager counters until `pred` holds, then return them
pub async fn wait_for_stats<F>(handle: &SessionHandle, mut pred: F) -> SessionStats
where
    F: FnMut(&SessionStats) -> bool,
{
    let start = std::time::Instant::now();
    loop {
        let stats = handle.stats().await;
        if pred(&stats) {
            return stats;
        }
        if start.elapsed() > WAIT_BUDGET {
            panic!("stats condition not reached in time: {:?}", stats);
        }
        sleep(Duration::from_millis(10)).await;
    }
}
