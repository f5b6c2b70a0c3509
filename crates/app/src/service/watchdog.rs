use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tracing::error;

pub(crate) const WATCHDOG_POLL_INTERVAL_MS: u64 = 500;
pub(crate) const WATCHDOG_STALE_THRESHOLD_MS: u64 = 5_000;
pub(crate) const WATCHDOG_STARTUP_GRACE_MS: u64 = 10_000;

/// Heartbeat written by the capture loop every time a frame is published.
pub(crate) struct CaptureHealth {
    last_beat: AtomicU64,
}

impl CaptureHealth {
    pub(crate) fn new() -> Self {
        let grace_deadline = current_millis().saturating_add(WATCHDOG_STARTUP_GRACE_MS);
        Self {
            last_beat: AtomicU64::new(grace_deadline),
        }
    }

    pub(crate) fn beat(&self) {
        self.last_beat.store(current_millis(), Ordering::Relaxed);
    }

    pub(crate) fn is_stale(&self, now: u64) -> bool {
        now.saturating_sub(self.last_beat.load(Ordering::Relaxed)) > WATCHDOG_STALE_THRESHOLD_MS
    }
}

pub(crate) struct WatchdogState {
    triggered: AtomicBool,
}

impl WatchdogState {
    pub(crate) fn new() -> Self {
        Self {
            triggered: AtomicBool::new(false),
        }
    }

    pub(crate) fn arm(&self) {
        self.triggered.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

/// Monitor the capture heartbeat and request a restart when it stalls.
pub(crate) fn spawn_watchdog(
    health: Arc<CaptureHealth>,
    running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    state: Arc<WatchdogState>,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("capture-watchdog".into())
        .spawn(move || {
            while running.load(Ordering::Relaxed) && !shutdown.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(WATCHDOG_POLL_INTERVAL_MS));
                if health.is_stale(current_millis()) {
                    error!("Watchdog detected stalled capture; requesting restart");
                    state.arm();
                    running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        })
        .expect("failed to spawn watchdog thread")
}

fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_health_is_within_grace() {
        let health = CaptureHealth::new();
        assert!(!health.is_stale(current_millis()));
    }

    #[test]
    fn beat_resets_staleness() {
        let health = CaptureHealth::new();
        health.beat();
        let now = current_millis();
        assert!(!health.is_stale(now));
        assert!(health.is_stale(now + WATCHDOG_STALE_THRESHOLD_MS + 1));
    }

    #[test]
    fn state_arms_once() {
        let state = WatchdogState::new();
        assert!(!state.is_triggered());
        state.arm();
        assert!(state.is_triggered());
    }
}
