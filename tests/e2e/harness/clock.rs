use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Controllable time for snapshot expiry testing.
///
/// The same clock drives the orchestrator (log and test timestamps) and the
/// recovery store (snapshot age), so a scenario can let a snapshot go stale
/// without waiting.
#[derive(Clone)]
pub struct MockClock {
    current: Arc<AtomicI64>,
}

impl MockClock {
    /// Creates a time provider function suitable for `Orchestrator::with_time_provider()`.
    pub fn as_provider(&self) -> impl Fn() -> i64 + Send + Sync + 'static {
        let current = self.current.clone();
        move || current.load(Ordering::SeqCst)
    }

    /// Same provider, boxed for `RecoveryStore::open_with_clock()`.
    pub fn as_time_provider(&self) -> Arc<dyn forge_core::TimeProvider> {
        Arc::new(self.as_provider())
    }
}

impl MockClock {
    /// Create a new mock clock starting at current time
    pub fn new() -> Self {
        Self {
            current: Arc::new(AtomicI64::new(forge_core::current_timestamp())),
        }
    }

    /// Get current timestamp
    pub fn now(&self) -> i64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Advance time by duration
    pub fn advance(&self, duration: Duration) {
        let seconds = duration.as_secs() as i64;
        self.current.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Advance time by hours
    pub fn advance_hours(&self, hours: u64) {
        self.advance(Duration::from_secs(hours * 3600));
    }

    /// Advance time by minutes
    pub fn advance_minutes(&self, minutes: u64) {
        self.advance(Duration::from_secs(minutes * 60));
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}
