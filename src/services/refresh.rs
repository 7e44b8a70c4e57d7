use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter coordinating configuration reloads. The editor bumps
/// it once per edit session (on close or when navigating to the history),
/// and each form session compares its last-seen value to decide whether
/// to re-fetch the configuration.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    counter: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}
