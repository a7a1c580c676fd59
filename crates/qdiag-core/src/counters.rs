//! Process-wide counters, flushed as one event at the end of a command.

use std::sync::atomic::{AtomicU64, Ordering};

pub static COUNTERS: Counters = Counters::new();

pub struct Counters {
    logs_loaded: AtomicU64,
    checks_run: AtomicU64,
    checks_failed: AtomicU64,
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

impl Counters {
    pub const fn new() -> Self {
        Self {
            logs_loaded: AtomicU64::new(0),
            checks_run: AtomicU64::new(0),
            checks_failed: AtomicU64::new(0),
        }
    }

    pub fn inc_logs_loaded(&self) {
        self.logs_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_checks_run(&self) {
        self.checks_run.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "checks_run", "counter incremented");
    }

    pub fn inc_checks_failed(&self) {
        self.checks_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "checks_failed", "counter incremented");
    }

    /// Emit all current values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            event = "counters.flush",
            logs_loaded = self.logs_loaded(),
            checks_run = self.checks_run(),
            checks_failed = self.checks_failed(),
        );
    }

    pub fn logs_loaded(&self) -> u64 {
        self.logs_loaded.load(Ordering::Relaxed)
    }

    pub fn checks_run(&self) -> u64 {
        self.checks_run.load(Ordering::Relaxed)
    }

    pub fn checks_failed(&self) -> u64 {
        self.checks_failed.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.logs_loaded.store(0, Ordering::Relaxed);
        self.checks_run.store(0, Ordering::Relaxed);
        self.checks_failed.store(0, Ordering::Relaxed);
    }
}
