//! Explicit backpressure accounting for the export pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;

/// Tracks bytes produced by the archive writer versus bytes drained to the
/// destination, and parks the producer while too much output is queued.
///
/// The producer calls [`ready`] before reading each source chunk and
/// [`pushed`] for every frame it emits; the draining side calls [`drained`].
/// All counters are public for observability.
///
/// [`ready`]: FlowGauge::ready
/// [`pushed`]: FlowGauge::pushed
/// [`drained`]: FlowGauge::drained
pub struct FlowGauge {
    threshold: u64,
    pushed: AtomicU64,
    drained: AtomicU64,
    high_water: AtomicU64,
    notify: Notify,
}

impl FlowGauge {
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold,
            pushed: AtomicU64::new(0),
            drained: AtomicU64::new(0),
            high_water: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    /// Record `n` bytes handed to the drain queue.
    pub fn pushed(&self, n: u64) {
        self.pushed.fetch_add(n, Ordering::SeqCst);
        self.high_water.fetch_max(self.queued(), Ordering::SeqCst);
    }

    /// Record `n` bytes drained to the destination, waking a parked producer.
    pub fn drained(&self, n: u64) {
        self.drained.fetch_add(n, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Bytes currently queued between producer and drain.
    pub fn queued(&self) -> u64 {
        self.pushed
            .load(Ordering::SeqCst)
            .saturating_sub(self.drained.load(Ordering::SeqCst))
    }

    /// Highest queued value observed so far.
    pub fn high_water(&self) -> u64 {
        self.high_water.load(Ordering::SeqCst)
    }

    /// Total bytes pushed.
    pub fn total_pushed(&self) -> u64 {
        self.pushed.load(Ordering::SeqCst)
    }

    /// Total bytes drained.
    pub fn total_drained(&self) -> u64 {
        self.drained.load(Ordering::SeqCst)
    }

    /// Wait until the queue is below the threshold.
    pub async fn ready(&self) {
        loop {
            if self.queued() < self.threshold {
                return;
            }
            let notified = self.notify.notified();
            // Re-check after registering so a drain between the first check
            // and `notified()` is not missed.
            if self.queued() < self.threshold {
                return;
            }
            notified.await;
        }
    }
}
