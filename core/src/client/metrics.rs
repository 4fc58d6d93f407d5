use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-session transfer counters, bumped from both the caller thread
/// (sends) and the inbound reader thread (receives).
#[derive(Debug, Default)]
pub struct TransferMetrics {
    sent: AtomicUsize,
    received: AtomicUsize,
}

impl TransferMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// (items sent, results received) so far.
    pub fn snapshot(&self) -> (usize, usize) {
        (
            self.sent.load(Ordering::Relaxed),
            self.received.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let metrics = TransferMetrics::new();
        metrics.record_sent();
        metrics.record_sent();
        metrics.record_received();
        assert_eq!(metrics.snapshot(), (2, 1));
    }
}
