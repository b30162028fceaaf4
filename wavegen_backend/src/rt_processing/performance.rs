use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use quanta::{Clock, Instant as QuantaInstant};

/// Point-in-time copy of the render counters (non-RT).
#[derive(Debug, Clone)]
pub struct RenderSnapshot {
    pub quanta_rendered: u64,
    pub frames_rendered: u64,
    /// Post-process actions executed, duplicates included.
    pub post_actions: u64,
    pub ended_events: u64,
    pub min_quantum_nanos: Option<u64>,
    pub max_quantum_nanos: Option<u64>,
    /// Exponential moving average of quantum render time.
    pub ema_quantum_nanos: f64,
    /// Wall-clock length of one quantum at the configured rate.
    pub budget_nanos: f64,
    pub load_percent: f64,
    pub timestamp: Instant,
}

/// Quantum timing and lifecycle counters.
///
/// Everything called from the render path is atomics only. `snapshot` is
/// meant for a control thread.
pub struct RenderMonitor {
    clock: Clock,
    block_size: usize,
    sample_rate: f32,
    ema_alpha: f64,

    quanta_rendered: AtomicU64,
    frames_rendered: AtomicU64,
    post_actions: AtomicU64,
    ended_events: AtomicU64,

    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
    ema_bits: AtomicU64,
}

impl RenderMonitor {
    pub fn new(block_size: usize, sample_rate: f32, ema_alpha: f64) -> Self {
        Self {
            clock: Clock::new(),
            block_size,
            sample_rate,
            ema_alpha: ema_alpha.clamp(f64::EPSILON, 1.0),
            quanta_rendered: AtomicU64::new(0),
            frames_rendered: AtomicU64::new(0),
            post_actions: AtomicU64::new(0),
            ended_events: AtomicU64::new(0),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
            ema_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Count one quantum and time it until the guard drops.
    #[inline]
    pub fn scoped_quantum(&self) -> QuantumGuard<'_> {
        self.quanta_rendered.fetch_add(1, Ordering::Relaxed);
        self.frames_rendered
            .fetch_add(self.block_size as u64, Ordering::Relaxed);
        QuantumGuard {
            monitor: self,
            start: self.clock.now(),
        }
    }

    #[inline]
    pub fn record_post_process(&self, executed: usize, ended: usize) {
        self.post_actions.fetch_add(executed as u64, Ordering::Relaxed);
        self.ended_events.fetch_add(ended as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_quantum_nanos(&self, nanos: u64) {
        self.min_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);

        let alpha = self.ema_alpha;
        // fetch_update only fails when the closure returns None
        let _ = self
            .ema_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                let old = f64::from_bits(bits);
                Some((alpha * nanos as f64 + (1.0 - alpha) * old).to_bits())
            });
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        let min_raw = self.min_nanos.load(Ordering::Relaxed);
        let max_raw = self.max_nanos.load(Ordering::Relaxed);
        let ema = f64::from_bits(self.ema_bits.load(Ordering::Relaxed));
        let budget_nanos = self.block_size as f64 / f64::from(self.sample_rate) * 1e9;
        let load_percent = if budget_nanos > 0.0 {
            ema / budget_nanos * 100.0
        } else {
            0.0
        };

        RenderSnapshot {
            quanta_rendered: self.quanta_rendered.load(Ordering::Relaxed),
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            post_actions: self.post_actions.load(Ordering::Relaxed),
            ended_events: self.ended_events.load(Ordering::Relaxed),
            min_quantum_nanos: (min_raw != u64::MAX).then_some(min_raw),
            max_quantum_nanos: (max_raw != 0).then_some(max_raw),
            ema_quantum_nanos: ema,
            budget_nanos,
            load_percent,
            timestamp: Instant::now(),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.quanta_rendered,
            &self.frames_rendered,
            &self.post_actions,
            &self.ended_events,
            &self.max_nanos,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.min_nanos.store(u64::MAX, Ordering::Relaxed);
        self.ema_bits.store(0f64.to_bits(), Ordering::Relaxed);
    }
}

/// Records the elapsed render time of one quantum on drop.
pub struct QuantumGuard<'a> {
    monitor: &'a RenderMonitor,
    start: QuantaInstant,
}

impl Drop for QuantumGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self
            .monitor
            .clock
            .now()
            .saturating_duration_since(self.start)
            .as_nanos();
        self.monitor
            .record_quantum_nanos(u64::try_from(elapsed).unwrap_or(u64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let monitor = RenderMonitor::new(128, 48_000.0, 0.1);
        {
            let _g = monitor.scoped_quantum();
        }
        {
            let _g = monitor.scoped_quantum();
        }
        monitor.record_post_process(3, 1);

        let snap = monitor.snapshot();
        assert_eq!(snap.quanta_rendered, 2);
        assert_eq!(snap.frames_rendered, 256);
        assert_eq!(snap.post_actions, 3);
        assert_eq!(snap.ended_events, 1);
        assert!(snap.min_quantum_nanos.is_some());
        assert!((snap.budget_nanos - 128.0 / 48_000.0 * 1e9).abs() < 1e-3);
    }

    #[test]
    fn test_min_max_ema() {
        let monitor = RenderMonitor::new(64, 48_000.0, 0.5);
        monitor.record_quantum_nanos(100);
        monitor.record_quantum_nanos(300);

        let snap = monitor.snapshot();
        assert_eq!(snap.min_quantum_nanos, Some(100));
        assert_eq!(snap.max_quantum_nanos, Some(300));
        // 0 -> 50 -> 175
        assert!((snap.ema_quantum_nanos - 175.0).abs() < 1e-9);

        monitor.reset();
        let snap = monitor.snapshot();
        assert_eq!(snap.quanta_rendered, 0);
        assert_eq!(snap.min_quantum_nanos, None);
        assert_eq!(snap.max_quantum_nanos, None);
        assert_eq!(snap.ema_quantum_nanos, 0.0);
    }
}
