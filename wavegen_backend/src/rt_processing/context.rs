use std::sync::Arc;

use wavegen_core::{RenderConfig, WaveTableCache};

use crate::rt_processing::post_process::{DrainReport, PostProcessQueue};

/// Position and shape of the quantum being rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantumInfo {
    /// Absolute frame of the first sample in this quantum.
    pub start_frame: u64,
    pub block_size: usize,
    pub sample_rate: f32,
}

impl QuantumInfo {
    pub fn end_frame(&self) -> u64 {
        self.start_frame + self.block_size as u64
    }
}

/// Timeline, wave-table cache and deferred-action queue of one renderer.
#[derive(Debug)]
pub struct RenderContext {
    config: RenderConfig,
    current_frame: u64,
    cache: Arc<WaveTableCache>,
    post_process: PostProcessQueue,
}

impl RenderContext {
    /// Context backed by the process-wide wave-table cache.
    pub fn new(config: RenderConfig) -> Self {
        Self::with_cache(config, WaveTableCache::global())
    }

    pub fn with_cache(config: RenderConfig, cache: Arc<WaveTableCache>) -> Self {
        Self {
            config: config.normalized(),
            current_frame: 0,
            cache,
            post_process: PostProcessQueue::with_capacity(16),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f32 {
        self.config.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    pub fn cache(&self) -> &Arc<WaveTableCache> {
        &self.cache
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Seconds elapsed on the render timeline.
    pub fn current_time(&self) -> f64 {
        self.current_frame as f64 / f64::from(self.config.sample_rate)
    }

    pub fn quantum(&self) -> QuantumInfo {
        QuantumInfo {
            start_frame: self.current_frame,
            block_size: self.config.block_size,
            sample_rate: self.config.sample_rate,
        }
    }

    pub fn post_process_mut(&mut self) -> &mut PostProcessQueue {
        &mut self.post_process
    }

    pub(crate) fn drain_post_process(&mut self) -> DrainReport {
        self.post_process.drain()
    }

    pub(crate) fn advance(&mut self) {
        self.current_frame += self.config.block_size as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantum_tracks_clock() {
        let config = RenderConfig::new().with_sample_rate(44_100.0).with_block_size(128);
        let mut ctx = RenderContext::with_cache(config, Arc::new(WaveTableCache::new()));

        let q = ctx.quantum();
        assert_eq!(q.start_frame, 0);
        assert_eq!(q.end_frame(), 128);

        ctx.advance();
        ctx.advance();
        assert_eq!(ctx.current_frame(), 256);
        assert_eq!(ctx.quantum().start_frame, 256);
        assert!((ctx.current_time() - 256.0 / 44_100.0).abs() < 1e-12);
    }

    #[test]
    fn test_default_cache_is_global() {
        let ctx = RenderContext::new(RenderConfig::default());
        assert!(Arc::ptr_eq(ctx.cache(), &WaveTableCache::global()));
    }

    #[test]
    fn test_zero_block_size_is_raised() {
        let config = RenderConfig {
            sample_rate: 44_100.0,
            block_size: 0,
            channels: 2,
        };
        let ctx = RenderContext::with_cache(config, Arc::new(WaveTableCache::new()));
        assert_eq!(ctx.block_size(), 1);
        assert_eq!(ctx.quantum().block_size, 1);
    }
}
