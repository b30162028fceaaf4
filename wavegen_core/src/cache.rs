use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use log::debug;
use parking_lot::RwLock;

use crate::periodic_wave::PeriodicWave;
use crate::waveform::WaveformKind;

// Process-wide cache, initialized on first use
static GLOBAL_CACHE: OnceLock<Arc<WaveTableCache>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    kind: WaveformKind,
    sample_rate_bits: u32,
}

impl CacheKey {
    fn new(kind: WaveformKind, sample_rate: f32) -> Self {
        Self {
            kind,
            sample_rate_bits: sample_rate.to_bits(),
        }
    }
}

/// Write-once-per-key store of basic wave tables.
///
/// Lookups of a cached table only take the read lock. A miss builds the
/// table outside any lock and inserts it with an entry-level get-or-insert,
/// so racing builders agree on a single winner.
#[derive(Debug, Default)]
pub struct WaveTableCache {
    tables: RwLock<HashMap<CacheKey, Arc<PeriodicWave>>>,
}

impl WaveTableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache shared by every render context that doesn't bring its own.
    pub fn global() -> Arc<WaveTableCache> {
        Arc::clone(GLOBAL_CACHE.get_or_init(|| Arc::new(WaveTableCache::new())))
    }

    /// Resolve the table for a basic kind, building it on first request.
    ///
    /// Returns `None` for `Custom`, which is never pooled.
    pub fn get_or_build(&self, kind: WaveformKind, sample_rate: f32) -> Option<Arc<PeriodicWave>> {
        if !kind.is_basic() {
            return None;
        }

        let key = CacheKey::new(kind, sample_rate);
        if let Some(wave) = self.tables.read().get(&key) {
            return Some(Arc::clone(wave));
        }

        debug!("building {kind} wave table for {sample_rate} Hz");
        let built = Arc::new(PeriodicWave::basic(kind, sample_rate));
        let mut guard = self.tables.write();
        let wave = guard.entry(key).or_insert(built);
        Some(Arc::clone(wave))
    }

    /// Build every basic table for `sample_rate` ahead of rendering.
    pub fn warm(&self, sample_rate: f32) {
        for kind in WaveformKind::BASIC {
            let _ = self.get_or_build(kind, sample_rate);
        }
    }

    pub fn contains(&self, kind: WaveformKind, sample_rate: f32) -> bool {
        self.tables
            .read()
            .contains_key(&CacheKey::new(kind, sample_rate))
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_same_key_same_instance() {
        let cache = WaveTableCache::new();
        let a = cache.get_or_build(WaveformKind::Square, 44_100.0).unwrap();
        let b = cache.get_or_build(WaveformKind::Square, 44_100.0).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_sample_rates() {
        let cache = WaveTableCache::new();
        let a = cache.get_or_build(WaveformKind::Sawtooth, 44_100.0).unwrap();
        let b = cache.get_or_build(WaveformKind::Sawtooth, 48_000.0).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(cache.contains(WaveformKind::Sawtooth, 44_100.0));
        assert!(cache.contains(WaveformKind::Sawtooth, 48_000.0));
        assert!(!cache.contains(WaveformKind::Triangle, 44_100.0));
    }

    #[test]
    fn test_custom_not_pooled() {
        let cache = WaveTableCache::new();
        assert!(cache.get_or_build(WaveformKind::Custom, 44_100.0).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_warm() {
        let cache = WaveTableCache::new();
        cache.warm(32_000.0);
        assert_eq!(cache.len(), WaveformKind::BASIC.len());
    }

    #[test]
    fn test_concurrent_get_or_build() {
        let cache = Arc::new(WaveTableCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get_or_build(WaveformKind::Triangle, 96_000.0).unwrap())
            })
            .collect();

        let waves: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for wave in &waves[1..] {
            assert!(Arc::ptr_eq(&waves[0], wave));
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_global_is_shared() {
        let a = WaveTableCache::global();
        let b = WaveTableCache::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
