//! Device-facing slot that turns render quanta into callback buffers.
//!
//! Devices ask for arbitrary buffer lengths and channel counts; sources
//! render fixed mono quanta. The slot keeps the partially consumed quantum
//! between callbacks and fans each sample out to every channel.
//!
//! The audio thread never blocks on the slot: if the source is being
//! swapped, that callback is filled with silence.

use std::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

/// Producer of consecutive mono render quanta.
///
/// `next_quantum` runs on the audio thread and must not block. An empty
/// quantum means the source has nothing to play.
pub trait QuantumSource: Send + 'static {
    fn next_quantum(&mut self) -> &[f32];
}

struct SlotState {
    source: Box<dyn QuantumSource>,
    // copy of the quantum being played out
    pending: Vec<f32>,
    cursor: usize,
}

impl SlotState {
    fn fill(&mut self, output: &mut [f32], channels: usize) {
        for frame in output.chunks_exact_mut(channels) {
            if self.cursor >= self.pending.len() {
                self.pending.clear();
                self.pending.extend_from_slice(self.source.next_quantum());
                self.cursor = 0;
            }
            let sample = self.pending.get(self.cursor).copied().unwrap_or(0.0);
            frame.fill(sample);
            self.cursor += 1;
        }
    }
}

/// Hot-swappable quantum source plus a device-side frame clock.
pub struct CallbackSlot {
    state: Mutex<SlotState>,
    frame_clock: AtomicU64,
    sample_rate: f32,
    channels: usize,
}

impl CallbackSlot {
    pub fn new(source: Box<dyn QuantumSource>, sample_rate: f32, channels: usize) -> Self {
        Self {
            state: Mutex::new(SlotState {
                source,
                pending: Vec::new(),
                cursor: 0,
            }),
            frame_clock: AtomicU64::new(0),
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Slot that plays silence until a source is swapped in.
    pub fn silent(sample_rate: f32, channels: usize) -> Self {
        Self::new(Box::new(Silence), sample_rate, channels)
    }

    /// Install `source`, dropping the rest of the previous quantum.
    /// Spins while the audio thread is inside a callback.
    pub fn swap_source(&self, source: Box<dyn QuantumSource>) {
        let mut state = self.state.lock();
        state.source = source;
        state.pending.clear();
        state.cursor = 0;
    }

    /// Audio-thread entry point for an interleaved buffer. Returns `false`
    /// if the buffer was filled with silence instead of running the source.
    pub fn process_realtime(&self, output: &mut [f32]) -> bool {
        let frames = output.len() / self.channels;
        if frames == 0 {
            return false;
        }
        self.frame_clock.fetch_add(frames as u64, Ordering::Relaxed);

        match self.state.try_lock() {
            Some(mut state) => {
                state.fill(output, self.channels);
                true
            }
            None => {
                output.fill(0.0);
                false
            }
        }
    }

    /// Frames handed to the device so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_clock.load(Ordering::Relaxed)
    }

    pub fn playback_time(&self) -> f64 {
        self.frame_count() as f64 / f64::from(self.sample_rate)
    }
}

struct Silence;

impl QuantumSource for Silence {
    fn next_quantum(&mut self) -> &[f32] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Emits quanta counting up from 0, one value per frame.
    struct Ramp {
        next: f32,
        block: Vec<f32>,
    }

    impl Ramp {
        fn new(block_size: usize) -> Self {
            Self {
                next: 0.0,
                block: vec![0.0; block_size],
            }
        }
    }

    impl QuantumSource for Ramp {
        fn next_quantum(&mut self) -> &[f32] {
            for sample in &mut self.block {
                *sample = self.next;
                self.next += 1.0;
            }
            &self.block
        }
    }

    #[test]
    fn test_chunks_quanta_across_callbacks() {
        let slot = CallbackSlot::new(Box::new(Ramp::new(4)), 48_000.0, 2);
        let mut played = Vec::new();
        for frames in [3usize, 6, 1] {
            let mut out = vec![-1.0f32; frames * 2];
            assert!(slot.process_realtime(&mut out));
            for frame in out.chunks_exact(2) {
                assert_eq!(frame[0], frame[1]);
                played.push(frame[0]);
            }
        }
        let expected: Vec<f32> = (0..10).map(|n| n as f32).collect();
        assert_eq!(played, expected);
        assert_eq!(slot.frame_count(), 10);
        assert!((slot.playback_time() - 10.0 / 48_000.0).abs() < 1e-12);
    }

    #[test]
    fn test_contended_slot_outputs_silence() {
        let slot = CallbackSlot::new(Box::new(Ramp::new(4)), 48_000.0, 1);
        let _held = slot.state.lock();

        let mut out = vec![0.3f32; 16];
        assert!(!slot.process_realtime(&mut out));
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_swap_from_silence() {
        let slot = CallbackSlot::silent(44_100.0, 1);
        let mut out = vec![0.5f32; 4];
        assert!(slot.process_realtime(&mut out));
        assert_eq!(out, vec![0.0; 4]);

        slot.swap_source(Box::new(Ramp::new(2)));
        slot.process_realtime(&mut out);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0]);
        assert!(!slot.process_realtime(&mut []));
    }
}
