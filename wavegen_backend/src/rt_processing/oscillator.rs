use std::sync::Arc;

use log::debug;
use spin::Mutex;
use wavegen_core::{
    AudioParam, OscillatorOptions, ParameterSource, PeriodicWave, PhaseGating, Result,
    WaveTableCache, WaveformKind, WavegenError,
};

use crate::rt_processing::context::{QuantumInfo, RenderContext};
use crate::rt_processing::post_process::{
    EventReceiver, NodeId, OutputBus, PostAction, PostProcessQueue, SharedBus, Termination,
};
use crate::rt_processing::synth::{self, ParamMode, PhaseAccumulator, Shape};

/// Scheduling state of a source node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Unscheduled,
    Scheduled,
    Playing,
    Finished,
}

/// A periodic signal source with scheduled start/stop.
///
/// Renders one quantum at a time into its own output bus. Phase keeps
/// accumulating across quanta and across waveform changes.
pub struct OscillatorNode {
    id: NodeId,
    sample_rate: f32,
    cache: Arc<WaveTableCache>,

    kind: WaveformKind,
    wave: Arc<PeriodicWave>,

    frequency: AudioParam,
    detune: AudioParam,
    pulse_width: AudioParam,
    phase_shift: AudioParam,
    gating: PhaseGating,

    phase: PhaseAccumulator,
    state: PlaybackState,
    start_frame: u64,
    stop_frame: u64,

    bus: SharedBus,
    termination: Arc<Termination>,
}

impl OscillatorNode {
    pub fn new(ctx: &RenderContext, options: OscillatorOptions) -> Self {
        let sample_rate = ctx.sample_rate();
        let block_size = ctx.block_size();
        let cache = Arc::clone(ctx.cache());

        let kind = if options.kind.is_basic() {
            options.kind
        } else {
            debug!("custom type requested without a periodic wave, using sine");
            WaveformKind::Sine
        };
        let wave = resolve_basic(&cache, kind, sample_rate);

        let id = NodeId::next();
        let bus = Arc::new(Mutex::new(OutputBus::new(block_size)));
        let termination = Arc::new(Termination::new(id, Arc::clone(&bus)));

        Self {
            id,
            sample_rate,
            cache,
            kind,
            wave,
            frequency: AudioParam::new(options.frequency, block_size),
            detune: AudioParam::new(options.detune, block_size),
            pulse_width: AudioParam::new(options.pulse_width, block_size),
            phase_shift: AudioParam::new(options.phase_shift, block_size),
            gating: options.gating,
            phase: PhaseAccumulator::new(),
            state: PlaybackState::Unscheduled,
            start_frame: u64::MAX,
            stop_frame: u64::MAX,
            bus,
            termination,
        }
    }

    /// Create a node that plays `wave` instead of a basic waveform.
    pub fn with_periodic_wave(
        ctx: &RenderContext,
        options: OscillatorOptions,
        wave: Arc<PeriodicWave>,
    ) -> Self {
        let mut node = Self::new(ctx, options);
        node.set_periodic_wave(wave);
        node
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    // Waveform

    pub fn kind(&self) -> WaveformKind {
        self.kind
    }

    /// Switch to a basic waveform. `Custom` is ignored; use
    /// [`set_periodic_wave`](Self::set_periodic_wave) for that.
    pub fn set_type(&mut self, kind: WaveformKind) {
        if !kind.is_basic() {
            debug!("node {}: ignoring set_type({kind})", self.id.get());
            return;
        }
        self.kind = kind;
        self.wave = resolve_basic(&self.cache, kind, self.sample_rate);
        debug!("node {}: waveform set to {kind}", self.id.get());
    }

    /// Name-based variant of [`set_type`](Self::set_type). Unknown names
    /// leave the node unchanged.
    pub fn set_type_str(&mut self, name: &str) {
        match name.parse::<WaveformKind>() {
            Ok(kind) => self.set_type(kind),
            Err(err) => debug!("node {}: {err}, keeping {}", self.id.get(), self.kind),
        }
    }

    /// Play a user supplied wave. Forces the kind to `Custom`.
    pub fn set_periodic_wave(&mut self, wave: Arc<PeriodicWave>) {
        self.kind = WaveformKind::Custom;
        self.wave = wave;
        debug!("node {}: custom periodic wave installed", self.id.get());
    }

    pub fn periodic_wave(&self) -> &Arc<PeriodicWave> {
        &self.wave
    }

    // Parameters

    pub fn frequency(&self) -> &AudioParam {
        &self.frequency
    }

    pub fn frequency_mut(&mut self) -> &mut AudioParam {
        &mut self.frequency
    }

    pub fn detune(&self) -> &AudioParam {
        &self.detune
    }

    pub fn detune_mut(&mut self) -> &mut AudioParam {
        &mut self.detune
    }

    pub fn pulse_width(&self) -> &AudioParam {
        &self.pulse_width
    }

    pub fn pulse_width_mut(&mut self) -> &mut AudioParam {
        &mut self.pulse_width
    }

    pub fn phase_shift(&self) -> &AudioParam {
        &self.phase_shift
    }

    pub fn phase_shift_mut(&mut self) -> &mut AudioParam {
        &mut self.phase_shift
    }

    pub fn set_phase_shift(&mut self, value: f32) {
        self.phase_shift.set_value(value);
    }

    /// Copy `other`'s current phase shift. Later changes on either node do
    /// not propagate.
    pub fn phase_lock_to(&mut self, other: &OscillatorNode) {
        self.phase_shift.set_value(other.phase_shift.value());
    }

    pub fn gating(&self) -> PhaseGating {
        self.gating
    }

    pub fn set_gating(&mut self, gating: PhaseGating) {
        self.gating = gating;
    }

    /// Accumulated phase: radians for sine, cycles for table waveforms.
    pub fn phase(&self) -> f64 {
        self.phase.value()
    }

    pub fn set_phase(&mut self, phase: f64) {
        self.phase.set(phase);
    }

    // Scheduling

    pub fn playback_state(&self) -> PlaybackState {
        self.state
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    pub fn stop_frame(&self) -> u64 {
        self.stop_frame
    }

    /// Schedule the start `when` seconds into the render timeline.
    pub fn start(&mut self, when: f64) -> Result<()> {
        let frame = self.seconds_to_frame(when)?;
        self.start_at(frame)
    }

    /// Schedule the stop `when` seconds into the render timeline.
    pub fn stop(&mut self, when: f64) -> Result<()> {
        let frame = self.seconds_to_frame(when)?;
        self.stop_at(frame)
    }

    pub fn start_at(&mut self, frame: u64) -> Result<()> {
        if self.state != PlaybackState::Unscheduled {
            return Err(WavegenError::InvalidState(format!(
                "node {} cannot be started more than once",
                self.id.get()
            )));
        }
        self.start_frame = frame;
        self.state = PlaybackState::Scheduled;
        debug!("node {}: start scheduled at frame {frame}", self.id.get());
        Ok(())
    }

    /// Later calls replace the previous stop frame until the node finishes.
    pub fn stop_at(&mut self, frame: u64) -> Result<()> {
        match self.state {
            PlaybackState::Unscheduled => Err(WavegenError::InvalidState(format!(
                "node {} cannot be stopped before it is started",
                self.id.get()
            ))),
            PlaybackState::Finished => Ok(()),
            PlaybackState::Scheduled | PlaybackState::Playing => {
                self.stop_frame = frame;
                debug!("node {}: stop scheduled at frame {frame}", self.id.get());
                Ok(())
            }
        }
    }

    fn seconds_to_frame(&self, when: f64) -> Result<u64> {
        if !when.is_finite() || when < 0.0 {
            return Err(WavegenError::InvalidArgument(format!(
                "schedule time must be a non-negative number of seconds, got {when}"
            )));
        }
        Ok((when * f64::from(self.sample_rate)).round() as u64)
    }

    // Lifecycle

    /// Receive the `ended` notification. Fires once per node.
    pub fn subscribe(&self) -> EventReceiver {
        self.termination.subscribe()
    }

    pub fn has_ended(&self) -> bool {
        self.termination.has_fired()
    }

    pub fn output(&self) -> SharedBus {
        Arc::clone(&self.bus)
    }

    pub fn is_output_enabled(&self) -> bool {
        self.bus.lock().is_enabled()
    }

    // Rendering

    /// Render the next quantum into the node's own bus.
    ///
    /// The bus is silenced first, so everything outside the active range
    /// reads as zero. Disabled outputs are left alone.
    pub fn render(&mut self, quantum: QuantumInfo, post: &mut PostProcessQueue) {
        let bus = Arc::clone(&self.bus);
        let mut guard = bus.lock();
        if !guard.is_enabled() {
            return;
        }
        guard.zeros();
        self.process_quantum(quantum, guard.data_mut(), post);
    }

    /// Add this quantum's output to `mix` if the output is still enabled.
    pub fn mix_into(&self, mix: &mut [f32]) {
        let guard = self.bus.lock();
        if !guard.is_enabled() {
            return;
        }
        for (out, sample) in mix.iter_mut().zip(guard.data()) {
            *out += *sample;
        }
    }

    /// Synthesize one quantum into `out`.
    ///
    /// Samples ahead of the start frame are not touched. Samples from the
    /// stop frame on are zeroed and the termination is queued on `post`.
    /// Returns the exclusive end of the synthesized range.
    pub fn process_quantum(
        &mut self,
        quantum: QuantumInfo,
        out: &mut [f32],
        post: &mut PostProcessQueue,
    ) -> usize {
        if self.state == PlaybackState::Unscheduled {
            return 0;
        }

        let block_size = quantum.block_size.min(out.len());
        let quantum_start = quantum.start_frame;
        let quantum_end = quantum_start + block_size as u64;

        let offset = self.start_frame.saturating_sub(quantum_start).min(block_size as u64) as usize;
        let fill = quantum_end
            .min(self.stop_frame)
            .saturating_sub(quantum_start)
            .clamp(offset as u64, block_size as u64) as usize;

        if fill > offset {
            let mode = ParamMode::resolve(&self.frequency, &self.detune);
            let shape = Shape {
                pulse_width: self.pulse_width.value(),
                phase_shift: self.phase_shift.value(),
                gating: self.gating,
            };
            let phase = if self.kind.uses_table() {
                synth::render_wave(
                    out,
                    offset..fill,
                    mode,
                    shape,
                    &self.wave,
                    quantum.sample_rate,
                    self.phase.value(),
                )
            } else {
                synth::render_sine(
                    out,
                    offset..fill,
                    mode,
                    shape,
                    quantum.sample_rate,
                    self.phase.value(),
                )
            };
            self.phase.set(phase);
            self.state = PlaybackState::Playing;
        }

        if self.stop_frame <= quantum_start + fill as u64 {
            out[fill..block_size].fill(0.0);
            if self.state != PlaybackState::Finished && !self.termination.has_fired() {
                post.push(PostAction::Terminate {
                    handle: Arc::clone(&self.termination),
                    frame: quantum_start + fill as u64,
                });
            }
            self.state = PlaybackState::Finished;
        }

        fill
    }
}

fn resolve_basic(cache: &WaveTableCache, kind: WaveformKind, sample_rate: f32) -> Arc<PeriodicWave> {
    cache
        .get_or_build(kind, sample_rate)
        .unwrap_or_else(|| Arc::new(PeriodicWave::basic(kind, sample_rate)))
}
