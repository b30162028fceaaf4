//! # wavegen
//!
//! Renders a scheduled oscillator to a WAV file or plays it on the default
//! output device.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use hound::{SampleFormat, WavSpec, WavWriter};
use log::{error, info, warn};
use wavegen_backend::{CallbackSlot, EventReceiver, NodeEvent, QuantumRenderer, RenderMonitor};
use wavegen_core::{OscillatorOptions, PeriodicWave, PhaseGating, RenderConfig, WaveformKind};

/// Periodic signal generator
#[derive(Parser)]
#[command(name = "wavegen")]
#[command(about = "Render or play a scheduled oscillator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render to a 32-bit float WAV file
    Render {
        /// Output file path
        #[arg(short, long, default_value = "wavegen.wav")]
        output: PathBuf,

        /// Sample rate in Hz
        #[arg(short, long, default_value_t = 44_100)]
        sample_rate: u32,

        #[command(flatten)]
        voice: VoiceArgs,
    },

    /// Play on the default output device
    Play {
        #[command(flatten)]
        voice: VoiceArgs,
    },
}

#[derive(Args)]
struct VoiceArgs {
    /// sine, sawtooth, triangle or square
    #[arg(short, long, default_value = "sine")]
    waveform: WaveformKind,

    /// Frequency in Hz
    #[arg(short, long, default_value_t = 440.0)]
    frequency: f32,

    /// Detune in cents
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    detune: f32,

    /// Pulse width of the sign gate
    #[arg(long, default_value_t = 0.5)]
    pulse_width: f32,

    /// Phase shift in cycles
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    phase_shift: f32,

    /// Gate on the phase within each cycle instead of the running phase
    #[arg(long)]
    wrapped_gating: bool,

    /// Sine partial amplitudes for a custom wave, e.g. `1,0,0.33`
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    partials: Vec<f32>,

    /// JSON oscillator options; replaces the flags above
    #[arg(long)]
    options: Option<PathBuf>,

    /// Duration in seconds
    #[arg(short, long, default_value_t = 2.0)]
    duration: f64,

    /// Samples per render quantum
    #[arg(short, long, default_value_t = 128)]
    block_size: usize,
}

impl VoiceArgs {
    fn oscillator_options(&self) -> Result<OscillatorOptions> {
        if let Some(path) = &self.options {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            return OscillatorOptions::from_json_str(&json)
                .with_context(|| format!("parsing {}", path.display()));
        }

        let gating = if self.wrapped_gating {
            PhaseGating::Wrapped
        } else {
            PhaseGating::Literal
        };
        Ok(OscillatorOptions::new()
            .with_kind(self.waveform)
            .with_frequency(self.frequency)
            .with_detune(self.detune)
            .with_pulse_width(self.pulse_width)
            .with_phase_shift(self.phase_shift)
            .with_gating(gating))
    }

    fn custom_wave(&self) -> Result<Option<Arc<PeriodicWave>>> {
        if self.partials.is_empty() {
            return Ok(None);
        }
        let mut imag = vec![0.0f32];
        imag.extend_from_slice(&self.partials);
        let real = vec![0.0f32; imag.len()];
        let wave = PeriodicWave::from_coefficients(&real, &imag, true)
            .context("building custom wave from partials")?;
        Ok(Some(Arc::new(wave)))
    }

    /// Renderer holding one node that plays for `duration` seconds.
    fn build_renderer(
        &self,
        config: RenderConfig,
    ) -> Result<(QuantumRenderer, EventReceiver)> {
        let mut renderer = QuantumRenderer::new(config);
        let mut node = renderer.create_oscillator(self.oscillator_options()?);
        if let Some(wave) = self.custom_wave()? {
            node.set_periodic_wave(wave);
        }
        let ended = node.subscribe();
        node.start(0.0)?;
        node.stop(self.duration)?;
        renderer.add_node(node);
        Ok((renderer, ended))
    }
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Render {
            output,
            sample_rate,
            voice,
        } => render(&output, sample_rate, &voice),
        Commands::Play { voice } => play(&voice),
    }
}

fn render(output: &Path, sample_rate: u32, voice: &VoiceArgs) -> Result<()> {
    let config = RenderConfig::new()
        .with_sample_rate(sample_rate as f32)
        .with_block_size(voice.block_size);
    let monitor = Arc::new(RenderMonitor::new(config.block_size, config.sample_rate, 0.1));
    let (renderer, ended) = voice.build_renderer(config)?;
    let mut renderer = renderer.with_monitor(Arc::clone(&monitor));

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(output, spec)
        .with_context(|| format!("creating {}", output.display()))?;

    info!("rendering {:.2}s ({config})", voice.duration);
    loop {
        renderer.render_quantum();
        for sample in renderer.mix() {
            writer.write_sample(*sample)?;
        }
        if let Ok(NodeEvent::Ended { frame, .. }) = ended.try_recv() {
            info!("oscillator ended at frame {frame}");
            break;
        }
    }
    writer.finalize()?;

    let snap = monitor.snapshot();
    info!(
        "wrote {} ({} quanta, avg load {:.2}%)",
        output.display(),
        snap.quanta_rendered,
        snap.load_percent
    );
    Ok(())
}

fn play(voice: &VoiceArgs) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no default output device")?;
    let supported = device
        .default_output_config()
        .context("querying default output config")?;
    if supported.sample_format() != cpal::SampleFormat::F32 {
        bail!(
            "device sample format {:?} is not supported, need f32",
            supported.sample_format()
        );
    }
    let stream_config: cpal::StreamConfig = supported.into();
    let sample_rate = stream_config.sample_rate.0 as f32;
    let channels = usize::from(stream_config.channels);

    let config = RenderConfig::new()
        .with_sample_rate(sample_rate)
        .with_block_size(voice.block_size)
        .with_channels(channels);
    let (renderer, ended) = voice.build_renderer(config)?;
    let slot = Arc::new(CallbackSlot::silent(sample_rate, channels));

    let device_slot = Arc::clone(&slot);
    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            device_slot.process_realtime(data);
        },
        |err| error!("output stream error: {err}"),
        None,
    )?;
    stream.play()?;
    // frame 0 of the render timeline is the first callback after the swap
    slot.swap_source(Box::new(renderer));
    info!("playing {:.2}s ({config})", voice.duration);

    let timeout = Duration::from_secs_f64(voice.duration + 1.0);
    match ended.recv_timeout(timeout) {
        Ok(NodeEvent::Ended { frame, .. }) => info!(
            "oscillator ended at frame {frame}, {:.2}s on the device clock",
            slot.playback_time()
        ),
        Err(_) => warn!("no ended notification after {timeout:?}"),
    }
    Ok(())
}
