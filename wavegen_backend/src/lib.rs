//! Real-time rendering for wavegen oscillators.

pub mod rt_processing;

pub use rt_processing::callback::{CallbackSlot, QuantumSource};
pub use rt_processing::context::{QuantumInfo, RenderContext};
pub use rt_processing::oscillator::{OscillatorNode, PlaybackState};
pub use rt_processing::performance::{RenderMonitor, RenderSnapshot};
pub use rt_processing::post_process::{EventReceiver, NodeEvent, NodeId, PostProcessQueue};
pub use rt_processing::renderer::QuantumRenderer;
