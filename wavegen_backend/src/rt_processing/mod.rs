pub mod callback;
pub mod context;
pub mod oscillator;
pub mod performance;
pub mod post_process;
pub mod renderer;
pub mod synth;
