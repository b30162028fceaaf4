use std::sync::Arc;

use wavegen_core::{OscillatorOptions, RenderConfig, WaveTableCache};

use crate::rt_processing::callback::QuantumSource;
use crate::rt_processing::context::RenderContext;
use crate::rt_processing::oscillator::OscillatorNode;
use crate::rt_processing::performance::RenderMonitor;
use crate::rt_processing::post_process::{DrainReport, NodeId};

/// Drives oscillator nodes one quantum at a time.
///
/// Each quantum: every node renders into its bus, enabled buses are summed
/// into a mono mix, queued post-process actions run, and the frame clock
/// advances. Listeners therefore only hear `ended` after the final samples
/// of a node are already in the mix.
pub struct QuantumRenderer {
    context: RenderContext,
    nodes: Vec<OscillatorNode>,
    mix: Vec<f32>,
    monitor: Option<Arc<RenderMonitor>>,
}

impl QuantumRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self::from_context(RenderContext::new(config))
    }

    pub fn with_cache(config: RenderConfig, cache: Arc<WaveTableCache>) -> Self {
        Self::from_context(RenderContext::with_cache(config, cache))
    }

    fn from_context(context: RenderContext) -> Self {
        let block_size = context.block_size();
        Self {
            context,
            nodes: Vec::new(),
            mix: vec![0.0; block_size],
            monitor: None,
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<RenderMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Build a node bound to this renderer's sample rate and cache.
    pub fn create_oscillator(&self, options: OscillatorOptions) -> OscillatorNode {
        OscillatorNode::new(&self.context, options)
    }

    pub fn add_node(&mut self, node: OscillatorNode) -> NodeId {
        let id = node.id();
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&OscillatorNode> {
        self.nodes.iter().find(|node| node.id() == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut OscillatorNode> {
        self.nodes.iter_mut().find(|node| node.id() == id)
    }

    pub fn remove_node(&mut self, id: NodeId) -> Option<OscillatorNode> {
        let index = self.nodes.iter().position(|node| node.id() == id)?;
        Some(self.nodes.remove(index))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Drop nodes whose `ended` notification has been delivered.
    pub fn prune_ended(&mut self) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|node| !node.has_ended());
        before - self.nodes.len()
    }

    /// Mix of the most recently rendered quantum.
    pub fn mix(&self) -> &[f32] {
        &self.mix
    }

    /// Render one quantum and return the drained post-process report.
    pub fn render_quantum(&mut self) -> DrainReport {
        let _timing = self.monitor.as_deref().map(RenderMonitor::scoped_quantum);
        let quantum = self.context.quantum();

        self.mix.fill(0.0);
        for node in &mut self.nodes {
            node.render(quantum, self.context.post_process_mut());
            node.mix_into(&mut self.mix);
        }

        let report = self.context.drain_post_process();
        if let Some(monitor) = &self.monitor {
            monitor.record_post_process(report.executed, report.terminated);
        }
        self.context.advance();
        report
    }
}

impl QuantumSource for QuantumRenderer {
    fn next_quantum(&mut self) -> &[f32] {
        self.render_quantum();
        &self.mix
    }
}
