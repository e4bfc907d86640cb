//! Node abstraction for the pipeline.
//!
//! Two-layer design:
//! - **`NodePlugin` trait**: for user-defined feature nodes.
//! - **`BuiltinNode` enum**: for all built-in nodes. The compiler can inline
//!   match arms, eliminating dynamic dispatch overhead on the hot path.
//!
//! `AnyNode` wraps either variant so the pipeline can handle both uniformly.
//!
//! Nodes are pure: `compute` takes `&self` and returns one output row per
//! chunk peak. Each worker thread runs its own copy of the graph, made with
//! [`AnyNode::duplicate`].

use crate::pipeline::context::{ChunkContext, NodeOutput, OutputType};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node_config::NodeConfig;
use crate::pipeline::node_type::NodeType;
use crate::recording::RecordingInfo;

/// Trait for pluggable/user-defined nodes.
pub trait NodePlugin: Send {
    /// Human-readable name of this node.
    fn name(&self) -> &str;

    /// Name and per-peak shape of the output, `None` for pure intermediates.
    fn output_type(&self) -> Option<OutputType>;

    /// Samples of raw trace context needed on each side of a peak.
    fn trace_margin(&self) -> usize {
        0
    }

    /// Required number of parents, if fixed.
    fn expected_parents(&self) -> Option<usize> {
        None
    }

    /// Compute one chunk. `parents` follow the declared parent order.
    fn compute(&self, ctx: &ChunkContext, parents: &[&NodeOutput]) -> PipelineResult<NodeOutput>;

    /// Independent copy for another worker thread.
    fn boxed_clone(&self) -> Box<dyn NodePlugin>;
}

// Forward-declare built-in node types (defined in nodes/ submodule).
use crate::pipeline::nodes::{
    ExtractDenseWaveforms, ExtractSparseWaveforms, PeakAmplitudeNode, WaveformDenoiser,
    WaveformRms,
};

/// Enum dispatch for built-in nodes.
#[derive(Debug, Clone)]
pub enum BuiltinNode {
    DenseWaveforms(ExtractDenseWaveforms),
    SparseWaveforms(ExtractSparseWaveforms),
    PeakAmplitude(PeakAmplitudeNode),
    Denoiser(WaveformDenoiser),
    Rms(WaveformRms),
}

impl BuiltinNode {
    /// Instantiate a built-in node against a recording.
    pub fn from_config(config: &NodeConfig, info: &RecordingInfo) -> PipelineResult<Self> {
        Ok(match config {
            NodeConfig::ExtractDenseWaveforms {
                ms_before,
                ms_after,
            } => BuiltinNode::DenseWaveforms(ExtractDenseWaveforms::new(
                info, *ms_before, *ms_after,
            )?),
            NodeConfig::ExtractSparseWaveforms {
                ms_before,
                ms_after,
                sparsity,
                radius_um,
            } => {
                let sparsity = NodeConfig::resolve_sparsity(sparsity, *radius_um, info)?;
                BuiltinNode::SparseWaveforms(ExtractSparseWaveforms::new(
                    info, *ms_before, *ms_after, sparsity,
                )?)
            }
            NodeConfig::PeakAmplitude => BuiltinNode::PeakAmplitude(PeakAmplitudeNode::new()),
            NodeConfig::WaveformDenoiser { kernel } => {
                BuiltinNode::Denoiser(WaveformDenoiser::new(kernel.clone())?)
            }
            NodeConfig::WaveformRms => BuiltinNode::Rms(WaveformRms::new()),
        })
    }

    /// Parameters that rebuild this node with [`BuiltinNode::from_config`].
    pub fn config(&self) -> NodeConfig {
        match self {
            BuiltinNode::DenseWaveforms(n) => NodeConfig::ExtractDenseWaveforms {
                ms_before: n.ms_before(),
                ms_after: n.ms_after(),
            },
            BuiltinNode::SparseWaveforms(n) => NodeConfig::ExtractSparseWaveforms {
                ms_before: n.ms_before(),
                ms_after: n.ms_after(),
                sparsity: Some(n.sparsity().clone()),
                radius_um: None,
            },
            BuiltinNode::PeakAmplitude(_) => NodeConfig::PeakAmplitude,
            BuiltinNode::Denoiser(n) => NodeConfig::WaveformDenoiser {
                kernel: n.kernel().to_vec(),
            },
            BuiltinNode::Rms(_) => NodeConfig::WaveformRms,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            BuiltinNode::DenseWaveforms(_) => NodeType::ExtractDenseWaveforms,
            BuiltinNode::SparseWaveforms(_) => NodeType::ExtractSparseWaveforms,
            BuiltinNode::PeakAmplitude(_) => NodeType::PeakAmplitude,
            BuiltinNode::Denoiser(_) => NodeType::WaveformDenoiser,
            BuiltinNode::Rms(_) => NodeType::WaveformRms,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            BuiltinNode::DenseWaveforms(n) => n.name(),
            BuiltinNode::SparseWaveforms(n) => n.name(),
            BuiltinNode::PeakAmplitude(n) => n.name(),
            BuiltinNode::Denoiser(n) => n.name(),
            BuiltinNode::Rms(n) => n.name(),
        }
    }

    pub fn output_type(&self) -> Option<OutputType> {
        match self {
            BuiltinNode::DenseWaveforms(n) => n.output_type(),
            BuiltinNode::SparseWaveforms(n) => n.output_type(),
            BuiltinNode::PeakAmplitude(n) => n.output_type(),
            BuiltinNode::Denoiser(n) => n.output_type(),
            BuiltinNode::Rms(n) => n.output_type(),
        }
    }

    pub fn trace_margin(&self) -> usize {
        match self {
            BuiltinNode::DenseWaveforms(n) => n.trace_margin(),
            BuiltinNode::SparseWaveforms(n) => n.trace_margin(),
            BuiltinNode::PeakAmplitude(_) | BuiltinNode::Denoiser(_) | BuiltinNode::Rms(_) => 0,
        }
    }

    pub fn compute(&self, ctx: &ChunkContext, parents: &[&NodeOutput]) -> PipelineResult<NodeOutput> {
        match self {
            BuiltinNode::DenseWaveforms(n) => n.compute(ctx, parents),
            BuiltinNode::SparseWaveforms(n) => n.compute(ctx, parents),
            BuiltinNode::PeakAmplitude(n) => n.compute(ctx, parents),
            BuiltinNode::Denoiser(n) => n.compute(ctx, parents),
            BuiltinNode::Rms(n) => n.compute(ctx, parents),
        }
    }
}

/// Wrapper that holds either a built-in node (enum dispatch) or a plugin (trait object).
pub enum AnyNode {
    Builtin(BuiltinNode),
    Plugin(Box<dyn NodePlugin>),
}

impl AnyNode {
    pub fn name(&self) -> &str {
        match self {
            AnyNode::Builtin(n) => n.name(),
            AnyNode::Plugin(n) => n.name(),
        }
    }

    pub fn output_type(&self) -> Option<OutputType> {
        match self {
            AnyNode::Builtin(n) => n.output_type(),
            AnyNode::Plugin(n) => n.output_type(),
        }
    }

    pub fn trace_margin(&self) -> usize {
        match self {
            AnyNode::Builtin(n) => n.trace_margin(),
            AnyNode::Plugin(n) => n.trace_margin(),
        }
    }

    pub fn expected_parents(&self) -> Option<usize> {
        match self {
            AnyNode::Builtin(n) => Some(n.node_type().expected_parents()),
            AnyNode::Plugin(n) => n.expected_parents(),
        }
    }

    pub fn compute(&self, ctx: &ChunkContext, parents: &[&NodeOutput]) -> PipelineResult<NodeOutput> {
        match self {
            AnyNode::Builtin(n) => n.compute(ctx, parents),
            AnyNode::Plugin(n) => n.compute(ctx, parents),
        }
    }

    /// Serializable parameters; `None` for plugins.
    pub fn config(&self) -> Option<NodeConfig> {
        match self {
            AnyNode::Builtin(n) => Some(n.config()),
            AnyNode::Plugin(_) => None,
        }
    }

    /// Fresh instance for another worker.
    ///
    /// Built-ins go through a JSON round trip of their config, so a node
    /// whose parameters do not survive serialization fails here, before any
    /// chunk is dispatched.
    pub fn duplicate(&self, info: &RecordingInfo) -> PipelineResult<AnyNode> {
        match self {
            AnyNode::Builtin(n) => {
                let value = serde_json::to_value(n.config())
                    .map_err(|e| PipelineError::Serialization(format!("{}: {}", n.name(), e)))?;
                let config: NodeConfig = serde_json::from_value(value)
                    .map_err(|e| PipelineError::Serialization(format!("{}: {}", n.name(), e)))?;
                Ok(AnyNode::Builtin(BuiltinNode::from_config(&config, info)?))
            }
            AnyNode::Plugin(n) => Ok(AnyNode::Plugin(n.boxed_clone())),
        }
    }
}

impl std::fmt::Debug for AnyNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnyNode::Builtin(n) => f.debug_tuple("Builtin").field(n).finish(),
            AnyNode::Plugin(n) => f.debug_tuple("Plugin").field(&n.name()).finish(),
        }
    }
}
