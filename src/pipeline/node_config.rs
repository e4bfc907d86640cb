//! Serializable node and pipeline descriptions.
//!
//! A [`NodeConfig`] holds everything needed to rebuild a built-in node
//! against a recording. It is how worker threads get their own node
//! instances and how run files describe a pipeline:
//!
//! ```json
//! {"nodes": [
//!   {"kind": "extract_dense_waveforms", "ms_before": 0.5, "ms_after": 1.0, "return_output": false},
//!   {"kind": "waveform_denoiser", "parents": [0], "return_output": false},
//!   {"kind": "peak_amplitude"},
//!   {"kind": "waveform_rms", "parents": [0]},
//!   {"kind": "waveform_rms", "parents": [1]}
//! ]}
//! ```

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::executor::Pipeline;
use crate::pipeline::id::NodeId;
use crate::pipeline::node_type::NodeType;
use crate::pipeline::nodes::DEFAULT_DENOISE_KERNEL;
use crate::recording::{ChannelSparsity, RecordingInfo};
use serde::{Deserialize, Serialize};

/// Parameters of a built-in node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeConfig {
    ExtractDenseWaveforms {
        ms_before: f64,
        ms_after: f64,
    },
    /// Neighborhoods come from `sparsity` if given, else from `radius_um`
    /// and the recording's channel locations, else every channel.
    ExtractSparseWaveforms {
        ms_before: f64,
        ms_after: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sparsity: Option<ChannelSparsity>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        radius_um: Option<f64>,
    },
    PeakAmplitude,
    WaveformDenoiser {
        #[serde(default = "default_kernel")]
        kernel: Vec<f32>,
    },
    WaveformRms,
}

fn default_kernel() -> Vec<f32> {
    DEFAULT_DENOISE_KERNEL.to_vec()
}

fn default_return_output() -> bool {
    true
}

impl NodeConfig {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeConfig::ExtractDenseWaveforms { .. } => NodeType::ExtractDenseWaveforms,
            NodeConfig::ExtractSparseWaveforms { .. } => NodeType::ExtractSparseWaveforms,
            NodeConfig::PeakAmplitude => NodeType::PeakAmplitude,
            NodeConfig::WaveformDenoiser { .. } => NodeType::WaveformDenoiser,
            NodeConfig::WaveformRms => NodeType::WaveformRms,
        }
    }

    /// Denoiser with the default 3-tap kernel.
    pub fn default_denoiser() -> Self {
        NodeConfig::WaveformDenoiser {
            kernel: default_kernel(),
        }
    }

    /// Resolve the neighborhood map of a sparse extractor.
    pub(crate) fn resolve_sparsity(
        sparsity: &Option<ChannelSparsity>,
        radius_um: Option<f64>,
        info: &RecordingInfo,
    ) -> PipelineResult<ChannelSparsity> {
        match (sparsity, radius_um) {
            (Some(explicit), _) => Ok(explicit.clone()),
            (None, Some(radius)) => {
                let locations = info.channel_locations.as_ref().ok_or_else(|| {
                    PipelineError::InvalidConfig(
                        "radius_um needs channel locations on the recording".to_string(),
                    )
                })?;
                Ok(ChannelSparsity::from_radius(locations, radius))
            }
            (None, None) => Ok(ChannelSparsity::dense(info.num_channels)),
        }
    }
}

/// One node of a [`PipelineSpec`]: parameters plus graph wiring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(flatten)]
    pub config: NodeConfig,

    /// Indices of parent nodes in `PipelineSpec::nodes`
    #[serde(default)]
    pub parents: Vec<usize>,

    #[serde(default = "default_return_output")]
    pub return_output: bool,
}

/// Serializable description of a whole pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

impl PipelineSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node whose output is returned.
    pub fn output(mut self, config: NodeConfig, parents: &[usize]) -> Self {
        self.nodes.push(NodeSpec {
            config,
            parents: parents.to_vec(),
            return_output: true,
        });
        self
    }

    /// Append a node whose output only feeds children.
    pub fn intermediate(mut self, config: NodeConfig, parents: &[usize]) -> Self {
        self.nodes.push(NodeSpec {
            config,
            parents: parents.to_vec(),
            return_output: false,
        });
        self
    }

    /// Instantiate every node against `info`.
    ///
    /// Graph errors (cycles, dangling parents) surface when the pipeline is
    /// compiled, not here.
    pub fn build(&self, info: &RecordingInfo) -> PipelineResult<Pipeline> {
        let mut pipeline = Pipeline::new(info.clone());
        for spec in &self.nodes {
            let parents: Vec<NodeId> = spec.parents.iter().map(|&p| NodeId::from_index(p)).collect();
            pipeline.add_builtin(&spec.config, &parents, spec.return_output)?;
        }
        Ok(pipeline)
    }

    pub fn to_json(&self) -> PipelineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PipelineError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> PipelineResult<Self> {
        serde_json::from_str(json).map_err(|e| PipelineError::Serialization(e.to_string()))
    }
}
