//! Node type enumeration for built-in nodes.
//!
//! `NodeType` names every built-in node kind independently of its
//! parameters; it is what `NodeConfig::node_type` reports and what run
//! files spell in their `kind` field.

use serde::{Deserialize, Serialize};

/// Kinds of built-in nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    // Trace readers
    /// Waveform windows on every channel.
    ExtractDenseWaveforms,
    /// Waveform windows on the peak channel's neighborhood.
    ExtractSparseWaveforms,
    /// Absolute amplitude taken from the peak record.
    PeakAmplitude,

    // Waveform transforms
    /// Kernel smoothing along the time axis.
    WaveformDenoiser,
    /// Root mean square over the time axis.
    WaveformRms,
}

impl NodeType {
    /// Get the display name for this node type.
    pub fn display_name(&self) -> &'static str {
        match self {
            NodeType::ExtractDenseWaveforms => "Extract Dense Waveforms",
            NodeType::ExtractSparseWaveforms => "Extract Sparse Waveforms",
            NodeType::PeakAmplitude => "Peak Amplitude",
            NodeType::WaveformDenoiser => "Waveform Denoiser",
            NodeType::WaveformRms => "Waveform RMS",
        }
    }

    /// Get all available node types.
    pub fn all() -> &'static [NodeType] {
        &[
            NodeType::ExtractDenseWaveforms,
            NodeType::ExtractSparseWaveforms,
            NodeType::PeakAmplitude,
            NodeType::WaveformDenoiser,
            NodeType::WaveformRms,
        ]
    }

    /// Number of parents this node type requires.
    pub fn expected_parents(&self) -> usize {
        match self {
            NodeType::ExtractDenseWaveforms
            | NodeType::ExtractSparseWaveforms
            | NodeType::PeakAmplitude => 0,
            NodeType::WaveformDenoiser | NodeType::WaveformRms => 1,
        }
    }

    /// Check if this node type reads raw traces rather than parent outputs.
    pub fn is_trace_reader(&self) -> bool {
        self.expected_parents() == 0
    }

    /// Get a detailed description of what this node does.
    pub fn description(&self) -> &'static str {
        match self {
            NodeType::ExtractDenseWaveforms =>
                "Cuts [peak - ms_before, peak + ms_after) on all channels.\n\
                 Output: (n_peaks, n_samples, n_channels).",

            NodeType::ExtractSparseWaveforms =>
                "Cuts the same window on the peak channel's neighbors only.\n\
                 Output: (n_peaks, n_samples, max_neighbors), zero-padded.",

            NodeType::PeakAmplitude =>
                "Absolute value of each peak's detected amplitude.\n\
                 Output: (n_peaks,).",

            NodeType::WaveformDenoiser =>
                "Convolves parent waveforms with a short kernel over time.\n\
                 Output keeps the parent shape.",

            NodeType::WaveformRms =>
                "Root mean square of parent waveforms over time.\n\
                 Output: (n_peaks, n_channels).",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&NodeType::ExtractDenseWaveforms).unwrap(),
            "\"extract_dense_waveforms\""
        );
        let parsed: NodeType = serde_json::from_str("\"waveform_rms\"").unwrap();
        assert_eq!(parsed, NodeType::WaveformRms);
    }

    #[test]
    fn test_parent_requirements() {
        let readers: Vec<_> = NodeType::all()
            .iter()
            .filter(|t| t.is_trace_reader())
            .collect();
        assert_eq!(readers.len(), 3);
        assert_eq!(NodeType::WaveformDenoiser.expected_parents(), 1);
        assert_eq!(NodeType::PeakAmplitude.to_string(), "Peak Amplitude");
    }
}
