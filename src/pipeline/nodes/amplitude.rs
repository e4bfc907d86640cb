//! PeakAmplitudeNode - absolute detected amplitude per peak.

use crate::pipeline::context::{ChunkContext, NodeOutput, OutputType};
use crate::pipeline::error::PipelineResult;
use ndarray::Array1;

/// Emits `|peak.amplitude|` for every peak. Needs no trace context.
#[derive(Debug, Clone, Default)]
pub struct PeakAmplitudeNode;

impl PeakAmplitudeNode {
    pub fn new() -> Self {
        Self
    }

    pub fn name(&self) -> &str {
        "Peak Amplitude"
    }

    pub fn output_type(&self) -> Option<OutputType> {
        Some(OutputType::scalar("abs_amplitude"))
    }

    pub fn compute(&self, ctx: &ChunkContext, _parents: &[&NodeOutput]) -> PipelineResult<NodeOutput> {
        let amplitudes: Array1<f32> = ctx.peaks.iter().map(|p| p.amplitude.abs()).collect();
        Ok(amplitudes.into_dyn())
    }
}
