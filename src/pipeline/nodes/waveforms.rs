//! Waveform extraction nodes.
//!
//! Both nodes cut a `[peak - nbefore, peak + nafter)` window out of the
//! widened chunk traces for every peak. The dense variant keeps every
//! channel, the sparse variant only the peak channel's neighborhood.

use crate::pipeline::context::{ChunkContext, NodeOutput, OutputType};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::recording::{ChannelSparsity, RecordingInfo};
use ndarray::{s, Array3, Axis};

fn window_samples(info: &RecordingInfo, ms_before: f64, ms_after: f64) -> PipelineResult<(usize, usize)> {
    for (label, ms) in [("ms_before", ms_before), ("ms_after", ms_after)] {
        if !(ms.is_finite() && ms >= 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "{} must be a non-negative number of milliseconds, got {}",
                label, ms
            )));
        }
    }
    let (nbefore, nafter) = (info.ms_to_samples(ms_before), info.ms_to_samples(ms_after));
    match nbefore.checked_add(nafter) {
        Some(width) if width <= info.num_samples => Ok((nbefore, nafter)),
        _ => Err(PipelineError::InvalidConfig(format!(
            "waveform window of {} ms + {} ms does not fit in a recording of {} samples",
            ms_before, ms_after, info.num_samples
        ))),
    }
}

/// Per-peak waveforms on every channel: `(n_peaks, nbefore + nafter, n_channels)`.
#[derive(Debug, Clone)]
pub struct ExtractDenseWaveforms {
    ms_before: f64,
    ms_after: f64,
    nbefore: usize,
    nafter: usize,
    num_channels: usize,
}

impl ExtractDenseWaveforms {
    pub fn new(info: &RecordingInfo, ms_before: f64, ms_after: f64) -> PipelineResult<Self> {
        let (nbefore, nafter) = window_samples(info, ms_before, ms_after)?;
        Ok(Self {
            ms_before,
            ms_after,
            nbefore,
            nafter,
            num_channels: info.num_channels,
        })
    }

    pub fn name(&self) -> &str {
        "Extract Dense Waveforms"
    }

    pub fn ms_before(&self) -> f64 {
        self.ms_before
    }

    pub fn ms_after(&self) -> f64 {
        self.ms_after
    }

    pub fn nbefore(&self) -> usize {
        self.nbefore
    }

    pub fn nafter(&self) -> usize {
        self.nafter
    }

    pub fn output_type(&self) -> Option<OutputType> {
        Some(OutputType::array(
            "waveforms",
            vec![self.nbefore + self.nafter, self.num_channels],
        ))
    }

    pub fn trace_margin(&self) -> usize {
        self.nbefore.max(self.nafter)
    }

    pub fn compute(&self, ctx: &ChunkContext, _parents: &[&NodeOutput]) -> PipelineResult<NodeOutput> {
        let width = self.nbefore + self.nafter;
        let mut waveforms = Array3::zeros((ctx.num_peaks(), width, self.num_channels));

        for (mut out, peak) in waveforms.axis_iter_mut(Axis(0)).zip(ctx.peaks) {
            let center = ctx.local_index(peak);
            out.assign(&ctx.traces.slice(s![center - self.nbefore..center + self.nafter, ..]));
        }
        Ok(waveforms.into_dyn())
    }
}

/// Per-peak waveforms restricted to the peak channel's neighbors:
/// `(n_peaks, nbefore + nafter, max_neighbors)`, unused slots zero.
#[derive(Debug, Clone)]
pub struct ExtractSparseWaveforms {
    ms_before: f64,
    ms_after: f64,
    nbefore: usize,
    nafter: usize,
    sparsity: ChannelSparsity,
}

impl ExtractSparseWaveforms {
    pub fn new(
        info: &RecordingInfo,
        ms_before: f64,
        ms_after: f64,
        sparsity: ChannelSparsity,
    ) -> PipelineResult<Self> {
        let (nbefore, nafter) = window_samples(info, ms_before, ms_after)?;
        sparsity
            .validate(info.num_channels)
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            ms_before,
            ms_after,
            nbefore,
            nafter,
            sparsity,
        })
    }

    pub fn name(&self) -> &str {
        "Extract Sparse Waveforms"
    }

    pub fn ms_before(&self) -> f64 {
        self.ms_before
    }

    pub fn ms_after(&self) -> f64 {
        self.ms_after
    }

    pub fn sparsity(&self) -> &ChannelSparsity {
        &self.sparsity
    }

    pub fn output_type(&self) -> Option<OutputType> {
        Some(OutputType::array(
            "sparse_waveforms",
            vec![self.nbefore + self.nafter, self.sparsity.max_neighbors()],
        ))
    }

    pub fn trace_margin(&self) -> usize {
        self.nbefore.max(self.nafter)
    }

    pub fn compute(&self, ctx: &ChunkContext, _parents: &[&NodeOutput]) -> PipelineResult<NodeOutput> {
        let width = self.nbefore + self.nafter;
        let mut waveforms = Array3::zeros((ctx.num_peaks(), width, self.sparsity.max_neighbors()));

        for (mut out, peak) in waveforms.axis_iter_mut(Axis(0)).zip(ctx.peaks) {
            let center = ctx.local_index(peak);
            let window = ctx.traces.slice(s![center - self.nbefore..center + self.nafter, ..]);
            for (slot, &channel) in self.sparsity.neighbors(peak.channel_index).iter().enumerate() {
                out.column_mut(slot).assign(&window.column(channel));
            }
        }
        Ok(waveforms.into_dyn())
    }
}
