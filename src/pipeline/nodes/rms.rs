//! WaveformRms - per-channel root mean square of parent waveforms.

use crate::pipeline::context::{ChunkContext, NodeOutput, OutputType};
use crate::pipeline::error::{PipelineError, PipelineResult};
use ndarray::{Array2, Axis, Ix3};

/// Collapses `(n_peaks, n_samples, n_channels)` waveforms to
/// `(n_peaks, n_channels)` by taking the RMS over time.
#[derive(Debug, Clone, Default)]
pub struct WaveformRms;

impl WaveformRms {
    pub fn new() -> Self {
        Self
    }

    pub fn name(&self) -> &str {
        "Waveform RMS"
    }

    pub fn output_type(&self) -> Option<OutputType> {
        Some(OutputType::dynamic("rms"))
    }

    pub fn compute(&self, _ctx: &ChunkContext, parents: &[&NodeOutput]) -> PipelineResult<NodeOutput> {
        let parent = parents
            .first()
            .ok_or_else(|| PipelineError::Compute("rms needs a waveform parent".to_string()))?;
        let waveforms = parent.view().into_dimensionality::<Ix3>().map_err(|_| {
            PipelineError::Compute(format!(
                "rms expects (peaks, samples, channels) waveforms, got shape {:?}",
                parent.shape()
            ))
        })?;

        let (num_peaks, _, num_channels) = waveforms.dim();
        let rms = waveforms
            .mapv(|v| v * v)
            .mean_axis(Axis(1))
            .map(|mean| mean.mapv(f32::sqrt))
            .unwrap_or_else(|| Array2::zeros((num_peaks, num_channels)));
        Ok(rms.into_dyn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::chunking::ChunkRange;
    use crate::recording::{RecordingInfo, SampleDtype};
    use ndarray::{array, Array3};

    fn run(input: Array3<f32>) -> NodeOutput {
        let info = RecordingInfo {
            num_channels: input.dim().2,
            num_samples: 10,
            sampling_frequency: 1000.0,
            dtype: SampleDtype::Float32,
            channel_locations: None,
        };
        let traces = Array2::zeros((10, input.dim().2));
        let ctx = ChunkContext {
            traces: traces.view(),
            peaks: &[],
            chunk: ChunkRange {
                index: 0,
                start: 0,
                end: 10,
            },
            margin: 0,
            info: &info,
        };
        let parent = input.into_dyn();
        WaveformRms::new().compute(&ctx, &[&parent]).unwrap()
    }

    #[test]
    fn test_rms_per_channel() {
        let input = array![[[3.0, 1.0], [-3.0, 1.0], [3.0, -1.0], [-3.0, -1.0]]];
        let out = run(input);
        assert_eq!(out.shape(), &[1, 2]);
        assert!((out[[0, 0]] - 3.0).abs() < 1e-6);
        assert!((out[[0, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_length_windows() {
        let out = run(Array3::zeros((2, 0, 3)));
        assert_eq!(out.shape(), &[2, 3]);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_rejects_flat_parent() {
        let info = RecordingInfo {
            num_channels: 1,
            num_samples: 10,
            sampling_frequency: 1000.0,
            dtype: SampleDtype::Float32,
            channel_locations: None,
        };
        let traces = Array2::zeros((10, 1));
        let ctx = ChunkContext {
            traces: traces.view(),
            peaks: &[],
            chunk: ChunkRange {
                index: 0,
                start: 0,
                end: 10,
            },
            margin: 0,
            info: &info,
        };
        let flat = ndarray::Array1::<f32>::zeros(4).into_dyn();
        assert!(matches!(
            WaveformRms::new().compute(&ctx, &[&flat]),
            Err(PipelineError::Compute(_))
        ));
    }
}
