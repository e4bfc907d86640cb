//! WaveformDenoiser - smooths parent waveforms along the time axis.
//!
//! The kernel is applied as a "same"-mode convolution: the output keeps the
//! input length and is centered on the full convolution, samples outside the
//! window count as zero.

use crate::pipeline::context::{ChunkContext, NodeOutput, OutputType};
use crate::pipeline::error::{PipelineError, PipelineResult};
use ndarray::{Array3, ArrayView3, Ix3};

pub const DEFAULT_DENOISE_KERNEL: [f32; 3] = [0.1, 0.8, 0.1];

#[derive(Debug, Clone)]
pub struct WaveformDenoiser {
    kernel: Vec<f32>,
}

impl WaveformDenoiser {
    pub fn new(kernel: Vec<f32>) -> PipelineResult<Self> {
        if kernel.is_empty() || kernel.iter().any(|k| !k.is_finite()) {
            return Err(PipelineError::InvalidConfig(format!(
                "denoise kernel must be non-empty and finite, got {:?}",
                kernel
            )));
        }
        Ok(Self { kernel })
    }

    pub fn name(&self) -> &str {
        "Waveform Denoiser"
    }

    pub fn kernel(&self) -> &[f32] {
        &self.kernel
    }

    pub fn output_type(&self) -> Option<OutputType> {
        Some(OutputType::dynamic("denoised_waveforms"))
    }

    pub fn compute(&self, _ctx: &ChunkContext, parents: &[&NodeOutput]) -> PipelineResult<NodeOutput> {
        let waveforms = parents
            .first()
            .ok_or_else(|| PipelineError::Compute("denoiser needs a waveform parent".to_string()))?
            .view()
            .into_dimensionality::<Ix3>()
            .map_err(|_| {
                PipelineError::Compute(format!(
                    "denoiser expects (peaks, samples, channels) waveforms, got shape {:?}",
                    parents[0].shape()
                ))
            })?;
        Ok(self.convolve_same(waveforms).into_dyn())
    }

    fn convolve_same(&self, waveforms: ArrayView3<f32>) -> Array3<f32> {
        let (num_peaks, width, num_channels) = waveforms.dim();
        let taps = self.kernel.len();
        let shift = (taps - 1) / 2;
        let mut out = Array3::zeros((num_peaks, width, num_channels));

        for p in 0..num_peaks {
            for t in 0..width {
                for (j, &k) in self.kernel.iter().enumerate() {
                    // out[t] = sum_j x[t + shift - j] * k[j]
                    let Some(src) = (t + shift).checked_sub(j) else {
                        continue;
                    };
                    if src >= width {
                        continue;
                    }
                    for c in 0..num_channels {
                        out[[p, t, c]] += waveforms[[p, src, c]] * k;
                    }
                }
            }
        }
        out
    }
}

impl Default for WaveformDenoiser {
    fn default() -> Self {
        Self {
            kernel: DEFAULT_DENOISE_KERNEL.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    fn denoise(node: &WaveformDenoiser, input: Array3<f32>) -> NodeOutput {
        node.convolve_same(input.view()).into_dyn()
    }

    #[test]
    fn test_impulse_response() {
        let node = WaveformDenoiser::default();
        let mut input = Array3::zeros((1, 5, 1));
        input[[0, 2, 0]] = 10.0;
        let out = denoise(&node, input);
        let column: Vec<f32> = (0..5).map(|t| out[[0, t, 0]]).collect();
        let expected = [0.0, 1.0, 8.0, 1.0, 0.0];
        for (a, b) in column.iter().zip(expected) {
            assert!((a - b).abs() < 1e-6, "{:?}", column);
        }
    }

    #[test]
    fn test_edges_are_zero_padded() {
        let node = WaveformDenoiser::default();
        let input = Array3::from_elem((2, 4, 3), 1.0);
        let out = denoise(&node, input);
        assert_eq!(out.shape(), &[2, 4, 3]);
        assert!((out[[0, 0, 0]] - 0.9).abs() < 1e-6);
        assert!((out[[1, 1, 2]] - 1.0).abs() < 1e-6);
        assert!((out[[1, 3, 1]] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_asymmetric_kernel_is_flipped() {
        // convolution, not correlation: [1, 0] shifts nothing, [0, 1] delays by one
        let node = WaveformDenoiser::new(vec![0.0, 1.0]).unwrap();
        let input = array![[[1.0], [2.0], [3.0]]];
        let out = denoise(&node, input);
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_rejects_bad_kernel() {
        assert!(WaveformDenoiser::new(vec![]).is_err());
        assert!(WaveformDenoiser::new(vec![f32::INFINITY]).is_err());
    }
}
