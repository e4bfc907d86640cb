//! Per-channel noise estimation.
//!
//! Noise is the median absolute deviation of the traces, scaled to a Gaussian
//! standard deviation, measured on evenly spaced chunks of the recording.

use crate::config::MAD_SCALE;
use crate::error::{Result, SpikeError};
use crate::recording::TraceSource;
use ndarray::{Array2, ArrayView1};

/// Median of a slice, averaging the two middle values for even lengths.
fn median(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// `median(|x - median(x)|) / MAD_SCALE` of one channel.
pub fn mad_sigma(samples: ArrayView1<f32>) -> f32 {
    let mut values = samples.to_vec();
    let center = median(&mut values);
    let mut deviations: Vec<f32> = values.iter().map(|v| (v - center).abs()).collect();
    median(&mut deviations) / MAD_SCALE as f32
}

/// Start samples of `num_chunks` evenly spaced windows of `chunk_size`.
fn chunk_starts(num_samples: usize, num_chunks: usize, chunk_size: usize) -> Vec<usize> {
    if num_samples <= chunk_size || num_chunks <= 1 {
        return vec![0];
    }
    let span = num_samples - chunk_size;
    let count = num_chunks.min(num_samples / chunk_size).max(1);
    if count == 1 {
        return vec![0];
    }
    (0..count).map(|i| i * span / (count - 1)).collect()
}

/// Estimate one noise level per channel.
pub fn estimate_noise_levels(
    recording: &dyn TraceSource,
    num_chunks: usize,
    chunk_size: usize,
) -> Result<Vec<f32>> {
    let num_samples = recording.num_samples();
    if num_samples == 0 {
        return Err(SpikeError::Detection(
            "cannot estimate noise on an empty recording".to_string(),
        ));
    }
    let chunk_size = chunk_size.clamp(1, num_samples);
    let starts = chunk_starts(num_samples, num_chunks, chunk_size);

    let mut stacked = Array2::<f32>::zeros((starts.len() * chunk_size, recording.num_channels()));
    for (i, &start) in starts.iter().enumerate() {
        let traces = recording.get_traces(start, start + chunk_size, None)?;
        stacked
            .slice_mut(ndarray::s![i * chunk_size..(i + 1) * chunk_size, ..])
            .assign(&traces);
    }

    let levels: Vec<f32> = stacked.columns().into_iter().map(mad_sigma).collect();
    tracing::debug!(
        "Estimated noise on {} chunks of {} samples: {:?}",
        starts.len(),
        chunk_size,
        levels
    );
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::InMemoryRecording;
    use ndarray::array;

    #[test]
    fn test_median() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&mut []), 0.0);
    }

    #[test]
    fn test_mad_sigma() {
        // deviations from the median 0: [1, 1, 0, 1, 1] -> median 1
        let values = array![-1.0f32, 1.0, 0.0, -1.0, 1.0];
        let sigma = mad_sigma(values.view());
        assert!((sigma - 1.0 / MAD_SCALE as f32).abs() < 1e-6);
    }

    #[test]
    fn test_chunk_starts_cover_recording() {
        assert_eq!(chunk_starts(100, 20, 200), vec![0]);
        assert_eq!(chunk_starts(1_000, 3, 100), vec![0, 450, 900]);
        assert_eq!(chunk_starts(250, 20, 100), vec![0, 150]);
    }

    #[test]
    fn test_noise_per_channel() {
        // channel 1 is channel 0 scaled by 3
        let traces = ndarray::Array2::from_shape_fn((4_000, 2), |(t, c)| {
            let base = if t % 2 == 0 { 1.0 } else { -1.0 };
            base * if c == 0 { 1.0 } else { 3.0 }
        });
        let rec = InMemoryRecording::new(traces, 1000.0).unwrap();
        let levels = estimate_noise_levels(&rec, 5, 500).unwrap();
        assert_eq!(levels.len(), 2);
        assert!((levels[1] / levels[0] - 3.0).abs() < 1e-4);
    }
}
