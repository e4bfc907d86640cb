//! Test data builders for creating recordings with known spikes

use ndarray::Array2;
use spike_pipeline::InMemoryRecording;

/// Builder for synthetic recordings: uniform noise plus injected spikes.
///
/// Spikes are negative-going, peak on their channel and bleed at reduced
/// amplitude onto the adjacent channels.
pub struct RecordingBuilder {
    num_channels: usize,
    duration_s: f64,
    sampling_frequency: f64,
    noise_amplitude: f32,
    spike_amplitude: f32,
    spike_interval_ms: f64,
    seed: u64,
    spaced_locations: bool,
}

impl RecordingBuilder {
    pub fn new(num_channels: usize, duration_s: f64) -> Self {
        Self {
            num_channels,
            duration_s,
            sampling_frequency: 10_000.0,
            noise_amplitude: 1.0,
            spike_amplitude: 20.0,
            spike_interval_ms: 25.0,
            seed: 42,
            spaced_locations: false,
        }
    }

    pub fn sampling_frequency(mut self, sampling_frequency: f64) -> Self {
        self.sampling_frequency = sampling_frequency;
        self
    }

    pub fn noise_amplitude(mut self, noise_amplitude: f32) -> Self {
        self.noise_amplitude = noise_amplitude;
        self
    }

    pub fn spike_amplitude(mut self, spike_amplitude: f32) -> Self {
        self.spike_amplitude = spike_amplitude;
        self
    }

    pub fn spike_interval_ms(mut self, spike_interval_ms: f64) -> Self {
        self.spike_interval_ms = spike_interval_ms;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Place channels on a line, 20 um apart
    pub fn with_locations(mut self) -> Self {
        self.spaced_locations = true;
        self
    }

    pub fn num_samples(&self) -> usize {
        (self.duration_s * self.sampling_frequency).round() as usize
    }

    /// `(sample, channel)` of every injected spike, in sample order
    pub fn spike_times(&self) -> Vec<(usize, usize)> {
        let step = ((self.spike_interval_ms * self.sampling_frequency / 1000.0).round() as usize).max(4);
        (step..self.num_samples().saturating_sub(2))
            .step_by(step)
            .enumerate()
            .map(|(i, t)| (t, i % self.num_channels))
            .collect()
    }

    pub fn traces(&self) -> Array2<f32> {
        let mut state = self.seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        let mut traces = Array2::from_shape_fn((self.num_samples(), self.num_channels), |_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            (2.0 * unit - 1.0) * self.noise_amplitude
        });

        let amp = self.spike_amplitude;
        for (t, c) in self.spike_times() {
            traces[[t - 1, c]] -= 0.3 * amp;
            traces[[t, c]] -= amp;
            traces[[t + 1, c]] -= 0.5 * amp;
            for n in [c.wrapping_sub(1), c + 1] {
                if n < self.num_channels {
                    traces[[t, n]] -= 0.4 * amp;
                }
            }
        }
        traces
    }

    pub fn build(self) -> InMemoryRecording {
        let recording = InMemoryRecording::new(self.traces(), self.sampling_frequency)
            .expect("valid sampling frequency");
        if self.spaced_locations {
            let locations = (0..self.num_channels).map(|c| [0.0, 20.0 * c as f64]).collect();
            recording
                .with_channel_locations(locations)
                .expect("one location per channel")
        } else {
            recording
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spike_pipeline::TraceSource;

    #[test]
    fn test_recording_builder() {
        let builder = RecordingBuilder::new(4, 0.5).spike_interval_ms(10.0);
        let spikes = builder.spike_times();
        assert_eq!(spikes[0], (100, 0));
        assert_eq!(spikes[1], (200, 1));

        let rec = builder.with_locations().build();
        assert_eq!(rec.num_samples(), 5_000);
        assert_eq!(rec.num_channels(), 4);
        assert!(rec.traces()[[100, 0]] < -19.0);
        assert!(rec.channel_locations().is_some());
    }
}
