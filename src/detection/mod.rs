//! Threshold peak detection.
//!
//! Peaks are local extrema that cross `detect_threshold` noise levels on
//! their channel. Two methods are available:
//!
//! - [`DetectionMethod::ByChannel`] - each channel is thresholded on its own
//! - [`DetectionMethod::LocallyExclusive`] - a peak must also dominate every
//!   channel in its spatial neighborhood
//!
//! Detection runs through the same chunk scheduler as the peak pipeline, with
//! the trace window widened by the exclusion sweep so that results do not
//! depend on chunk boundaries.

pub mod noise;

pub use noise::{estimate_noise_levels, mad_sigma};

use crate::config::{
    JobConfig, DEFAULT_DETECT_THRESHOLD, DEFAULT_EXCLUDE_SWEEP_MS, DEFAULT_RADIUS_UM,
    NOISE_CHUNK_SIZE, NOISE_NUM_CHUNKS,
};
use crate::error::{Result, SpikeError};
use crate::pipeline::{divide_recording, fetch_widened_traces, run_chunks, ChunkRange};
use crate::recording::{ChannelSparsity, TraceSource};
use crate::types::{Peak, PeakSign};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// How candidate peaks on nearby channels interact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    #[default]
    ByChannel,
    LocallyExclusive,
}

impl DetectionMethod {
    pub fn display_name(&self) -> &'static str {
        match self {
            DetectionMethod::ByChannel => "by_channel",
            DetectionMethod::LocallyExclusive => "locally_exclusive",
        }
    }
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectConfig {
    #[serde(default)]
    pub method: DetectionMethod,

    #[serde(default)]
    pub peak_sign: PeakSign,

    /// Threshold in noise units
    #[serde(default = "default_detect_threshold")]
    pub detect_threshold: f64,

    /// A peak must dominate this many milliseconds on each side
    #[serde(default = "default_exclude_sweep_ms")]
    pub exclude_sweep_ms: f64,

    /// Neighborhood radius for `locally_exclusive`
    #[serde(default = "default_radius_um")]
    pub radius_um: f64,

    /// Per-channel noise; estimated from the recording when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_levels: Option<Vec<f32>>,
}

fn default_detect_threshold() -> f64 {
    DEFAULT_DETECT_THRESHOLD
}

fn default_exclude_sweep_ms() -> f64 {
    DEFAULT_EXCLUDE_SWEEP_MS
}

fn default_radius_um() -> f64 {
    DEFAULT_RADIUS_UM
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            method: DetectionMethod::default(),
            peak_sign: PeakSign::default(),
            detect_threshold: DEFAULT_DETECT_THRESHOLD,
            exclude_sweep_ms: DEFAULT_EXCLUDE_SWEEP_MS,
            radius_um: DEFAULT_RADIUS_UM,
            noise_levels: None,
        }
    }
}

impl DetectConfig {
    pub fn with_method(mut self, method: DetectionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_peak_sign(mut self, peak_sign: PeakSign) -> Self {
        self.peak_sign = peak_sign;
        self
    }

    pub fn with_threshold(mut self, detect_threshold: f64) -> Self {
        self.detect_threshold = detect_threshold;
        self
    }

    pub fn with_noise_levels(mut self, noise_levels: Vec<f32>) -> Self {
        self.noise_levels = Some(noise_levels);
        self
    }
}

/// Read-only parameters shared by every chunk.
struct Detector {
    peak_sign: PeakSign,
    thresholds: Vec<f32>,
    sweep: usize,
    /// `None` for by-channel detection
    neighbors: Option<ChannelSparsity>,
}

impl Detector {
    fn detect_chunk(&self, traces: ArrayView2<f32>, chunk: &ChunkRange) -> Vec<Peak> {
        let mut peaks = Vec::new();
        for local in self.sweep..self.sweep + chunk.len() {
            for (channel, &threshold) in self.thresholds.iter().enumerate() {
                let raw = traces[[local, channel]];
                let value = self.peak_sign.oriented(raw);
                if value <= threshold || !self.dominates(traces, local, channel, value) {
                    continue;
                }
                peaks.push(Peak::new(chunk.start + local - self.sweep, channel, raw));
            }
        }
        peaks
    }

    /// Earlier samples must be strictly smaller, later ones not larger. At
    /// the same sample, lower channels must be strictly smaller.
    fn dominates(&self, traces: ArrayView2<f32>, local: usize, channel: usize, value: f32) -> bool {
        let own = [channel];
        let neighbors = match &self.neighbors {
            Some(map) => map.neighbors(channel),
            None => &own[..],
        };

        for &other in neighbors {
            for dt in 1..=self.sweep {
                if value <= self.peak_sign.oriented(traces[[local - dt, other]]) {
                    return false;
                }
                if value < self.peak_sign.oriented(traces[[local + dt, other]]) {
                    return false;
                }
            }
            if other == channel {
                continue;
            }
            let same = self.peak_sign.oriented(traces[[local, other]]);
            if (other < channel && value <= same) || (other > channel && value < same) {
                return false;
            }
        }
        true
    }
}

/// Detect peaks on a whole recording.
///
/// Output is sorted by sample index, then channel.
pub fn detect_peaks(
    recording: &dyn TraceSource,
    config: &DetectConfig,
    job: &JobConfig,
) -> Result<Vec<Peak>> {
    let info = recording.info();
    if info.num_samples == 0 || info.num_channels == 0 {
        return Err(SpikeError::Detection("recording is empty".to_string()));
    }
    if !(config.detect_threshold.is_finite() && config.detect_threshold > 0.0) {
        return Err(SpikeError::Detection(format!(
            "detect_threshold must be positive, got {}",
            config.detect_threshold
        )));
    }

    let noise_levels = match &config.noise_levels {
        Some(levels) if levels.len() != info.num_channels => {
            return Err(SpikeError::Detection(format!(
                "{} noise levels given for {} channels",
                levels.len(),
                info.num_channels
            )));
        }
        Some(levels) => levels.clone(),
        None => estimate_noise_levels(recording, NOISE_NUM_CHUNKS, NOISE_CHUNK_SIZE)?,
    };
    if noise_levels.iter().any(|&n| n <= 0.0) {
        tracing::warn!("Some channels have zero noise, every deflection there crosses threshold");
    }

    let neighbors = match config.method {
        DetectionMethod::ByChannel => None,
        DetectionMethod::LocallyExclusive => Some(match &info.channel_locations {
            Some(locations) => ChannelSparsity::from_radius(locations, config.radius_um),
            None => {
                tracing::warn!("No channel locations, locally exclusive detection uses all channels");
                ChannelSparsity::dense(info.num_channels)
            }
        }),
    };

    let detector = Detector {
        peak_sign: config.peak_sign,
        thresholds: noise_levels
            .iter()
            .map(|&n| (config.detect_threshold as f32) * n)
            .collect(),
        sweep: info.ms_to_samples(config.exclude_sweep_ms),
        neighbors,
    };

    let chunks = divide_recording(info.num_samples, job.chunk_size(info.sampling_frequency));
    let num_workers = job.resolved_n_jobs().min(chunks.len()).max(1);
    tracing::info!(
        "Detecting peaks ({}, sign {}, threshold {}) on {} chunks with {} workers",
        config.method,
        config.peak_sign,
        config.detect_threshold,
        chunks.len(),
        num_workers
    );

    let per_chunk = run_chunks(&chunks, vec![(); num_workers], job.progress_bar, |_, chunk| {
        let traces = fetch_widened_traces(recording, chunk, detector.sweep)?;
        let peaks = detector.detect_chunk(traces.view(), chunk);
        tracing::debug!("Chunk {}: {} peaks", chunk, peaks.len());
        Ok::<_, SpikeError>(peaks)
    })?;

    let peaks: Vec<Peak> = per_chunk.into_iter().flatten().collect();
    tracing::info!("Detected {} peaks", peaks.len());
    Ok(peaks)
}
