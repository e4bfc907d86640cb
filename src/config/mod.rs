//! Configuration module for spike-pipeline
//!
//! This module handles run configuration including:
//! - Job distribution (chunk size, worker count, progress logging)
//! - Run files that bundle a recording, detection settings and a pipeline
//! - Shared defaults used across detection and the executor
//!
//! # Files
//!
//! Run files are TOML when the extension is `.toml`, JSON otherwise.
//!
//! ```toml
//! output_folder = "out"
//!
//! [recording]
//! path = "raw.bin"
//! num_channels = 32
//! sampling_frequency = 32000.0
//! dtype = "int16"
//!
//! [job]
//! chunk_duration = "0.5s"
//! n_jobs = 2
//!
//! [detection]
//! method = "locally_exclusive"
//! peak_sign = "neg"
//! detect_threshold = 5.0
//! exclude_sweep_ms = 0.1
//!
//! [[pipeline.nodes]]
//! kind = "extract_dense_waveforms"
//! ms_before = 0.5
//! ms_after = 1.0
//! return_output = false
//!
//! [[pipeline.nodes]]
//! kind = "waveform_rms"
//! parents = [0]
//! ```

pub mod job;

pub use job::{ChunkSpec, JobConfig};

use crate::detection::DetectConfig;
use crate::error::{Result, SpikeError};
use crate::pipeline::PipelineSpec;
use crate::recording::binary::BinaryRecordingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default chunk duration in seconds
pub const DEFAULT_CHUNK_DURATION_S: f64 = 1.0;

/// Default number of worker threads
pub const DEFAULT_N_JOBS: i32 = 1;

/// Default detection threshold in noise (MAD) units
pub const DEFAULT_DETECT_THRESHOLD: f64 = 5.0;

/// Default temporal exclusion window around a peak, in milliseconds
pub const DEFAULT_EXCLUDE_SWEEP_MS: f64 = 0.1;

/// Default neighborhood radius for locally exclusive detection, in micrometres
pub const DEFAULT_RADIUS_UM: f64 = 50.0;

/// Number of chunks sampled when estimating noise levels
pub const NOISE_NUM_CHUNKS: usize = 20;

/// Length in samples of each chunk sampled for noise estimation
pub const NOISE_CHUNK_SIZE: usize = 10_000;

/// MAD to Gaussian sigma conversion factor
pub const MAD_SCALE: f64 = 0.674_489_750_196_081_7;

/// Manifest written next to pipeline outputs
pub const OUTPUT_MANIFEST_FILE: &str = "manifest.json";

/// Peak list written next to pipeline outputs
pub const PEAKS_FILE: &str = "peaks.json";

/// Everything needed to run detection and a peak pipeline on a binary file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub recording: BinaryRecordingConfig,

    #[serde(default)]
    pub detection: DetectConfig,

    #[serde(default)]
    pub job: JobConfig,

    pub pipeline: PipelineSpec,

    /// Folder receiving the peak list, node outputs and manifest
    pub output_folder: PathBuf,
}

impl RunConfig {
    /// Load a run file from disk (TOML or JSON by extension).
    ///
    /// Relative recording and output paths are resolved against the run
    /// file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SpikeError::Config(format!("Failed to read run file {:?}: {}", path, e))
        })?;

        let mut config: RunConfig = if is_toml(path) {
            toml::from_str(&content).map_err(|e| {
                SpikeError::Config(format!("Failed to parse run file {:?}: {}", path, e))
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| {
                SpikeError::Config(format!("Failed to parse run file {:?}: {}", path, e))
            })?
        };

        if let Some(base) = path.parent() {
            config.resolve_relative_paths(base);
        }
        Ok(config)
    }

    /// Save the run file to disk (TOML or JSON by extension).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self).map_err(|e| {
                SpikeError::Serialization(format!("Failed to serialize run file: {}", e))
            })?
        } else {
            serde_json::to_string_pretty(self).map_err(|e| {
                SpikeError::Serialization(format!("Failed to serialize run file: {}", e))
            })?
        };

        std::fs::write(path, content)
            .map_err(|e| SpikeError::Config(format!("Failed to write run file {:?}: {}", path, e)))
    }

    fn resolve_relative_paths(&mut self, base: &Path) {
        if self.recording.path.is_relative() {
            self.recording.path = base.join(&self.recording.path);
        }
        if self.output_folder.is_relative() {
            self.output_folder = base.join(&self.output_folder);
        }
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"))
}
