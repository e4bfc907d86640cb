//! Job-distribution settings shared by detection and the peak pipeline.
//!
//! # Chunk sizes
//!
//! `chunk_duration` accepts:
//!
//! - `"0.5s"` / `"1.2s"` - seconds
//! - `"500ms"` - milliseconds
//! - `30000` (a bare integer) - samples
//!
//! # Worker count
//!
//! `n_jobs = -1` uses every available core, other negative values leave
//! `|n_jobs| - 1` cores free, and `0` is treated as `1`.

use crate::config::{DEFAULT_CHUNK_DURATION_S, DEFAULT_N_JOBS};
use crate::error::{Result, SpikeError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Size of one unit of chunked work.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawChunkSpec", into = "RawChunkSpec")]
pub enum ChunkSpec {
    Seconds(f64),
    Samples(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawChunkSpec {
    Samples(usize),
    Text(String),
}

impl TryFrom<RawChunkSpec> for ChunkSpec {
    type Error = String;

    fn try_from(raw: RawChunkSpec) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawChunkSpec::Samples(0) => Err("chunk size must be at least one sample".to_string()),
            RawChunkSpec::Samples(n) => Ok(ChunkSpec::Samples(n)),
            RawChunkSpec::Text(text) => text.parse().map_err(|e: SpikeError| e.to_string()),
        }
    }
}

impl From<ChunkSpec> for RawChunkSpec {
    fn from(spec: ChunkSpec) -> Self {
        match spec {
            ChunkSpec::Seconds(s) => RawChunkSpec::Text(format!("{}s", s)),
            ChunkSpec::Samples(n) => RawChunkSpec::Samples(n),
        }
    }
}

impl FromStr for ChunkSpec {
    type Err = SpikeError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let invalid = || SpikeError::Config(format!("invalid chunk_duration {:?}", s));

        let seconds = if let Some(ms) = text.strip_suffix("ms") {
            ms.trim().parse::<f64>().map_err(|_| invalid())? / 1000.0
        } else if let Some(sec) = text.strip_suffix('s') {
            sec.trim().parse::<f64>().map_err(|_| invalid())?
        } else {
            let samples = text.parse::<usize>().map_err(|_| invalid())?;
            if samples == 0 {
                return Err(invalid());
            }
            return Ok(ChunkSpec::Samples(samples));
        };

        if !(seconds.is_finite() && seconds > 0.0) {
            return Err(invalid());
        }
        Ok(ChunkSpec::Seconds(seconds))
    }
}

impl ChunkSpec {
    /// Chunk length in samples at the given sampling rate (never zero).
    pub fn to_samples(&self, sampling_frequency: f64) -> usize {
        match *self {
            ChunkSpec::Samples(n) => n.max(1),
            ChunkSpec::Seconds(s) => ((s * sampling_frequency).round() as usize).max(1),
        }
    }
}

impl Default for ChunkSpec {
    fn default() -> Self {
        ChunkSpec::Seconds(DEFAULT_CHUNK_DURATION_S)
    }
}

/// How work is split into chunks and spread over workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub chunk_duration: ChunkSpec,

    #[serde(default = "default_n_jobs")]
    pub n_jobs: i32,

    /// Log progress at roughly every tenth of the chunks
    #[serde(default)]
    pub progress_bar: bool,
}

fn default_n_jobs() -> i32 {
    DEFAULT_N_JOBS
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            chunk_duration: ChunkSpec::default(),
            n_jobs: DEFAULT_N_JOBS,
            progress_bar: false,
        }
    }
}

impl JobConfig {
    pub fn new(chunk_duration: &str, n_jobs: i32) -> Result<Self> {
        Ok(Self {
            chunk_duration: chunk_duration.parse()?,
            n_jobs,
            progress_bar: false,
        })
    }

    pub fn with_progress_bar(mut self, progress_bar: bool) -> Self {
        self.progress_bar = progress_bar;
        self
    }

    pub fn chunk_size(&self, sampling_frequency: f64) -> usize {
        self.chunk_duration.to_samples(sampling_frequency)
    }

    /// Number of worker threads to use on this machine.
    pub fn resolved_n_jobs(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1) as i64;
        let n = match self.n_jobs as i64 {
            0 => 1,
            -1 => cores,
            n if n < 0 => cores + 1 + n,
            n => n,
        };
        n.max(1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chunk_spellings() {
        assert_eq!("0.5s".parse::<ChunkSpec>().unwrap(), ChunkSpec::Seconds(0.5));
        assert_eq!("250ms".parse::<ChunkSpec>().unwrap(), ChunkSpec::Seconds(0.25));
        assert_eq!("30000".parse::<ChunkSpec>().unwrap(), ChunkSpec::Samples(30_000));
        assert!("fast".parse::<ChunkSpec>().is_err());
        assert!("0s".parse::<ChunkSpec>().is_err());
        assert!("0".parse::<ChunkSpec>().is_err());
        assert!("-1s".parse::<ChunkSpec>().is_err());
    }

    #[test]
    fn test_chunk_to_samples() {
        assert_eq!(ChunkSpec::Seconds(0.5).to_samples(32_000.0), 16_000);
        assert_eq!(ChunkSpec::Samples(128).to_samples(32_000.0), 128);
        assert_eq!(ChunkSpec::Seconds(1e-9).to_samples(1000.0), 1);
    }

    #[test]
    fn test_job_config_serde() {
        let job: JobConfig =
            serde_json::from_str(r#"{"chunk_duration": "0.5s", "n_jobs": 2}"#).unwrap();
        assert_eq!(job.chunk_duration, ChunkSpec::Seconds(0.5));
        assert_eq!(job.n_jobs, 2);
        assert!(!job.progress_bar);

        let samples: JobConfig = serde_json::from_str(r#"{"chunk_duration": 1000}"#).unwrap();
        assert_eq!(samples.chunk_duration, ChunkSpec::Samples(1000));
        assert_eq!(samples.n_jobs, DEFAULT_N_JOBS);

        let json = serde_json::to_string(&job).unwrap();
        let back: JobConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);

        assert!(serde_json::from_str::<JobConfig>(r#"{"chunk_duration": "soon"}"#).is_err());
    }

    #[test]
    fn test_resolved_n_jobs() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let job = |n| JobConfig {
            n_jobs: n,
            ..Default::default()
        };
        assert_eq!(job(0).resolved_n_jobs(), 1);
        assert_eq!(job(3).resolved_n_jobs(), 3);
        assert_eq!(job(-1).resolved_n_jobs(), cores);
        assert_eq!(job(-1000).resolved_n_jobs(), 1);
    }
}
