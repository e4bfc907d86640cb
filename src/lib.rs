//! # spike-pipeline: chunked peak pipeline for spike sorting
//!
//! Streams raw multi-channel voltage recordings through a directed graph of
//! feature-extraction nodes, chunk by chunk, across a pool of worker threads.
//! Every node sees the peaks of its chunk, a trace window widened by the
//! pipeline margin and its parents' outputs, so per-peak windows that straddle
//! a chunk edge come out the same as on an unchunked run.
//!
//! ## Architecture
//!
//! - **Recording**: `TraceSource` trait with in-memory and raw binary readers
//! - **Detection**: threshold peak detector with MAD noise estimation
//! - **Pipeline**: node graph, compiler, chunk scheduler and executor
//! - **Curation**: interface to external curation documents
//! - **Runner**: detect, run a pipeline and write the outputs to disk
//!
//! ## Example
//!
//! ```ignore
//! use spike_pipeline::{
//!     config::JobConfig,
//!     detection::{detect_peaks, DetectConfig},
//!     pipeline::{run_peak_pipeline, NodeConfig, PipelineSpec},
//!     recording::{InMemoryRecording, TraceSource},
//! };
//!
//! let recording = InMemoryRecording::new(traces, 32_000.0)?;
//! let job = JobConfig::new("0.5s", 2)?;
//! let peaks = detect_peaks(&recording, &DetectConfig::default(), &job)?;
//!
//! let pipeline = PipelineSpec::new()
//!     .intermediate(NodeConfig::ExtractDenseWaveforms { ms_before: 0.5, ms_after: 1.0 }, &[])
//!     .output(NodeConfig::WaveformRms, &[0])
//!     .build(&recording.info())?;
//!
//! let output = run_peak_pipeline(&recording, &peaks, &pipeline, &job, true)?;
//! ```

pub mod config;
pub mod curation;
pub mod detection;
pub mod error;
pub mod pipeline;
pub mod recording;
pub mod runner;
pub mod types;

// Re-export commonly used types
pub use config::{JobConfig, RunConfig};
pub use detection::{detect_peaks, DetectConfig, DetectionMethod};
pub use error::{Result, SpikeError};
pub use pipeline::{run_peak_pipeline, Pipeline, PipelineOutput, PipelineSpec};
pub use recording::{BinaryRecording, InMemoryRecording, TraceSource};
pub use types::{Peak, PeakSign};
