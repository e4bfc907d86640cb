//! Pipeline-specific error types.

use crate::pipeline::chunking::ChunkRange;
use crate::pipeline::id::NodeId;
use thiserror::Error;

/// Errors that can occur while building or running a peak pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Raised by a node's `compute`
    #[error("Compute error: {0}")]
    Compute(String),

    #[error("Node {node:?} '{name}' failed on chunk {chunk}: {source}")]
    ChunkFailed {
        node: NodeId,
        name: String,
        chunk: ChunkRange,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Failed to read traces for chunk {chunk}: {message}")]
    TraceFetch { chunk: ChunkRange, message: String },

    #[error("Node {node:?} references missing parent {parent:?}")]
    DanglingParent { node: NodeId, parent: NodeId },

    #[error("Node {0:?} lists itself as a parent")]
    SelfParent(NodeId),

    #[error("Node {node:?} '{name}' expects {expected} parent(s), got {actual}")]
    ParentCount {
        node: NodeId,
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Cycle detected in pipeline graph between: {}", .0.join(", "))]
    CycleDetected(Vec<String>),

    #[error("Pipeline has no nodes")]
    EmptyPipeline,

    #[error("Pipeline has no node returning output")]
    NoOutputs,

    #[error("Node {node:?} '{name}' returns output but declares no output type")]
    MissingOutputType { node: NodeId, name: String },

    #[error("Output '{name}' has shape {actual:?}, expected {expected}")]
    OutputShape {
        name: String,
        expected: String,
        actual: Vec<usize>,
    },

    #[error("Invalid node configuration: {0}")]
    InvalidConfig(String),

    #[error("Node configuration serialization failed: {0}")]
    Serialization(String),

    #[error("Peaks are not sorted by sample index (first offender at position {index})")]
    UnsortedPeaks { index: usize },

    #[error("Peak {index} is on channel {channel}, recording has {num_channels} channels")]
    PeakChannelOutOfRange {
        index: usize,
        channel: usize,
        num_channels: usize,
    },

    #[error("Peak {index} at sample {sample} lies outside recording of {num_samples} samples")]
    PeakOutOfRange {
        index: usize,
        sample: usize,
        num_samples: usize,
    },

    #[error("Recording has no samples")]
    EmptyRecording,

    #[error("Worker thread exited without reporting its results")]
    WorkerLost,
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
