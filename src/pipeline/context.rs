//! Per-chunk evaluation context and node output descriptors.

use crate::pipeline::chunking::ChunkRange;
use crate::recording::RecordingInfo;
use crate::types::Peak;
use ndarray::{ArrayD, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output of one node for one chunk. Axis 0 is always the peak axis.
pub type NodeOutput = ArrayD<f32>;

/// Shape contributed by each peak, i.e. the output shape minus the peak axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementShape {
    /// Known up front. An empty shape means one scalar per peak.
    Fixed(Vec<usize>),
    /// Depends on the parents; only checked for consistency across chunks.
    Dynamic,
}

/// Name and per-peak shape of a node's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputType {
    pub name: String,
    pub element_shape: ElementShape,
}

impl OutputType {
    /// One value per peak.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            element_shape: ElementShape::Fixed(Vec::new()),
        }
    }

    pub fn array(name: impl Into<String>, shape: impl Into<Vec<usize>>) -> Self {
        Self {
            name: name.into(),
            element_shape: ElementShape::Fixed(shape.into()),
        }
    }

    pub fn dynamic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            element_shape: ElementShape::Dynamic,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(&self.element_shape, ElementShape::Fixed(shape) if shape.is_empty())
    }

    /// Whether an output array of `shape` (peak axis included) fits this type.
    pub fn accepts(&self, num_peaks: usize, shape: &[usize]) -> bool {
        match shape.split_first() {
            Some((&rows, rest)) if rows == num_peaks => match &self.element_shape {
                ElementShape::Fixed(expected) => rest == expected.as_slice(),
                ElementShape::Dynamic => true,
            },
            _ => false,
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.element_shape {
            ElementShape::Fixed(shape) => write!(f, "{} (n_peaks, {:?})", self.name, shape),
            ElementShape::Dynamic => write!(f, "{} (n_peaks, ...)", self.name),
        }
    }
}

/// Everything a node sees while computing one chunk.
pub struct ChunkContext<'a> {
    /// Widened traces: `(chunk.len() + 2 * margin, num_channels)`
    pub traces: ArrayView2<'a, f32>,
    /// Peaks inside the chunk, in input order
    pub peaks: &'a [Peak],
    pub chunk: ChunkRange,
    /// Samples of context on each side of the chunk
    pub margin: usize,
    pub info: &'a RecordingInfo,
}

impl<'a> ChunkContext<'a> {
    #[inline]
    pub fn num_peaks(&self) -> usize {
        self.peaks.len()
    }

    /// Row of `traces` holding the sample of `peak`.
    #[inline]
    pub fn local_index(&self, peak: &Peak) -> usize {
        peak.sample_index + self.margin - self.chunk.start
    }
}
