//! Trace sources: random-access multi-channel voltage reads.
//!
//! The peak pipeline never owns raw data. It reads `(time, channel)` windows
//! through the [`TraceSource`] trait and passes a [`RecordingInfo`] snapshot
//! into node constructors so nodes can convert milliseconds into samples.
//!
//! # Implementations
//!
//! - [`InMemoryRecording`] - an owned `(time, channel)` array, mostly for tests
//! - [`BinaryRecording`] - a flat interleaved little-endian file on disk
//!
//! All sources return `f32` traces regardless of their native sample type;
//! [`TraceSource::dtype`] reports the native type.

pub mod binary;
pub mod sparsity;

pub use binary::BinaryRecording;
pub use sparsity::ChannelSparsity;

use crate::error::{Result, SpikeError};
use ndarray::{s, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Native sample type of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleDtype {
    Int16,
    UInt16,
    Int32,
    #[default]
    Float32,
    Float64,
}

impl SampleDtype {
    /// Size of one sample in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            SampleDtype::Int16 | SampleDtype::UInt16 => 2,
            SampleDtype::Int32 | SampleDtype::Float32 => 4,
            SampleDtype::Float64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SampleDtype::Int16 => "int16",
            SampleDtype::UInt16 => "uint16",
            SampleDtype::Int32 => "int32",
            SampleDtype::Float32 => "float32",
            SampleDtype::Float64 => "float64",
        }
    }

    /// Decode one little-endian sample. `bytes` must hold exactly `size_bytes()`.
    pub fn decode_le(self, bytes: &[u8]) -> f32 {
        match self {
            SampleDtype::Int16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            SampleDtype::UInt16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            SampleDtype::Int32 => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32
            }
            SampleDtype::Float32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            SampleDtype::Float64 => f64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]) as f32,
        }
    }
}

impl std::fmt::Display for SampleDtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Shape and dtype metadata of a recording, handed to node constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub num_channels: usize,
    pub num_samples: usize,
    pub sampling_frequency: f64,
    pub dtype: SampleDtype,
    /// Probe-plane positions in micrometres, one per channel
    #[serde(default)]
    pub channel_locations: Option<Vec<[f64; 2]>>,
}

impl RecordingInfo {
    /// Convert a duration in milliseconds into a whole number of samples.
    pub fn ms_to_samples(&self, ms: f64) -> usize {
        (ms * self.sampling_frequency / 1000.0).round().max(0.0) as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        self.num_samples as f64 / self.sampling_frequency
    }
}

/// Random-access multi-channel trace reader.
///
/// Implementations must be shareable across worker threads; every read is
/// independent and takes `&self`.
pub trait TraceSource: Send + Sync {
    fn num_channels(&self) -> usize;

    fn num_samples(&self) -> usize;

    fn sampling_frequency(&self) -> f64;

    fn dtype(&self) -> SampleDtype;

    /// Probe-plane channel positions in micrometres, if known.
    fn channel_locations(&self) -> Option<Vec<[f64; 2]>> {
        None
    }

    /// Read samples `[start, end)` as a `(end - start, channels)` array.
    ///
    /// `channel_ids` selects and orders columns; `None` means all channels.
    /// Reads must lie inside `[0, num_samples)`; callers clip beforehand.
    fn get_traces(
        &self,
        start: usize,
        end: usize,
        channel_ids: Option<&[usize]>,
    ) -> Result<Array2<f32>>;

    /// Snapshot of the recording metadata.
    fn info(&self) -> RecordingInfo {
        RecordingInfo {
            num_channels: self.num_channels(),
            num_samples: self.num_samples(),
            sampling_frequency: self.sampling_frequency(),
            dtype: self.dtype(),
            channel_locations: self.channel_locations(),
        }
    }
}

/// Validate a read request against a recording's bounds.
pub fn check_read_range(
    num_samples: usize,
    num_channels: usize,
    start: usize,
    end: usize,
    channel_ids: Option<&[usize]>,
) -> Result<()> {
    if start > end || end > num_samples {
        return Err(SpikeError::Recording(format!(
            "read range [{}, {}) outside recording of {} samples",
            start, end, num_samples
        )));
    }
    if let Some(ids) = channel_ids {
        if let Some(&bad) = ids.iter().find(|&&c| c >= num_channels) {
            return Err(SpikeError::Recording(format!(
                "channel {} out of range ({} channels)",
                bad, num_channels
            )));
        }
    }
    Ok(())
}

/// A recording held entirely in memory as a `(time, channel)` array.
#[derive(Debug, Clone)]
pub struct InMemoryRecording {
    traces: Array2<f32>,
    sampling_frequency: f64,
    dtype: SampleDtype,
    channel_locations: Option<Vec<[f64; 2]>>,
}

impl InMemoryRecording {
    pub fn new(traces: Array2<f32>, sampling_frequency: f64) -> Result<Self> {
        if !(sampling_frequency.is_finite() && sampling_frequency > 0.0) {
            return Err(SpikeError::Recording(format!(
                "sampling frequency must be positive, got {}",
                sampling_frequency
            )));
        }
        Ok(Self {
            traces,
            sampling_frequency,
            dtype: SampleDtype::Float32,
            channel_locations: None,
        })
    }

    /// Report a different native dtype (the data itself stays `f32`).
    pub fn with_dtype(mut self, dtype: SampleDtype) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn with_channel_locations(mut self, locations: Vec<[f64; 2]>) -> Result<Self> {
        if locations.len() != self.traces.ncols() {
            return Err(SpikeError::Recording(format!(
                "{} channel locations given for {} channels",
                locations.len(),
                self.traces.ncols()
            )));
        }
        self.channel_locations = Some(locations);
        Ok(self)
    }

    pub fn traces(&self) -> &Array2<f32> {
        &self.traces
    }
}

impl TraceSource for InMemoryRecording {
    fn num_channels(&self) -> usize {
        self.traces.ncols()
    }

    fn num_samples(&self) -> usize {
        self.traces.nrows()
    }

    fn sampling_frequency(&self) -> f64 {
        self.sampling_frequency
    }

    fn dtype(&self) -> SampleDtype {
        self.dtype
    }

    fn channel_locations(&self) -> Option<Vec<[f64; 2]>> {
        self.channel_locations.clone()
    }

    fn get_traces(
        &self,
        start: usize,
        end: usize,
        channel_ids: Option<&[usize]>,
    ) -> Result<Array2<f32>> {
        check_read_range(
            self.num_samples(),
            self.num_channels(),
            start,
            end,
            channel_ids,
        )?;
        let window = self.traces.slice(s![start..end, ..]);
        Ok(match channel_ids {
            Some(ids) => window.select(Axis(1), ids),
            None => window.to_owned(),
        })
    }
}
