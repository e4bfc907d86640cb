//! Flat interleaved binary recordings.
//!
//! Samples are stored time-major: `t0c0 t0c1 ... t0cN t1c0 ...`, little-endian,
//! optionally after a fixed header of `file_offset` bytes.

use crate::error::{Result, SpikeError};
use crate::recording::{check_read_range, SampleDtype, TraceSource};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Description of a raw binary recording on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryRecordingConfig {
    pub path: PathBuf,
    pub num_channels: usize,
    pub sampling_frequency: f64,
    #[serde(default)]
    pub dtype: SampleDtype,
    /// Header bytes to skip before the first sample
    #[serde(default)]
    pub file_offset: u64,
    /// Probe-plane channel positions in micrometres
    #[serde(default)]
    pub channel_locations: Option<Vec<[f64; 2]>>,
}

/// Trace source backed by a raw binary file.
///
/// Each read opens its own file handle, so concurrent workers never share a
/// cursor.
#[derive(Debug, Clone)]
pub struct BinaryRecording {
    path: PathBuf,
    num_channels: usize,
    num_samples: usize,
    sampling_frequency: f64,
    dtype: SampleDtype,
    file_offset: u64,
    channel_locations: Option<Vec<[f64; 2]>>,
}

impl BinaryRecording {
    pub fn open(config: &BinaryRecordingConfig) -> Result<Self> {
        if config.num_channels == 0 {
            return Err(SpikeError::Recording(
                "binary recording needs at least one channel".to_string(),
            ));
        }
        if !(config.sampling_frequency.is_finite() && config.sampling_frequency > 0.0) {
            return Err(SpikeError::Recording(format!(
                "sampling frequency must be positive, got {}",
                config.sampling_frequency
            )));
        }

        if let Some(locations) = &config.channel_locations {
            if locations.len() != config.num_channels {
                return Err(SpikeError::Recording(format!(
                    "{} channel locations given for {} channels",
                    locations.len(),
                    config.num_channels
                )));
            }
        }

        let file_len = std::fs::metadata(&config.path)
            .map_err(|e| {
                SpikeError::Recording(format!("cannot stat {:?}: {}", config.path, e))
            })?
            .len();
        let payload = file_len.checked_sub(config.file_offset).ok_or_else(|| {
            SpikeError::Recording(format!(
                "file offset {} exceeds file size {} of {:?}",
                config.file_offset, file_len, config.path
            ))
        })?;

        let frame_bytes = (config.dtype.size_bytes() * config.num_channels) as u64;
        let num_samples = (payload / frame_bytes) as usize;
        if payload % frame_bytes != 0 {
            tracing::warn!(
                "{:?}: {} trailing bytes ignored (not a whole frame of {} bytes)",
                config.path,
                payload % frame_bytes,
                frame_bytes
            );
        }

        tracing::debug!(
            "Opened binary recording {:?}: {} channels, {} samples at {} Hz ({})",
            config.path,
            config.num_channels,
            num_samples,
            config.sampling_frequency,
            config.dtype
        );

        Ok(Self {
            path: config.path.clone(),
            num_channels: config.num_channels,
            num_samples,
            sampling_frequency: config.sampling_frequency,
            dtype: config.dtype,
            file_offset: config.file_offset,
            channel_locations: config.channel_locations.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a `(time, channel)` array as an interleaved file of the given dtype.
    pub fn write(path: impl AsRef<Path>, traces: &Array2<f32>, dtype: SampleDtype) -> Result<()> {
        let mut bytes = Vec::with_capacity(traces.len() * dtype.size_bytes());
        for &v in traces.iter() {
            match dtype {
                SampleDtype::Int16 => bytes.extend_from_slice(&(v as i16).to_le_bytes()),
                SampleDtype::UInt16 => bytes.extend_from_slice(&(v as u16).to_le_bytes()),
                SampleDtype::Int32 => bytes.extend_from_slice(&(v as i32).to_le_bytes()),
                SampleDtype::Float32 => bytes.extend_from_slice(&v.to_le_bytes()),
                SampleDtype::Float64 => bytes.extend_from_slice(&(v as f64).to_le_bytes()),
            }
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl TraceSource for BinaryRecording {
    fn num_channels(&self) -> usize {
        self.num_channels
    }

    fn num_samples(&self) -> usize {
        self.num_samples
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
        check_read_range(self.num_samples, self.num_channels, start, end, channel_ids)?;

        let sample_bytes = self.dtype.size_bytes();
        let frame_bytes = sample_bytes * self.num_channels;
        let mut raw = vec![0u8; (end - start) * frame_bytes];

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(
            self.file_offset + (start * frame_bytes) as u64,
        ))?;
        file.read_exact(&mut raw)?;

        let columns: Vec<usize> = match channel_ids {
            Some(ids) => ids.to_vec(),
            None => (0..self.num_channels).collect(),
        };

        let mut traces = Array2::zeros((end - start, columns.len()));
        for (t, frame) in raw.chunks_exact(frame_bytes).enumerate() {
            for (out_col, &ch) in columns.iter().enumerate() {
                let offset = ch * sample_bytes;
                traces[[t, out_col]] = self.dtype.decode_le(&frame[offset..offset + sample_bytes]);
            }
        }
        Ok(traces)
    }
}
