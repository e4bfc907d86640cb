//! Chunk partitioning and margin-widened trace fetches.
//!
//! A recording of `N` samples is cut into consecutive `[start, end)` ranges of
//! `chunk_size` samples (the last one may be shorter). Every chunk is read
//! with `margin` extra samples on both sides so per-peak windows near a chunk
//! edge see the neighbouring data. Samples outside the recording are
//! zero-filled, so the buffer is always `chunk.len() + 2 * margin` rows.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::recording::TraceSource;
use crate::types::Peak;
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// One unit of parallel work: samples `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkRange {
    /// Position in the chunk list
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl ChunkRange {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    #[inline]
    pub fn contains(&self, sample: usize) -> bool {
        self.start <= sample && sample < self.end
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [{}, {})", self.index, self.start, self.end)
    }
}

/// Partition `[0, num_samples)` into consecutive chunks of `chunk_size`.
pub fn divide_recording(num_samples: usize, chunk_size: usize) -> Vec<ChunkRange> {
    let chunk_size = chunk_size.max(1);
    (0..num_samples)
        .step_by(chunk_size)
        .enumerate()
        .map(|(index, start)| ChunkRange {
            index,
            start,
            end: (start + chunk_size).min(num_samples),
        })
        .collect()
}

/// Positions in a sorted peak list of the peaks that fall inside `chunk`.
pub fn peak_range(peaks: &[Peak], chunk: &ChunkRange) -> Range<usize> {
    let lo = peaks.partition_point(|p| p.sample_index < chunk.start);
    let hi = lo + peaks[lo..].partition_point(|p| p.sample_index < chunk.end);
    lo..hi
}

/// Read `[start - margin, end + margin)` for all channels, zero-filling the
/// part that falls outside the recording.
pub fn fetch_widened_traces(
    source: &dyn TraceSource,
    chunk: &ChunkRange,
    margin: usize,
) -> PipelineResult<Array2<f32>> {
    let num_samples = source.num_samples();
    let num_channels = source.num_channels();

    let read_start = chunk.start.saturating_sub(margin);
    let read_end = (chunk.end + margin).min(num_samples);
    let traces = source
        .get_traces(read_start, read_end, None)
        .map_err(|e| PipelineError::TraceFetch {
            chunk: *chunk,
            message: e.to_string(),
        })?;

    if traces.dim() != (read_end - read_start, num_channels) {
        return Err(PipelineError::TraceFetch {
            chunk: *chunk,
            message: format!(
                "source returned {:?}, expected ({}, {})",
                traces.dim(),
                read_end - read_start,
                num_channels
            ),
        });
    }

    let rows = chunk.len() + 2 * margin;
    if read_start + margin == chunk.start && read_end == chunk.end + margin {
        return Ok(traces);
    }

    let mut widened = Array2::zeros((rows, num_channels));
    let offset = read_start + margin - chunk.start;
    widened
        .slice_mut(s![offset..offset + traces.nrows(), ..])
        .assign(&traces);
    Ok(widened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SpikeError};
    use crate::recording::{InMemoryRecording, SampleDtype};
    use mockall::mock;
    use ndarray::Array2;

    mock! {
        pub Source {}

        impl TraceSource for Source {
            fn num_channels(&self) -> usize;
            fn num_samples(&self) -> usize;
            fn sampling_frequency(&self) -> f64;
            fn dtype(&self) -> SampleDtype;
            fn get_traces<'a>(
                &self,
                start: usize,
                end: usize,
                channel_ids: Option<&'a [usize]>,
            ) -> Result<Array2<f32>>;
        }
    }

    fn ramp_recording(num_samples: usize) -> InMemoryRecording {
        let traces = Array2::from_shape_fn((num_samples, 2), |(t, c)| (t * 10 + c) as f32);
        InMemoryRecording::new(traces, 1000.0).unwrap()
    }

    #[test]
    fn test_divide_recording() {
        let chunks = divide_recording(25, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!((chunks[0].start, chunks[0].end), (0, 10));
        assert_eq!((chunks[2].start, chunks[2].end), (20, 25));
        assert_eq!(chunks[2].index, 2);
        assert_eq!(chunks.iter().map(ChunkRange::len).sum::<usize>(), 25);

        assert!(divide_recording(0, 10).is_empty());
        assert_eq!(divide_recording(5, 0).len(), 5);
    }

    #[test]
    fn test_peak_range() {
        let peaks: Vec<Peak> = [2, 9, 10, 10, 19, 20]
            .iter()
            .map(|&s| Peak::new(s, 0, -1.0))
            .collect();
        let chunk = ChunkRange {
            index: 1,
            start: 10,
            end: 20,
        };
        assert_eq!(peak_range(&peaks, &chunk), 2..5);

        let late = ChunkRange {
            index: 9,
            start: 90,
            end: 100,
        };
        assert!(peak_range(&peaks, &late).is_empty());
    }

    #[test]
    fn test_fetch_interior_chunk() {
        let rec = ramp_recording(30);
        let chunk = ChunkRange {
            index: 1,
            start: 10,
            end: 20,
        };
        let traces = fetch_widened_traces(&rec, &chunk, 3).unwrap();
        assert_eq!(traces.dim(), (16, 2));
        assert_eq!(traces[[0, 0]], 70.0);
        assert_eq!(traces[[15, 1]], 221.0);
    }

    #[test]
    fn test_fetch_zero_fills_recording_edges() {
        let rec = ramp_recording(12);
        let first = ChunkRange {
            index: 0,
            start: 0,
            end: 6,
        };
        let traces = fetch_widened_traces(&rec, &first, 4).unwrap();
        assert_eq!(traces.dim(), (14, 2));
        assert!(traces.slice(s![0..4, ..]).iter().all(|&v| v == 0.0));
        assert_eq!(traces[[4, 1]], 1.0);
        assert_eq!(traces[[13, 0]], 90.0);

        let last = ChunkRange {
            index: 1,
            start: 6,
            end: 12,
        };
        let traces = fetch_widened_traces(&rec, &last, 4).unwrap();
        assert_eq!(traces.dim(), (14, 2));
        assert_eq!(traces[[0, 0]], 20.0);
        assert!(traces.slice(s![10..14, ..]).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_fetch_reports_source_failure() {
        let mut source = MockSource::new();
        source.expect_num_samples().return_const(100usize);
        source.expect_num_channels().return_const(4usize);
        source
            .expect_get_traces()
            .returning(|_, _, _| Err(SpikeError::Recording("disk gone".to_string())));

        let chunk = ChunkRange {
            index: 0,
            start: 0,
            end: 50,
        };
        match fetch_widened_traces(&source, &chunk, 5) {
            Err(PipelineError::TraceFetch { chunk: c, message }) => {
                assert_eq!(c, chunk);
                assert!(message.contains("disk gone"));
            }
            other => panic!("unexpected result: {:?}", other.map(|a| a.dim())),
        }
    }

    #[test]
    fn test_fetch_rejects_wrong_shape() {
        let mut source = MockSource::new();
        source.expect_num_samples().return_const(100usize);
        source.expect_num_channels().return_const(4usize);
        source
            .expect_get_traces()
            .returning(|start, end, _| Ok(Array2::zeros((end - start, 3))));

        let chunk = ChunkRange {
            index: 0,
            start: 10,
            end: 50,
        };
        assert!(matches!(
            fetch_widened_traces(&source, &chunk, 5),
            Err(PipelineError::TraceFetch { .. })
        ));
    }
}
