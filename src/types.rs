//! Core data types shared by detection and the peak pipeline.
//!
//! # Main Types
//!
//! - [`Peak`] - A detected spike candidate (sample, channel, amplitude)
//! - [`PeakSign`] - Which polarity the detector looks for

use serde::{Deserialize, Serialize};

/// A detected spike candidate.
///
/// Peaks are immutable once detected and are kept sorted by `sample_index`.
/// Several peaks may share a sample index (on different channels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Absolute sample index in the recording
    pub sample_index: usize,
    /// Channel on which the peak was detected
    pub channel_index: usize,
    /// Raw trace value at the peak (negative for negative-going spikes)
    pub amplitude: f32,
}

impl Peak {
    pub fn new(sample_index: usize, channel_index: usize, amplitude: f32) -> Self {
        Self {
            sample_index,
            channel_index,
            amplitude,
        }
    }
}

/// Returns the position of the first peak that breaks sample ordering, if any.
pub fn first_unsorted_peak(peaks: &[Peak]) -> Option<usize> {
    peaks
        .windows(2)
        .position(|w| w[1].sample_index < w[0].sample_index)
        .map(|i| i + 1)
}

/// Polarity used when thresholding traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakSign {
    /// Negative-going deflections (extracellular spikes)
    #[default]
    Neg,
    /// Positive-going deflections
    Pos,
    /// Either polarity, compared by absolute value
    Both,
}

impl PeakSign {
    /// Map a raw sample into the space where "larger is more peak-like".
    #[inline]
    pub fn oriented(self, value: f32) -> f32 {
        match self {
            PeakSign::Neg => -value,
            PeakSign::Pos => value,
            PeakSign::Both => value.abs(),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PeakSign::Neg => "neg",
            PeakSign::Pos => "pos",
            PeakSign::Both => "both",
        }
    }
}

impl std::fmt::Display for PeakSign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_unsorted_peak() {
        let sorted = vec![Peak::new(1, 0, -1.0), Peak::new(1, 2, -1.0), Peak::new(7, 0, -2.0)];
        assert_eq!(first_unsorted_peak(&sorted), None);

        let unsorted = vec![Peak::new(5, 0, -1.0), Peak::new(3, 0, -1.0)];
        assert_eq!(first_unsorted_peak(&unsorted), Some(1));
    }

    #[test]
    fn test_peak_sign_orientation() {
        assert_eq!(PeakSign::Neg.oriented(-3.0), 3.0);
        assert_eq!(PeakSign::Pos.oriented(-3.0), -3.0);
        assert_eq!(PeakSign::Both.oriented(-3.0), 3.0);
    }

    #[test]
    fn test_peak_sign_serde() {
        let sign: PeakSign = serde_json::from_str("\"both\"").unwrap();
        assert_eq!(sign, PeakSign::Both);
        assert_eq!(serde_json::to_string(&PeakSign::Neg).unwrap(), "\"neg\"");
    }
}
