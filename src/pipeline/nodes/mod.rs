//! Built-in pipeline node implementations.

pub mod amplitude;
pub mod denoise;
pub mod rms;
pub mod waveforms;

pub use amplitude::PeakAmplitudeNode;
pub use denoise::{WaveformDenoiser, DEFAULT_DENOISE_KERNEL};
pub use rms::WaveformRms;
pub use waveforms::{ExtractDenseWaveforms, ExtractSparseWaveforms};
