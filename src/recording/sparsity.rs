//! Per-channel neighborhoods used for sparse waveform extraction and
//! locally exclusive detection.

use crate::error::{Result, SpikeError};
use serde::{Deserialize, Serialize};

/// For every channel, the ordered list of channels considered its neighbors.
///
/// A channel is always part of its own neighborhood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSparsity {
    neighbors: Vec<Vec<usize>>,
}

impl ChannelSparsity {
    /// Every channel neighbors every other channel.
    pub fn dense(num_channels: usize) -> Self {
        let all: Vec<usize> = (0..num_channels).collect();
        Self {
            neighbors: vec![all; num_channels],
        }
    }

    /// Build from explicit neighbor lists.
    pub fn from_neighbors(neighbors: Vec<Vec<usize>>) -> Result<Self> {
        let sparsity = Self { neighbors };
        sparsity.validate(sparsity.num_channels())?;
        Ok(sparsity)
    }

    /// Build from a `(channel, channel)` boolean mask.
    pub fn from_mask(mask: &[Vec<bool>]) -> Result<Self> {
        let neighbors = mask
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter_map(|(i, &on)| on.then_some(i))
                    .collect()
            })
            .collect();
        Self::from_neighbors(neighbors)
    }

    /// Channels within `radius_um` of each other (Euclidean, probe plane).
    pub fn from_radius(locations: &[[f64; 2]], radius_um: f64) -> Self {
        let neighbors = locations
            .iter()
            .map(|a| {
                locations
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| {
                        let dx = a[0] - b[0];
                        let dy = a[1] - b[1];
                        (dx * dx + dy * dy).sqrt() <= radius_um
                    })
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();
        Self { neighbors }
    }

    pub fn num_channels(&self) -> usize {
        self.neighbors.len()
    }

    pub fn neighbors(&self, channel: usize) -> &[usize] {
        self.neighbors.get(channel).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Size of the largest neighborhood.
    pub fn max_neighbors(&self) -> usize {
        self.neighbors.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Check the map against a recording's channel count.
    pub fn validate(&self, num_channels: usize) -> Result<()> {
        if self.neighbors.len() != num_channels {
            return Err(SpikeError::Config(format!(
                "sparsity covers {} channels, recording has {}",
                self.neighbors.len(),
                num_channels
            )));
        }
        for (channel, list) in self.neighbors.iter().enumerate() {
            if let Some(&bad) = list.iter().find(|&&c| c >= num_channels) {
                return Err(SpikeError::Config(format!(
                    "channel {} lists neighbor {} outside {} channels",
                    channel, bad, num_channels
                )));
            }
            if !list.contains(&channel) {
                return Err(SpikeError::Config(format!(
                    "channel {} is missing from its own neighborhood",
                    channel
                )));
            }
        }
        Ok(())
    }
}
