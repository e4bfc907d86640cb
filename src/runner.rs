//! End-to-end run: detect peaks on a binary recording, evaluate a peak
//! pipeline and write everything to an output folder.
//!
//! # Output folder
//!
//! - `peaks.json` - detected peaks
//! - `node{idx}_{name}.f32` - one raw little-endian `f32` file per returned node
//! - `manifest.json` - shapes, dtypes and file names of the above

use crate::config::{RunConfig, OUTPUT_MANIFEST_FILE, PEAKS_FILE};
use crate::detection::detect_peaks;
use crate::error::{Result, ResultExt, SpikeError};
use crate::pipeline::{run_peak_pipeline, NamedOutput, PipelineError, PipelineOutput};
use crate::recording::{BinaryRecording, TraceSource};
use crate::types::Peak;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// One written node output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Index of the node in the pipeline
    pub node: usize,
    pub name: String,
    /// File name relative to the output folder
    pub file: String,
    pub shape: Vec<usize>,
    pub dtype: String,
}

/// Description of an output folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputManifest {
    pub created_at: DateTime<Utc>,
    pub recording: PathBuf,
    pub sampling_frequency: f64,
    pub num_samples: usize,
    pub num_channels: usize,
    pub num_peaks: usize,
    pub peaks_file: String,
    pub outputs: Vec<OutputRecord>,
}

impl OutputManifest {
    pub fn load(folder: impl AsRef<Path>) -> Result<Self> {
        let path = folder.as_ref().join(OUTPUT_MANIFEST_FILE);
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            SpikeError::Serialization(format!("Failed to parse manifest {:?}: {}", path, e))
        })
    }
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub num_peaks: usize,
    pub manifest: OutputManifest,
    pub elapsed_ms: u128,
}

/// Run detection and the configured pipeline, writing results to disk.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    let started = Instant::now();
    let recording = BinaryRecording::open(&config.recording)
        .with_context(|| format!("Failed to open recording {:?}", config.recording.path))?;
    let info = recording.info();
    tracing::info!(
        "Recording {:?}: {} channels, {} samples ({:.1} s at {} Hz, {})",
        config.recording.path,
        info.num_channels,
        info.num_samples,
        info.duration_seconds(),
        info.sampling_frequency,
        info.dtype.name()
    );

    let peaks = detect_peaks(&recording, &config.detection, &config.job)
        .context("Peak detection failed")?;

    let pipeline = config
        .pipeline
        .build(&info)
        .context("Failed to build pipeline")?;
    let output = run_peak_pipeline(&recording, &peaks, &pipeline, &config.job, false)
        .context("Peak pipeline failed")?;
    let PipelineOutput::Outputs(outputs) = output else {
        return Err(PipelineError::InvalidConfig("unexpected squeezed output".to_string()).into());
    };

    std::fs::create_dir_all(&config.output_folder)?;
    write_peaks(&config.output_folder.join(PEAKS_FILE), &peaks)?;

    let mut records = Vec::with_capacity(outputs.len());
    for output in &outputs {
        records.push(write_output(&config.output_folder, output)?);
    }

    let manifest = OutputManifest {
        created_at: Utc::now(),
        recording: config.recording.path.clone(),
        sampling_frequency: info.sampling_frequency,
        num_samples: info.num_samples,
        num_channels: info.num_channels,
        num_peaks: peaks.len(),
        peaks_file: PEAKS_FILE.to_string(),
        outputs: records,
    };
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| SpikeError::Serialization(format!("Failed to serialize manifest: {}", e)))?;
    std::fs::write(config.output_folder.join(OUTPUT_MANIFEST_FILE), json)?;

    let elapsed_ms = started.elapsed().as_millis();
    tracing::info!(
        "Run finished in {} ms: {} peaks, {} outputs written to {:?}",
        elapsed_ms,
        peaks.len(),
        manifest.outputs.len(),
        config.output_folder
    );

    Ok(RunSummary {
        num_peaks: peaks.len(),
        manifest,
        elapsed_ms,
    })
}

fn write_peaks(path: &Path, peaks: &[Peak]) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, peaks)
        .map_err(|e| SpikeError::Serialization(format!("Failed to write peaks: {}", e)))
}

/// File-name-safe version of an output name.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

fn write_output(folder: &Path, output: &NamedOutput) -> Result<OutputRecord> {
    let file = format!("node{}_{}.f32", output.node.index(), file_stem(&output.name));
    let mut writer = BufWriter::new(File::create(folder.join(&file))?);
    for value in output.data.iter() {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;

    tracing::debug!("Wrote {} {:?} to {}", output.name, output.data.shape(), file);
    Ok(OutputRecord {
        node: output.node.index(),
        name: output.name.clone(),
        file,
        shape: output.data.shape().to_vec(),
        dtype: "float32".to_string(),
    })
}
