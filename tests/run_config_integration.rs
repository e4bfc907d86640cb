//! Integration tests for run files and the end-to-end runner

mod common;

use common::builders::RecordingBuilder;
use spike_pipeline::config::{RunConfig, OUTPUT_MANIFEST_FILE, PEAKS_FILE};
use spike_pipeline::recording::SampleDtype;
use spike_pipeline::runner::{self, OutputManifest};
use spike_pipeline::{BinaryRecording, Peak, SpikeError};

const RUN_TOML: &str = r#"
output_folder = "results"

[recording]
path = "traces.bin"
num_channels = 4
sampling_frequency = 10000.0
dtype = "float32"

[job]
chunk_duration = "0.5s"
n_jobs = 2

[detection]
method = "locally_exclusive"
peak_sign = "neg"

[[pipeline.nodes]]
kind = "extract_dense_waveforms"
ms_before = 0.5
ms_after = 1.0
return_output = false

[[pipeline.nodes]]
kind = "peak_amplitude"

[[pipeline.nodes]]
kind = "waveform_denoiser"
parents = [0]
return_output = false

[[pipeline.nodes]]
kind = "waveform_rms"
parents = [0]

[[pipeline.nodes]]
kind = "waveform_rms"
parents = [2]
"#;

fn read_f32(path: &std::path::Path) -> Vec<f32> {
    std::fs::read(path)
        .unwrap()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[test]
fn test_run_writes_outputs_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let builder = RecordingBuilder::new(4, 3.0);
    let expected_spikes = builder.spike_times().len();
    BinaryRecording::write(dir.path().join("traces.bin"), &builder.traces(), SampleDtype::Float32)
        .unwrap();

    let run_path = dir.path().join("run.toml");
    std::fs::write(&run_path, RUN_TOML).unwrap();
    let config = RunConfig::load(&run_path).unwrap();

    let summary = runner::run(&config).unwrap();
    assert_eq!(summary.num_peaks, expected_spikes);

    let out = dir.path().join("results");
    let manifest = OutputManifest::load(&out).unwrap();
    assert_eq!(manifest, summary.manifest);
    assert_eq!(manifest.num_samples, 30_000);
    assert_eq!(manifest.num_channels, 4);
    assert_eq!(manifest.peaks_file, PEAKS_FILE);

    let names: Vec<&str> = manifest.outputs.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["abs_amplitude", "rms", "rms"]);
    let files: Vec<&str> = manifest.outputs.iter().map(|o| o.file.as_str()).collect();
    assert_eq!(files, vec!["node1_abs_amplitude.f32", "node3_rms.f32", "node4_rms.f32"]);
    assert_eq!(manifest.outputs[0].shape, vec![expected_spikes]);
    assert_eq!(manifest.outputs[1].shape, vec![expected_spikes, 4]);

    let peaks: Vec<Peak> =
        serde_json::from_str(&std::fs::read_to_string(out.join(PEAKS_FILE)).unwrap()).unwrap();
    let amplitudes = read_f32(&out.join("node1_abs_amplitude.f32"));
    assert_eq!(amplitudes.len(), peaks.len());
    for (value, peak) in amplitudes.iter().zip(&peaks) {
        assert_eq!(*value, peak.amplitude.abs());
    }

    let rms = read_f32(&out.join("node3_rms.f32"));
    assert_eq!(rms.len(), peaks.len() * 4);
    assert!(out.join(OUTPUT_MANIFEST_FILE).exists());
}

#[test]
fn test_run_reports_missing_recording() {
    let dir = tempfile::tempdir().unwrap();
    let run_path = dir.path().join("run.toml");
    std::fs::write(&run_path, RUN_TOML).unwrap();
    let config = RunConfig::load(&run_path).unwrap();

    let err = runner::run(&config).unwrap_err();
    assert!(matches!(err, SpikeError::WithContext { .. }));
    assert!(err.to_string().contains("Failed to open recording"));
    assert!(!dir.path().join("results").exists());
}

#[test]
fn test_invalid_pipeline_in_run_file() {
    let dir = tempfile::tempdir().unwrap();
    let builder = RecordingBuilder::new(4, 1.0);
    BinaryRecording::write(dir.path().join("traces.bin"), &builder.traces(), SampleDtype::Float32)
        .unwrap();

    let broken = RUN_TOML.replace("parents = [2]", "parents = [9]");
    let run_path = dir.path().join("run.toml");
    std::fs::write(&run_path, broken).unwrap();
    let config = RunConfig::load(&run_path).unwrap();

    let err = runner::run(&config).unwrap_err();
    assert!(err.to_string().contains("Peak pipeline failed"));
}
