//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use spike_pipeline::JobConfig;

/// Job settings used across integration tests
pub fn job(chunk_duration: &str, n_jobs: i32) -> JobConfig {
    JobConfig::new(chunk_duration, n_jobs).expect("valid job config")
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
