//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use actseq_rs::segmentation::{CostModel, MismatchWeighting, Segmenter};

/// Segmenter that splits clean runs of 0.9-confidence labels
pub fn splitting_segmenter() -> Segmenter {
    Segmenter::new(CostModel::new(0.5, MismatchWeighting::Confidence))
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
