// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Stage-level error taxonomy for pipeline evaluation.

use thiserror::Error;

/// Errors raised while evaluating a request against the pipeline graph.
///
/// Stage implementations return these from the request protocol methods.
/// `ValueMismatch` and `ShapeMismatch` originate in the diff stage,
/// `ResourceExhaustion`, `LateInput`, and `DuplicateInput` in the temporal
/// reduction, the rest anywhere along the walk.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request names an index or array the upstream metadata does not
    /// advertise, or omits a key the stage requires.
    #[error("unsatisfiable request: {reason}")]
    UnsatisfiableRequest { reason: String },

    /// Two arrays that must be congruent have different shapes.
    #[error("shape mismatch in array '{array}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        array: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Elementwise comparison exceeded the configured tolerance.
    #[error(
        "value mismatch in array '{array}' at element {index} (coords {coords:?}): \
         expected {expected}, got {actual} (tolerance {tolerance})"
    )]
    ValueMismatch {
        array: String,
        index: usize,
        coords: Vec<usize>,
        expected: f64,
        actual: f64,
        tolerance: f64,
    },

    /// More reduction buckets are open than `stream_size` allows. The input
    /// arrived too far out of order for the configured interval.
    #[error("resource exhaustion: {open} reduction buckets open, stream_size is {limit}")]
    ResourceExhaustion { open: usize, limit: usize },

    /// A contribution arrived for an interval that was already finalized.
    #[error("late input: time step {step} arrived after interval {interval} was finalized")]
    LateInput { step: u64, interval: u64 },

    /// A time step was delivered twice before its interval consumed it.
    #[error("duplicate input: time step {step} for interval {interval} was already delivered")]
    DuplicateInput { step: u64, interval: u64 },

    /// Opaque passthrough from a source or writer collaborator.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A named stage failed; wraps the underlying cause.
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<EngineError>,
    },

    /// Invariant violation that indicates a bug rather than bad input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Wrap an error with the name of the stage it escaped from. Already
    /// wrapped errors pass through so the innermost stage name wins.
    pub fn in_stage(self, stage: &str) -> Self {
        match self {
            EngineError::Stage { .. } => self,
            other => EngineError::Stage {
                stage: stage.to_string(),
                source: Box::new(other),
            },
        }
    }

    pub fn unsatisfiable(reason: impl Into<String>) -> Self {
        EngineError::UnsatisfiableRequest {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_stage_wraps_once() {
        let err = EngineError::unsatisfiable("missing 'prw'")
            .in_stage("reader")
            .in_stage("reduction");
        match err {
            EngineError::Stage { stage, .. } => assert_eq!(stage, "reader"),
            other => panic!("expected Stage, got {other:?}"),
        }
    }

    #[test]
    fn value_mismatch_reports_both_values() {
        let err = EngineError::ValueMismatch {
            array: "prw".into(),
            index: 14,
            coords: vec![1, 4],
            expected: 1.0,
            actual: 1.01,
            tolerance: 1e-3,
        };
        let msg = err.to_string();
        assert!(msg.contains("prw"));
        assert!(msg.contains("1.01"));
        assert!(msg.contains("[1, 4]"));
    }
}
