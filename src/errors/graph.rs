// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Errors that can occur while assembling a pipeline graph.
///
/// The graph is append-only and inputs must already exist, so cycles are
/// unrepresentable; what remains to validate is wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A stage was wired to a node id that has not been added.
    UnknownInput {
        /// The stage being added
        stage: String,
        /// The dangling node id
        input: usize,
    },
    /// A stage was given a different number of inputs than it declares.
    ArityMismatch {
        /// The stage being added
        stage: String,
        /// Inputs the stage declares
        expected: usize,
        /// Inputs it was wired with
        actual: usize,
    },
    /// A run was started against a node id outside the graph.
    NoSuchNode { node: usize },
    /// A run was started on a pipeline with no stages.
    EmptyPipeline,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::UnknownInput { stage, input } => {
                write!(
                    f,
                    "Stage '{}' references input node {} which does not exist",
                    stage, input
                )
            }
            GraphError::ArityMismatch {
                stage,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Stage '{}' declares {} input port(s) but was wired with {}",
                    stage, expected, actual
                )
            }
            GraphError::NoSuchNode { node } => {
                write!(f, "Node {} is not part of the pipeline", node)
            }
            GraphError::EmptyPipeline => {
                write!(f, "Pipeline contains no stages")
            }
        }
    }
}

impl std::error::Error for GraphError {}
