// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Run-level errors and failure handling policy for the scheduler.

use thiserror::Error;

use crate::errors::{EngineError, GraphError};

/// How the scheduler responds to a failed request evaluation.
///
/// The validation harnesses abort on first mismatch, so `FailFast` is the
/// default. Batch harnesses can opt into `CollectAll` to see every failure
/// from a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Stop submitting work after the first hard error and return it.
    #[default]
    FailFast,
    /// Evaluate every request and report all failures together.
    CollectAll,
}

/// Errors surfaced by a scheduler run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The pipeline was mis-wired; nothing was executed.
    #[error("invalid pipeline: {0}")]
    Graph(#[from] GraphError),

    /// The executive could not enumerate the request set.
    #[error("request enumeration failed: {0}")]
    Executive(#[from] EngineError),

    /// A single request failed (fail-fast mode).
    #[error("request {ordinal} failed: {source}")]
    Request {
        /// Position of the request in submission order
        ordinal: usize,
        #[source]
        source: EngineError,
    },

    /// Multiple requests failed (collect-all mode).
    #[error("{} request(s) failed", .failures.len())]
    Multiple { failures: Vec<RequestFailure> },
}

/// One failed request in a collect-all run.
#[derive(Debug, Error)]
#[error("request {ordinal}: {source}")]
pub struct RequestFailure {
    pub ordinal: usize,
    #[source]
    pub source: EngineError,
}
