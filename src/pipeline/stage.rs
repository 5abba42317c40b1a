// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The stage abstraction every pipeline node implements.

use std::sync::Arc;

use async_trait::async_trait;

use crate::data::{Dataset, MetadataReport, Request};
use crate::errors::EngineError;

/// A node in the pipeline graph.
///
/// Stages follow a three-phase request protocol, driven top-down by the
/// evaluator:
///
/// 1. `output_metadata`: describe what this stage can produce, given what
///    its upstream ports advertise. Memoized per node by the evaluator.
/// 2. `upstream_requests`: translate one request on the output port into
///    the requests each input port needs satisfied. Not memoized.
/// 3. `execute`: produce the output dataset from the materialized inputs.
///
/// Stages are shared across concurrent request evaluations; any internal
/// mutable state (caches, accumulators) must carry its own synchronization.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable name used in error wrapping and logs.
    fn name(&self) -> &str;

    /// Number of input ports. Zero for sources.
    fn input_arity(&self) -> usize {
        0
    }

    /// Describe the addressable domain of the output port.
    fn output_metadata(&self, inputs: &[MetadataReport]) -> Result<MetadataReport, EngineError>;

    /// Requests for each input port (outer index = port). The default
    /// forwards the downstream request to every port unchanged, which suits
    /// one-to-one stages.
    fn upstream_requests(
        &self,
        inputs: &[MetadataReport],
        request: &Request,
    ) -> Result<Vec<Vec<Request>>, EngineError> {
        let _ = inputs;
        Ok(vec![vec![request.clone()]; self.input_arity()])
    }

    /// Produce the dataset satisfying `request`. `inputs` holds one vector
    /// of datasets per input port, in the order `upstream_requests` asked
    /// for them.
    async fn execute(
        &self,
        inputs: Vec<Vec<Arc<Dataset>>>,
        request: &Request,
    ) -> Result<Arc<Dataset>, EngineError>;
}
