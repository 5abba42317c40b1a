// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Temporal reduction: fold runs of time steps into per-interval aggregates.
//!
//! The stage re-keys the index domain. Upstream advertises one index per
//! time step; this stage advertises one index per calendar interval and
//! translates each interval request into requests for its constituent
//! steps. Concurrent interval evaluations feed one shared
//! [`TemporalAccumulator`], which folds each interval's steps in strict
//! time order regardless of task completion order.

pub mod accumulator;
pub mod interval;
pub mod operator;

pub use accumulator::TemporalAccumulator;
pub use interval::{Interval, IntervalPartition, IntervalSpan};
pub use operator::ReductionOperator;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::data::{keys, Dataset, MetadataReport, Request};
use crate::errors::EngineError;
use crate::pipeline::Stage;

/// Reduce a time series to one dataset per interval.
///
/// `arrays` selects which variables to reduce; empty means every variable
/// the upstream port advertises. `stream_size` caps how far out of order
/// contributions may arrive, measured in open buckets.
pub struct ReductionStage {
    operator: ReductionOperator,
    interval: Interval,
    arrays: Vec<String>,
    stream_size: usize,
    accumulator: Mutex<Option<Arc<TemporalAccumulator>>>,
}

impl ReductionStage {
    pub fn new(operator: ReductionOperator, interval: Interval) -> Self {
        Self {
            operator,
            interval,
            arrays: Vec::new(),
            stream_size: usize::MAX,
            accumulator: Mutex::new(None),
        }
    }

    /// Restrict the reduction to the named variables.
    pub fn with_arrays(mut self, arrays: Vec<String>) -> Self {
        self.arrays = arrays;
        self
    }

    /// Bound the number of concurrently open buckets.
    pub fn with_stream_size(mut self, stream_size: usize) -> Self {
        self.stream_size = stream_size.max(1);
        self
    }

    /// Variables this stage reads from its input, given what it advertises.
    fn input_arrays(&self, upstream: &MetadataReport) -> Vec<String> {
        if self.arrays.is_empty() {
            upstream.variables.clone()
        } else {
            self.arrays.clone()
        }
    }

    fn shared(&self) -> Result<Arc<TemporalAccumulator>, EngineError> {
        let guard = self.accumulator.lock().unwrap_or_else(|p| p.into_inner());
        guard.clone().ok_or_else(|| {
            EngineError::Internal(
                "reduction accumulator used before metadata was reported".into(),
            )
        })
    }
}

#[async_trait]
impl Stage for ReductionStage {
    fn name(&self) -> &str {
        "temporal_reduction"
    }

    fn input_arity(&self) -> usize {
        1
    }

    fn output_metadata(&self, inputs: &[MetadataReport]) -> Result<MetadataReport, EngineError> {
        let upstream = inputs
            .first()
            .ok_or_else(|| EngineError::Internal("reduction has no upstream report".into()))?;
        upstream.check_arrays(&self.arrays)?;

        let partition =
            self.interval
                .partition(&upstream.times, upstream.calendar, &upstream.units)?;
        let report = upstream
            .rekeyed(keys::INTERVAL, partition.start_times())
            .with_variables(
                self.operator
                    .output_variables(&self.input_arrays(upstream)),
            );

        let mut guard = self.accumulator.lock().unwrap_or_else(|p| p.into_inner());
        if guard.is_none() {
            *guard = Some(Arc::new(TemporalAccumulator::new(
                self.operator,
                partition,
                self.arrays.clone(),
                self.stream_size,
            )));
        }
        Ok(report)
    }

    fn upstream_requests(
        &self,
        inputs: &[MetadataReport],
        request: &Request,
    ) -> Result<Vec<Vec<Request>>, EngineError> {
        let upstream = inputs
            .first()
            .ok_or_else(|| EngineError::Internal("reduction has no upstream report".into()))?;
        let interval = request.index(keys::INTERVAL)?;
        let shared = self.shared()?;
        let span = shared.partition().span(interval).ok_or_else(|| {
            EngineError::unsatisfiable(format!(
                "interval {} is outside the partitioned domain of {} intervals",
                interval,
                shared.partition().len()
            ))
        })?;

        // Strip our index key and array selection; the steps are requested
        // in terms of the upstream port's own vocabulary.
        let base = request.without(keys::INTERVAL).without(keys::ARRAYS);
        let steps = span
            .steps()
            .map(|step| {
                let req = base.clone().with_index(upstream.request_key.clone(), step);
                if self.arrays.is_empty() {
                    req
                } else {
                    req.with_arrays(self.arrays.clone())
                }
            })
            .collect();
        Ok(vec![steps])
    }

    async fn execute(
        &self,
        inputs: Vec<Vec<Arc<Dataset>>>,
        request: &Request,
    ) -> Result<Arc<Dataset>, EngineError> {
        let interval = request.index(keys::INTERVAL)?;
        let shared = self.shared()?;

        // Idempotent re-request: the bucket already closed.
        if let Some(dataset) = shared.finalized(interval) {
            return Ok(dataset);
        }

        for dataset in inputs.into_iter().flatten() {
            shared.accept(dataset)?;
        }
        shared.wait_finalized(interval).await
    }
}
