// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Demand-driven graph evaluation.
//!
//! Each request issued against a terminal node walks the graph upstream:
//! metadata first (memoized per node), then per-port upstream requests,
//! then recursive evaluation of those requests, then the stage's own
//! `execute`. The walk is synchronous within one request; concurrency comes
//! from the scheduler evaluating independent requests in parallel tasks
//! against the same (shared, immutable) graph.
//!
//! Execution results are deliberately not memoized: two identical requests
//! recompute, and the contract is that they produce datasets that compare
//! equal. Stages that want caching (e.g. a file-backed source) implement it
//! internally.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::data::{Dataset, MetadataReport, Request};
use crate::errors::EngineError;
use crate::pipeline::graph::{NodeId, Pipeline};

/// Evaluates requests against one immutable pipeline graph.
///
/// Cheap to share: clone the `Arc` it lives behind. The metadata cache is
/// the only interior state and lives for the lifetime of the graph.
pub struct Evaluator {
    pipeline: Arc<Pipeline>,
    metadata_cache: Mutex<HashMap<usize, Arc<MetadataReport>>>,
}

impl Evaluator {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            metadata_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// The metadata report for `node`, computed on first use by querying
    /// upstream reports and handing them to the stage.
    pub fn metadata<'a>(
        &'a self,
        node: NodeId,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<MetadataReport>, EngineError>> + Send + 'a>> {
        Box::pin(async move {
            {
                let cache = self.metadata_cache.lock().await;
                if let Some(md) = cache.get(&node.0) {
                    return Ok(md.clone());
                }
            }

            let n = self
                .pipeline
                .node(node)
                .map_err(|e| EngineError::Internal(e.to_string()))?;

            let mut input_md = Vec::with_capacity(n.inputs.len());
            for input in &n.inputs {
                input_md.push((*self.metadata(*input).await?).clone());
            }

            let md = Arc::new(
                n.stage
                    .output_metadata(&input_md)
                    .map_err(|e| e.in_stage(n.stage.name()))?,
            );

            let mut cache = self.metadata_cache.lock().await;
            // A concurrent walk may have raced us here; either copy is fine,
            // keep the first for pointer-equality friendliness.
            Ok(cache.entry(node.0).or_insert(md).clone())
        })
    }

    /// Materialize the dataset satisfying `request` at `node`.
    pub fn evaluate<'a>(
        &'a self,
        node: NodeId,
        request: &'a Request,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<Dataset>, EngineError>> + Send + 'a>> {
        Box::pin(async move {
            let n = self
                .pipeline
                .node(node)
                .map_err(|e| EngineError::Internal(e.to_string()))?;

            let mut input_md = Vec::with_capacity(n.inputs.len());
            for input in &n.inputs {
                input_md.push((*self.metadata(*input).await?).clone());
            }

            let upstream = n
                .stage
                .upstream_requests(&input_md, request)
                .map_err(|e| e.in_stage(n.stage.name()))?;
            if upstream.len() != n.inputs.len() {
                return Err(EngineError::Internal(format!(
                    "stage '{}' returned requests for {} port(s) but has {} input(s)",
                    n.stage.name(),
                    upstream.len(),
                    n.inputs.len()
                )));
            }

            let mut inputs = Vec::with_capacity(upstream.len());
            for (port, requests) in upstream.into_iter().enumerate() {
                let mut datasets = Vec::with_capacity(requests.len());
                for up_req in &requests {
                    datasets.push(self.evaluate(n.inputs[port], up_req).await?);
                }
                inputs.push(datasets);
            }

            n.stage
                .execute(inputs, request)
                .await
                .map_err(|e| e.in_stage(n.stage.name()))
        })
    }
}
