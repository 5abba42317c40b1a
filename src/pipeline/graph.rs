// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The pipeline graph: stages wired producer-to-consumer.
//!
//! The graph is append-only: a stage's inputs must already be part of the
//! graph when the stage is added, so cycles cannot be expressed. Once built,
//! the graph is moved behind an `Arc` and never mutated for the lifetime of
//! the run.

use std::sync::Arc;

use crate::errors::GraphError;
use crate::pipeline::stage::Stage;

/// Opaque handle to a node in a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

pub(crate) struct Node {
    pub stage: Arc<dyn Stage>,
    pub inputs: Vec<NodeId>,
}

/// A directed acyclic graph of stages, built once before execution.
#[derive(Default)]
pub struct Pipeline {
    nodes: Vec<Node>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Add a stage wired to already-added input nodes. Returns the new
    /// node's id for wiring downstream consumers.
    pub fn add_stage(
        &mut self,
        stage: Arc<dyn Stage>,
        inputs: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        let arity = stage.input_arity();
        if inputs.len() != arity {
            return Err(GraphError::ArityMismatch {
                stage: stage.name().to_string(),
                expected: arity,
                actual: inputs.len(),
            });
        }
        for input in inputs {
            if input.0 >= self.nodes.len() {
                return Err(GraphError::UnknownInput {
                    stage: stage.name().to_string(),
                    input: input.0,
                });
            }
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            stage,
            inputs: inputs.to_vec(),
        });
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Name of the stage at `node`, for logs.
    pub fn stage_name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).map(|n| n.stage.name())
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(id.0).ok_or(GraphError::NoSuchNode { node: id.0 })
    }

    /// Check that `node` can drive a run on this pipeline.
    pub fn check_terminal(&self, node: NodeId) -> Result<(), GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::EmptyPipeline);
        }
        if node.0 >= self.nodes.len() {
            return Err(GraphError::NoSuchNode { node: node.0 });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("node_count", &self.nodes.len())
            .field(
                "stages",
                &self
                    .nodes
                    .iter()
                    .map(|n| n.stage.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
