// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Engine session: explicit ownership of run-spanning resources.
//!
//! The scheduler configuration and anything that outlives a single run is
//! owned by an [`EngineSession`] and passed by reference where needed; there
//! are no module-level singletons. The pipeline graph and its stage
//! instances belong to one run and are released when the run ends.

use std::sync::Arc;

use crate::data::Dataset;
use crate::engine::executive::IndexExecutive;
use crate::engine::scheduler::Scheduler;
use crate::errors::{FailureMode, RunError};
use crate::pipeline::{Evaluator, NodeId, Pipeline};

/// Run-spanning configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Worker pool size; 1 means sequential.
    pub pool_size: usize,
    pub failure_mode: FailureMode,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            pool_size: 1,
            failure_mode: FailureMode::default(),
        }
    }
}

/// Owns the scheduler and drives executive-enumerated runs.
#[derive(Debug, Clone, Default)]
pub struct EngineSession {
    options: SessionOptions,
}

impl EngineSession {
    pub fn new(options: SessionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.options.pool_size).with_failure_mode(self.options.failure_mode)
    }

    /// Enumerate requests with `executive` and evaluate them all against
    /// `terminal`. The pipeline is consumed for the duration of the run.
    pub async fn run(
        &self,
        pipeline: Arc<Pipeline>,
        terminal: NodeId,
        executive: &IndexExecutive,
    ) -> Result<Vec<Arc<Dataset>>, RunError> {
        pipeline.check_terminal(terminal)?;
        let evaluator = Arc::new(Evaluator::new(pipeline));
        let requests = executive.requests(&evaluator, terminal).await?;
        self.scheduler().run(evaluator, terminal, requests).await
    }
}
