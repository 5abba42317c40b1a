// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Bounded-concurrency request scheduler.
//!
//! The scheduler dispatches the executive's request collection against the
//! graph using a shared FIFO queue and a bounded number of in-flight tasks.
//! Each task performs one full demand-driven graph walk; the scheduler
//! guarantees nothing about completion order beyond submission order of the
//! queue, so ordering-sensitive stages (the temporal reduction) carry their
//! own sequencing buffers.
//!
//! Failure handling follows the configured [`FailureMode`]:
//! - `FailFast` (default): the first hard error drains the queue; tasks
//!   already running are allowed to finish (mid-request cancellation is not
//!   supported), then the error is returned.
//! - `CollectAll`: every request is evaluated and all failures are reported
//!   together.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::data::{Dataset, Request};
use crate::errors::{EngineError, FailureMode, RequestFailure, RunError};
use crate::observability::messages::engine::{
    RequestFailed, RunAborted, RunCompleted, RunStarted,
};
use crate::pipeline::{Evaluator, NodeId};

/// Dispatches requests to worker tasks, bounded by a pool size.
pub struct Scheduler {
    pool_size: usize,
    failure_mode: FailureMode,
}

impl Scheduler {
    /// Pool size 1 means fully sequential evaluation, the default for
    /// reproducing single-threaded baselines.
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size: pool_size.max(1),
            failure_mode: FailureMode::default(),
        }
    }

    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Evaluate `requests` against `terminal`, returning the produced
    /// datasets in submission order.
    pub async fn run(
        &self,
        evaluator: Arc<Evaluator>,
        terminal: NodeId,
        requests: Vec<Request>,
    ) -> Result<Vec<Arc<Dataset>>, RunError> {
        evaluator.pipeline().check_terminal(terminal)?;

        let started = Instant::now();
        let request_count = requests.len();
        tracing::info!(
            "{}",
            RunStarted {
                terminal: evaluator.pipeline().stage_name(terminal).unwrap_or("?"),
                request_count,
                pool_size: self.pool_size,
            }
        );

        if requests.is_empty() {
            return Ok(Vec::new());
        }

        // Shared run state. Workers pull from the queue, write results by
        // submission ordinal, and record failures.
        let queue: Arc<Mutex<VecDeque<(usize, Request)>>> =
            Arc::new(Mutex::new(requests.into_iter().enumerate().collect()));
        let active = Arc::new(Mutex::new(0usize));
        let results: Arc<Mutex<Vec<Option<Arc<Dataset>>>>> =
            Arc::new(Mutex::new(vec![None; request_count]));
        let failures: Arc<Mutex<Vec<RequestFailure>>> = Arc::new(Mutex::new(Vec::new()));

        loop {
            let next = {
                let mut queue = queue.lock().await;
                let active_count = *active.lock().await;
                let failed = failures.lock().await;

                if matches!(self.failure_mode, FailureMode::FailFast)
                    && !failed.is_empty()
                    && !queue.is_empty()
                {
                    tracing::warn!(
                        "{}",
                        RunAborted {
                            discarded: queue.len()
                        }
                    );
                    queue.clear();
                }

                if active_count < self.pool_size {
                    queue.pop_front()
                } else {
                    None
                }
            };

            match next {
                Some((ordinal, request)) => {
                    {
                        let mut active = active.lock().await;
                        *active += 1;
                    }

                    let evaluator = evaluator.clone();
                    let active = active.clone();
                    let results = results.clone();
                    let failures = failures.clone();

                    tokio::spawn(async move {
                        match evaluator.evaluate(terminal, &request).await {
                            Ok(dataset) => {
                                let mut results = results.lock().await;
                                results[ordinal] = Some(dataset);
                            }
                            Err(source) => {
                                tracing::error!(
                                    "{}",
                                    RequestFailed {
                                        ordinal,
                                        error: &source
                                    }
                                );
                                let mut failures = failures.lock().await;
                                failures.push(RequestFailure { ordinal, source });
                            }
                        }

                        let mut active = active.lock().await;
                        *active -= 1;
                    });
                }
                None => {
                    let active_count = *active.lock().await;
                    let queue_empty = queue.lock().await.is_empty();
                    if active_count == 0 && queue_empty {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
        }

        // Spawned tasks may not have been reaped yet even though the active
        // count is back to zero, so drain under the locks rather than
        // unwrapping the Arcs.
        let mut failures: Vec<RequestFailure> = failures.lock().await.drain(..).collect();

        if !failures.is_empty() {
            failures.sort_by_key(|f| f.ordinal);
            return Err(match self.failure_mode {
                FailureMode::FailFast => {
                    let first = failures.remove(0);
                    RunError::Request {
                        ordinal: first.ordinal,
                        source: first.source,
                    }
                }
                FailureMode::CollectAll => RunError::Multiple { failures },
            });
        }

        tracing::info!(
            "{}",
            RunCompleted {
                request_count,
                duration: started.elapsed(),
            }
        );

        let results: Vec<Option<Arc<Dataset>>> = results.lock().await.drain(..).collect();
        results
            .into_iter()
            .enumerate()
            .map(|(ordinal, slot)| {
                slot.ok_or_else(|| RunError::Request {
                    ordinal,
                    source: EngineError::Internal("request produced no dataset".into()),
                })
            })
            .collect()
    }
}
