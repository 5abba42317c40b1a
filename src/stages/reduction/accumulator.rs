// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The temporal accumulator: ordered, bucketed folding of a time series.
//!
//! Worker tasks deliver time-step contributions in whatever order they
//! finish. Each contribution is routed to the bucket for its interval and
//! drained in strict step order within that interval through a sequencing
//! buffer keyed by step index. A bucket's lifecycle is
//!
//! ```text
//! Empty -> Accumulating -> Finalized
//! ```
//!
//! It opens on its first drained contribution and is finalized exactly
//! once, when the drain crosses the interval's upper bound on the
//! partitioned time axis. After finalization no further updates are
//! permitted: a contribution for a finalized interval, or below an
//! interval's drained frontier, is a `LateInput` error, and a re-delivery
//! of a step still waiting in the buffer is a `DuplicateInput` error.
//! Nothing is silently dropped.
//!
//! `stream_size` bounds the buckets held open at once (accumulating
//! buckets plus every interval represented in the sequencing buffer).
//! Exceeding it means the input arrived too far out of order for the
//! configured interval, and the run is aborted with `ResourceExhaustion`
//! rather than allowed to grow without bound.
//!
//! Any error poisons the accumulator so that tasks waiting on other
//! intervals observe the failure instead of waiting forever.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::data::{Calendar, Dataset};
use crate::errors::EngineError;
use crate::observability::messages::reduction::{
    AccumulatorPoisoned, BucketFinalized, BucketOpened,
};
use crate::stages::reduction::interval::{IntervalPartition, IntervalSpan};
use crate::stages::reduction::operator::{ArrayAccum, ReductionOperator};

/// One interval's in-progress aggregate.
struct Bucket {
    start_time: f64,
    calendar: Calendar,
    count: u64,
    accums: BTreeMap<String, ArrayAccum>,
}

struct State {
    /// Sequencing buffer: contributions ahead of their interval's frontier.
    pending: BTreeMap<u64, Arc<Dataset>>,
    /// Next step each interval's ordered drain will accept. Absent means
    /// the interval has not been touched yet and starts at its first step.
    frontier: BTreeMap<u64, u64>,
    /// Accumulating buckets, keyed by interval.
    buckets: BTreeMap<u64, Bucket>,
    /// Finalized outputs, kept for idempotent re-requests.
    finalized: BTreeMap<u64, Arc<Dataset>>,
    /// Rendered first error; set once, observed by every waiter.
    poisoned: Option<String>,
}

/// Shared accumulation state for one reduction stage instance.
pub struct TemporalAccumulator {
    operator: ReductionOperator,
    partition: IntervalPartition,
    arrays: Vec<String>,
    stream_size: usize,
    state: Mutex<State>,
}

impl TemporalAccumulator {
    pub fn new(
        operator: ReductionOperator,
        partition: IntervalPartition,
        arrays: Vec<String>,
        stream_size: usize,
    ) -> Self {
        Self {
            operator,
            partition,
            arrays,
            stream_size: stream_size.max(1),
            state: Mutex::new(State {
                pending: BTreeMap::new(),
                frontier: BTreeMap::new(),
                buckets: BTreeMap::new(),
                finalized: BTreeMap::new(),
                poisoned: None,
            }),
        }
    }

    pub fn partition(&self) -> &IntervalPartition {
        &self.partition
    }

    /// Already-finalized output for `interval`, if any.
    pub fn finalized(&self, interval: u64) -> Option<Arc<Dataset>> {
        let state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.finalized.get(&interval).cloned()
    }

    /// Deliver one time step's dataset. The step index is taken from the
    /// dataset itself. Errors poison the accumulator.
    pub fn accept(&self, dataset: Arc<Dataset>) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());

        if let Some(msg) = &state.poisoned {
            return Err(EngineError::Internal(format!("reduction aborted: {msg}")));
        }

        let step = dataset.index();
        let total = self.partition.total_steps();
        let span = match self.partition.span_for_step(step) {
            Some(span) => span,
            None => {
                let err = EngineError::unsatisfiable(format!(
                    "time step {step} is outside the partitioned axis of {total} steps"
                ));
                return Err(self.poison(&mut state, err));
            }
        };

        let next = state
            .frontier
            .get(&span.id)
            .copied()
            .unwrap_or(span.first_step);
        if state.finalized.contains_key(&span.id) || step < next {
            let err = EngineError::LateInput {
                step,
                interval: span.id,
            };
            return Err(self.poison(&mut state, err));
        }

        if state.pending.contains_key(&step) {
            let err = EngineError::DuplicateInput {
                step,
                interval: span.id,
            };
            return Err(self.poison(&mut state, err));
        }

        state.pending.insert(step, dataset);
        if let Err(err) = self.drain(&mut state, span, next) {
            return Err(self.poison(&mut state, err));
        }

        // Open buckets: accumulating ones plus every distinct interval
        // still waiting in the sequencing buffer.
        let mut open: BTreeSet<u64> = state.buckets.keys().copied().collect();
        open.extend(
            state
                .pending
                .keys()
                .filter_map(|s| self.partition.span_for_step(*s).map(|span| span.id)),
        );
        if open.len() > self.stream_size {
            let err = EngineError::ResourceExhaustion {
                open: open.len(),
                limit: self.stream_size,
            };
            return Err(self.poison(&mut state, err));
        }

        Ok(())
    }

    /// Wait until `interval` has been finalized. Polls the shared state the
    /// same way the scheduler polls its queue; progress comes from other
    /// tasks delivering the interval's remaining steps.
    pub async fn wait_finalized(&self, interval: u64) -> Result<Arc<Dataset>, EngineError> {
        loop {
            {
                let state = self.state.lock().unwrap_or_else(|p| p.into_inner());
                if let Some(dataset) = state.finalized.get(&interval) {
                    return Ok(dataset.clone());
                }
                if let Some(msg) = &state.poisoned {
                    return Err(EngineError::Internal(format!("reduction aborted: {msg}")));
                }
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Drain `span`'s contiguous run of buffered steps starting at `next`,
    /// finalizing the bucket when the drain crosses the span bound.
    fn drain(
        &self,
        state: &mut State,
        span: &IntervalSpan,
        mut next: u64,
    ) -> Result<(), EngineError> {
        while let Some(dataset) = state.pending.remove(&next) {
            self.fold(state, span, dataset)?;
            next += 1;
            if next > span.last_step {
                self.finalize(state, span);
                return Ok(());
            }
        }
        state.frontier.insert(span.id, next);
        Ok(())
    }

    /// Fold one in-order contribution into its interval's bucket.
    fn fold(
        &self,
        state: &mut State,
        span: &IntervalSpan,
        dataset: Arc<Dataset>,
    ) -> Result<(), EngineError> {
        let calendar = dataset.calendar();
        let (span_id, span_start) = (span.id, span.start_time);
        let bucket = state.buckets.entry(span_id).or_insert_with(|| {
            tracing::debug!(
                "{}",
                BucketOpened {
                    interval: span_id,
                    step: dataset.index(),
                }
            );
            Bucket {
                start_time: span_start,
                calendar,
                count: 0,
                accums: BTreeMap::new(),
            }
        });

        let names: Vec<String> = if self.arrays.is_empty() {
            dataset.array_names().cloned().collect()
        } else {
            self.arrays.clone()
        };
        for name in names {
            let incoming = dataset.require_array(&name)?;
            match bucket.accums.get_mut(&name) {
                Some(accum) => self.operator.combine(accum, incoming, &name)?,
                None => {
                    bucket.accums.insert(name, self.operator.init(incoming));
                }
            }
        }
        bucket.count += 1;
        Ok(())
    }

    /// `Accumulating -> Finalized`; runs exactly once per bucket.
    fn finalize(&self, state: &mut State, span: &IntervalSpan) {
        let Some(bucket) = state.buckets.remove(&span.id) else {
            return;
        };
        tracing::debug!(
            "{}",
            BucketFinalized {
                interval: span.id,
                contributions: bucket.count,
            }
        );
        state.frontier.insert(span.id, span.last_step + 1);
        let mut output = Dataset::new(bucket.start_time, span.id, bucket.calendar);
        for (name, accum) in bucket.accums {
            for (out_name, array) in self.operator.finalize(&name, accum, bucket.count) {
                output = output.with_array(out_name, array);
            }
        }
        state.finalized.insert(span.id, Arc::new(output));
    }

    fn poison(&self, state: &mut State, err: EngineError) -> EngineError {
        tracing::error!("{}", AccumulatorPoisoned { error: &err });
        if state.poisoned.is_none() {
            state.poisoned = Some(err.to_string());
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Array, Calendar, TimeUnits};
    use crate::stages::reduction::interval::Interval;

    fn step_dataset(step: u64, value: f64) -> Arc<Dataset> {
        Arc::new(
            Dataset::new(step as f64, step, Calendar::Gregorian)
                .with_array("prw", Array::from_f64(vec![value])),
        )
    }

    fn accumulator(
        operator: ReductionOperator,
        interval: Interval,
        n_steps: usize,
        stream_size: usize,
    ) -> TemporalAccumulator {
        let times: Vec<f64> = (0..n_steps).map(|i| i as f64).collect();
        let partition = interval
            .partition(&times, Calendar::Gregorian, &TimeUnits::days_since((2020, 1, 1)))
            .unwrap();
        TemporalAccumulator::new(operator, partition, vec!["prw".into()], stream_size)
    }

    #[tokio::test]
    async fn in_order_average_over_one_bucket() {
        let acc = accumulator(ReductionOperator::Average, Interval::Steps(3), 3, 1);
        for (step, value) in [(0, 1.0), (1, 2.0), (2, 3.0)] {
            acc.accept(step_dataset(step, value)).unwrap();
        }
        let out = acc.wait_finalized(0).await.unwrap();
        assert!((out.require_array("prw").unwrap().get_f64(0) - 2.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn out_of_order_within_stream_size_reorders() {
        let acc = accumulator(ReductionOperator::Sum, Interval::Steps(2), 4, 2);
        // deliver 1 before 0 and 3 before 2
        acc.accept(step_dataset(1, 10.0)).unwrap();
        acc.accept(step_dataset(0, 1.0)).unwrap();
        acc.accept(step_dataset(3, 100.0)).unwrap();
        acc.accept(step_dataset(2, 1000.0)).unwrap();
        let a = acc.wait_finalized(0).await.unwrap();
        let b = acc.wait_finalized(1).await.unwrap();
        assert_eq!(a.require_array("prw").unwrap().get_f64(0), 11.0);
        assert_eq!(b.require_array("prw").unwrap().get_f64(0), 1100.0);
    }

    #[tokio::test]
    async fn later_interval_completes_without_earlier_ones() {
        // only interval 2's steps are ever delivered
        let acc = accumulator(ReductionOperator::Sum, Interval::Steps(2), 6, 1);
        acc.accept(step_dataset(4, 3.0)).unwrap();
        acc.accept(step_dataset(5, 4.0)).unwrap();
        let out = acc.wait_finalized(2).await.unwrap();
        assert_eq!(out.require_array("prw").unwrap().get_f64(0), 7.0);
    }

    #[test]
    fn three_open_buckets_exhaust_stream_size_two() {
        let acc = accumulator(ReductionOperator::Average, Interval::Steps(2), 6, 2);
        // first steps of three different intervals, none can close
        acc.accept(step_dataset(2, 0.0)).unwrap();
        acc.accept(step_dataset(4, 0.0)).unwrap();
        let err = acc.accept(step_dataset(0, 0.0)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::ResourceExhaustion { open: 3, limit: 2 }
        ));
    }

    #[test]
    fn late_input_for_finalized_interval_is_an_error() {
        let acc = accumulator(ReductionOperator::Average, Interval::Steps(1), 3, 2);
        acc.accept(step_dataset(0, 1.0)).unwrap();
        acc.accept(step_dataset(1, 2.0)).unwrap();
        let err = acc.accept(step_dataset(0, 9.0)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::LateInput {
                step: 0,
                interval: 0
            }
        ));
    }

    #[test]
    fn buffered_step_delivered_twice_is_a_duplicate() {
        // step 1 of Steps(2) waits in the buffer for step 0; delivering it
        // again must not overwrite the buffered contribution
        let acc = accumulator(ReductionOperator::Sum, Interval::Steps(2), 2, 2);
        acc.accept(step_dataset(1, 10.0)).unwrap();
        let err = acc.accept(step_dataset(1, 99.0)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DuplicateInput {
                step: 1,
                interval: 0
            }
        ));
    }

    #[tokio::test]
    async fn poisoned_accumulator_fails_waiters() {
        let acc = accumulator(ReductionOperator::Average, Interval::Steps(1), 3, 2);
        acc.accept(step_dataset(0, 1.0)).unwrap();
        acc.accept(step_dataset(0, 1.0)).unwrap_err(); // poisons
        let err = acc.wait_finalized(2).await.unwrap_err();
        assert!(err.to_string().contains("reduction aborted"));
    }

    #[tokio::test]
    async fn finalized_outputs_are_retained_for_re_requests() {
        let acc = accumulator(ReductionOperator::Max, Interval::Steps(2), 2, 1);
        acc.accept(step_dataset(0, 5.0)).unwrap();
        acc.accept(step_dataset(1, 7.0)).unwrap();
        let a = acc.wait_finalized(0).await.unwrap();
        let b = acc.finalized(0).unwrap();
        assert_eq!(*a, *b);
        assert_eq!(a.require_array("prw").unwrap().get_f64(0), 7.0);
    }

    #[test]
    fn min_max_bucket_emits_both_arrays() {
        let acc = accumulator(ReductionOperator::MinMax, Interval::Steps(2), 2, 1);
        acc.accept(step_dataset(0, 5.0)).unwrap();
        acc.accept(step_dataset(1, 7.0)).unwrap();
        let out = acc.finalized(0).unwrap();
        assert_eq!(out.require_array("prw_min").unwrap().get_f64(0), 5.0);
        assert_eq!(out.require_array("prw_max").unwrap().get_f64(0), 7.0);
    }

    #[test]
    fn out_of_axis_step_is_rejected() {
        let acc = accumulator(ReductionOperator::Sum, Interval::Steps(2), 4, 2);
        let err = acc.accept(step_dataset(99, 0.0)).unwrap_err();
        assert!(matches!(err, EngineError::UnsatisfiableRequest { .. }));
    }
}
