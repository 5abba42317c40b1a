// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Interval rules: how a time axis is cut into reduction buckets.

use std::str::FromStr;

use crate::data::{Calendar, TimeUnits};
use crate::errors::EngineError;

/// A time-based grouping rule defining bucket boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Daily,
    Monthly,
    /// Meteorological seasons (DJF, MAM, JJA, SON); December counts toward
    /// the following year's DJF.
    Seasonal,
    Yearly,
    /// Calendar-free fixed windows of `n` steps.
    Steps(u64),
}

impl FromStr for Interval {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => return Ok(Self::Daily),
            "monthly" => return Ok(Self::Monthly),
            "seasonal" => return Ok(Self::Seasonal),
            "yearly" => return Ok(Self::Yearly),
            _ => {}
        }
        if let Some(n) = s.strip_suffix("_steps").and_then(|n| n.parse::<u64>().ok()) {
            if n == 0 {
                return Err(EngineError::unsatisfiable("interval '0_steps' is empty"));
            }
            return Ok(Self::Steps(n));
        }
        Err(EngineError::unsatisfiable(format!(
            "unknown interval '{}' (expected daily, monthly, seasonal, yearly or <n>_steps)",
            s
        )))
    }
}

/// One bucket's slice of the time axis: a contiguous step range plus the
/// time bounds it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalSpan {
    /// Ordinal of this span in the partition; the reduction's output index.
    pub id: u64,
    pub first_step: u64,
    pub last_step: u64,
    /// Time value of the first contributing step.
    pub start_time: f64,
    /// Time value of the last contributing step.
    pub end_time: f64,
}

impl IntervalSpan {
    pub fn contains_step(&self, step: u64) -> bool {
        (self.first_step..=self.last_step).contains(&step)
    }

    pub fn steps(&self) -> impl Iterator<Item = u64> {
        self.first_step..=self.last_step
    }
}

/// The full partition of a time axis under one interval rule.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntervalPartition {
    spans: Vec<IntervalSpan>,
}

impl IntervalPartition {
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn spans(&self) -> &[IntervalSpan] {
        &self.spans
    }

    pub fn span(&self, id: u64) -> Option<&IntervalSpan> {
        self.spans.get(id as usize)
    }

    /// The span containing `step`. Spans are contiguous and ascending, so a
    /// binary search on the step range suffices.
    pub fn span_for_step(&self, step: u64) -> Option<&IntervalSpan> {
        let idx = self
            .spans
            .partition_point(|s| s.last_step < step);
        self.spans.get(idx).filter(|s| s.contains_step(step))
    }

    /// Total number of time steps covered.
    pub fn total_steps(&self) -> u64 {
        self.spans.last().map(|s| s.last_step + 1).unwrap_or(0)
    }

    /// Start time of each span, the reduction's output time axis.
    pub fn start_times(&self) -> Vec<f64> {
        self.spans.iter().map(|s| s.start_time).collect()
    }
}

impl Interval {
    /// Partition `times` (ascending, one entry per step) into spans.
    ///
    /// Buckets are defined by where the decoded calendar key changes, so
    /// irregular cadences (missing steps, sub-daily output) group correctly
    /// without any per-bucket step-count assumption.
    pub fn partition(
        &self,
        times: &[f64],
        calendar: Calendar,
        units: &TimeUnits,
    ) -> Result<IntervalPartition, EngineError> {
        let mut spans: Vec<IntervalSpan> = Vec::new();
        let mut current_key: Option<(i64, u32, u32)> = None;

        for (step, &time) in times.iter().enumerate() {
            let step = step as u64;
            let key = match self {
                Interval::Steps(n) => (0, (step / n) as u32, 0),
                _ => {
                    let date = calendar.decode(time, units);
                    match self {
                        Interval::Daily => (date.year, date.month, date.day),
                        Interval::Monthly => (date.year, date.month, 0),
                        Interval::Seasonal => {
                            let (year, season) = date.season();
                            (year, season, 0)
                        }
                        Interval::Yearly => (date.year, 0, 0),
                        Interval::Steps(_) => unreachable!(),
                    }
                }
            };

            if current_key == Some(key) {
                if let Some(span) = spans.last_mut() {
                    if time < span.end_time {
                        return Err(EngineError::unsatisfiable(
                            "time axis is not monotonically increasing",
                        ));
                    }
                    span.last_step = step;
                    span.end_time = time;
                }
            } else {
                if let Some(span) = spans.last() {
                    if time < span.end_time {
                        return Err(EngineError::unsatisfiable(
                            "time axis is not monotonically increasing",
                        ));
                    }
                }
                spans.push(IntervalSpan {
                    id: spans.len() as u64,
                    first_step: step,
                    last_step: step,
                    start_time: time,
                    end_time: time,
                });
                current_key = Some(key);
            }
        }

        Ok(IntervalPartition { spans })
    }
}
