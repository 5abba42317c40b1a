// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Reduction operators as a closed variant set.
//!
//! The operator is resolved once at configuration time; per-element work
//! goes through the combine/finalize pair with no string dispatch.

use std::str::FromStr;

use crate::data::Array;
use crate::errors::EngineError;

/// How contributions within one interval are folded together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionOperator {
    Average,
    Sum,
    Min,
    Max,
    /// Tracks both extrema, emitting `<name>_min` and `<name>_max`.
    MinMax,
}

impl FromStr for ReductionOperator {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "average" => Ok(Self::Average),
            "sum" => Ok(Self::Sum),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "min_max" => Ok(Self::MinMax),
            other => Err(EngineError::unsatisfiable(format!(
                "unknown reduction operator '{}' (expected average, sum, min, max or min_max)",
                other
            ))),
        }
    }
}

/// Per-array accumulation state inside a bucket.
#[derive(Debug, Clone)]
pub enum ArrayAccum {
    /// Average, sum, min and max fold into a single running array.
    Single(Array),
    /// MinMax keeps both extrema.
    Pair { min: Array, max: Array },
}

impl ReductionOperator {
    /// Start accumulation from the first contribution.
    pub fn init(&self, first: &Array) -> ArrayAccum {
        match self {
            Self::MinMax => ArrayAccum::Pair {
                min: first.clone(),
                max: first.clone(),
            },
            _ => ArrayAccum::Single(first.clone()),
        }
    }

    /// Fold one more contribution into the accumulation state.
    pub fn combine(
        &self,
        accum: &mut ArrayAccum,
        incoming: &Array,
        name: &str,
    ) -> Result<(), EngineError> {
        match (self, accum) {
            (Self::Average | Self::Sum, ArrayAccum::Single(acc)) => {
                acc.combine_with(incoming, name, |a, b| a + b)
            }
            (Self::Min, ArrayAccum::Single(acc)) => {
                acc.combine_with(incoming, name, f64::min)
            }
            (Self::Max, ArrayAccum::Single(acc)) => {
                acc.combine_with(incoming, name, f64::max)
            }
            (Self::MinMax, ArrayAccum::Pair { min, max }) => {
                min.combine_with(incoming, name, f64::min)?;
                max.combine_with(incoming, name, f64::max)
            }
            _ => Err(EngineError::Internal(format!(
                "accumulation state does not match operator {:?} for array '{}'",
                self, name
            ))),
        }
    }

    /// Turn the accumulation state into output arrays.
    pub fn finalize(&self, name: &str, accum: ArrayAccum, count: u64) -> Vec<(String, Array)> {
        match (self, accum) {
            (Self::Average, ArrayAccum::Single(mut acc)) => {
                let n = count.max(1) as f64;
                acc.map_in_place(|x| x / n);
                vec![(name.to_string(), acc)]
            }
            (_, ArrayAccum::Single(acc)) => vec![(name.to_string(), acc)],
            (_, ArrayAccum::Pair { min, max }) => vec![
                (format!("{name}_min"), min),
                (format!("{name}_max"), max),
            ],
        }
    }

    /// Output array names produced for the given input names.
    pub fn output_variables(&self, inputs: &[String]) -> Vec<String> {
        match self {
            Self::MinMax => inputs
                .iter()
                .flat_map(|n| [format!("{n}_min"), format!("{n}_max")])
                .collect(),
            _ => inputs.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(op: ReductionOperator, values: &[Vec<f64>]) -> Vec<(String, Array)> {
        let mut accum = op.init(&Array::from_f64(values[0].clone()));
        for v in &values[1..] {
            op.combine(&mut accum, &Array::from_f64(v.clone()), "x").unwrap();
        }
        op.finalize("x", accum, values.len() as u64)
    }

    #[test]
    fn average_divides_by_count() {
        let out = fold(ReductionOperator::Average, &[vec![1.0], vec![2.0], vec![3.0]]);
        assert_eq!(out.len(), 1);
        assert!((out[0].1.get_f64(0) - 2.0).abs() < 1e-3);
    }

    #[test]
    fn sum_accumulates() {
        let out = fold(ReductionOperator::Sum, &[vec![1.5], vec![2.5]]);
        assert_eq!(out[0].1.get_f64(0), 4.0);
    }

    #[test]
    fn min_and_max_track_extrema() {
        let out = fold(ReductionOperator::Min, &[vec![3.0], vec![1.0], vec![2.0]]);
        assert_eq!(out[0].1.get_f64(0), 1.0);
        let out = fold(ReductionOperator::Max, &[vec![3.0], vec![1.0], vec![2.0]]);
        assert_eq!(out[0].1.get_f64(0), 3.0);
    }

    #[test]
    fn min_max_emits_two_arrays() {
        let out = fold(ReductionOperator::MinMax, &[vec![3.0], vec![1.0]]);
        assert_eq!(out[0].0, "x_min");
        assert_eq!(out[0].1.get_f64(0), 1.0);
        assert_eq!(out[1].0, "x_max");
        assert_eq!(out[1].1.get_f64(0), 3.0);
    }

    #[test]
    fn parses_operator_names() {
        assert_eq!(
            "average".parse::<ReductionOperator>().unwrap(),
            ReductionOperator::Average
        );
        assert_eq!(
            "min_max".parse::<ReductionOperator>().unwrap(),
            ReductionOperator::MinMax
        );
        assert!("mean".parse::<ReductionOperator>().is_err());
    }

    #[test]
    fn output_variables_follow_operator() {
        let names = vec!["prw".to_string()];
        assert_eq!(
            ReductionOperator::Average.output_variables(&names),
            vec!["prw".to_string()]
        );
        assert_eq!(
            ReductionOperator::MinMax.output_variables(&names),
            vec!["prw_min".to_string(), "prw_max".to_string()]
        );
    }
}
