// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-stage description of the addressable domain.
//!
//! A [`MetadataReport`] answers "what can this output port produce" without
//! producing anything: how many indices exist, what the index key is called,
//! which arrays are available, and how the time axis is laid out. Reports
//! propagate upstream lazily and are memoized per pipeline node by the
//! evaluator; they are recomputed only when a new graph is built.

use serde::{Deserialize, Serialize};

use crate::data::calendar::{Calendar, TimeUnits};
use crate::errors::EngineError;

/// What an output port can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataReport {
    /// Key downstream requests must use to select an index
    /// (e.g. `"time_step"`, `"interval"`, `"test_id"`).
    pub request_key: String,
    /// Names of the arrays this port can materialize.
    pub variables: Vec<String>,
    /// Time value for each index, ascending. Its length is the domain size.
    pub times: Vec<f64>,
    pub calendar: Calendar,
    pub units: TimeUnits,
    /// Spatial shape of produced arrays.
    pub shape: Vec<usize>,
}

impl MetadataReport {
    /// Number of addressable indices.
    pub fn num_indices(&self) -> u64 {
        self.times.len() as u64
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }

    /// Verify every requested array is advertised here.
    pub fn check_arrays(&self, requested: &[String]) -> Result<(), EngineError> {
        for name in requested {
            if !self.has_variable(name) {
                return Err(EngineError::unsatisfiable(format!(
                    "array '{}' is not advertised upstream (have: {})",
                    name,
                    self.variables.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Verify `index` is inside the advertised domain.
    pub fn check_index(&self, index: u64) -> Result<(), EngineError> {
        if index >= self.num_indices() {
            return Err(EngineError::unsatisfiable(format!(
                "index {} is outside the advertised domain of {} indices",
                index,
                self.num_indices()
            )));
        }
        Ok(())
    }

    /// Builder-style replacement of the advertised variables. Used by
    /// stages whose outputs are not named like their inputs.
    pub fn with_variables(mut self, variables: Vec<String>) -> Self {
        self.variables = variables;
        self
    }

    /// A copy advertising a different index domain, keeping axis metadata.
    /// Used by stages that re-key their output (reduction, diff).
    pub fn rekeyed(&self, request_key: impl Into<String>, times: Vec<f64>) -> Self {
        Self {
            request_key: request_key.into(),
            times,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> MetadataReport {
        MetadataReport {
            request_key: "time_step".into(),
            variables: vec!["prw".into(), "psl".into()],
            times: vec![0.0, 1.0, 2.0],
            calendar: Calendar::Gregorian,
            units: TimeUnits::days_since((2020, 1, 1)),
            shape: vec![4, 4],
        }
    }

    #[test]
    fn check_arrays_names_the_offender() {
        let md = report();
        assert!(md.check_arrays(&["prw".into()]).is_ok());
        let err = md.check_arrays(&["ivt".into()]).unwrap_err();
        assert!(err.to_string().contains("ivt"));
    }

    #[test]
    fn check_index_bounds_the_domain() {
        let md = report();
        assert!(md.check_index(2).is_ok());
        assert!(md.check_index(3).is_err());
    }

    #[test]
    fn rekeyed_replaces_domain_only() {
        let md = report().rekeyed("interval", vec![0.0]);
        assert_eq!(md.request_key, "interval");
        assert_eq!(md.num_indices(), 1);
        assert_eq!(md.shape, vec![4, 4]);
    }
}
