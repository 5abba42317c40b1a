// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Regression validation: compare pipeline output against a stored baseline.
//!
//! [`DiffStage`] has two input ports. Port 0 carries the reference
//! (baseline) stream and defines the comparison domain; port 1 carries the
//! stream under test. Each output index is one comparison, keyed by
//! `test_id`, and maps to the same index on both ports even when the ports
//! name their indices differently (a reduction's `interval` against a
//! stored file's `time_step`). Success returns the reference dataset;
//! failure reports the first divergence precisely enough to find the cell.

use std::sync::Arc;

use async_trait::async_trait;

use crate::data::{keys, Dataset, MetadataReport, Request};
use crate::errors::EngineError;
use crate::observability::messages::diff::{ArrayCompared, ComparingDatasets};
use crate::pipeline::Stage;

/// Default absolute tolerance for elementwise comparison.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Elementwise comparison of two dataset streams.
pub struct DiffStage {
    tolerance: f64,
}

impl Default for DiffStage {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl DiffStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute tolerance; values within it compare equal.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Compare one reference/test pair. The first divergence wins.
    fn compare(&self, test_id: u64, reference: &Dataset, test: &Dataset) -> Result<(), EngineError> {
        tracing::debug!(
            "{}",
            ComparingDatasets {
                test_id,
                array_count: reference.len(),
            }
        );
        for (name, expected) in reference.arrays() {
            tracing::debug!("{}", ArrayCompared { array: name });
            let actual = test.array(name).ok_or_else(|| {
                EngineError::unsatisfiable(format!(
                    "test dataset for test {} is missing array '{}'",
                    test_id, name
                ))
            })?;
            if actual.shape() != expected.shape() {
                return Err(EngineError::ShapeMismatch {
                    array: name.clone(),
                    expected: expected.shape().to_vec(),
                    actual: actual.shape().to_vec(),
                });
            }
            for i in 0..expected.len() {
                let e = expected.get_f64(i);
                let a = actual.get_f64(i);
                if (e - a).abs() > self.tolerance {
                    return Err(EngineError::ValueMismatch {
                        array: name.clone(),
                        index: i,
                        coords: expected.coords_of(i),
                        expected: e,
                        actual: a,
                        tolerance: self.tolerance,
                    });
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Stage for DiffStage {
    fn name(&self) -> &str {
        "dataset_diff"
    }

    fn input_arity(&self) -> usize {
        2
    }

    fn output_metadata(&self, inputs: &[MetadataReport]) -> Result<MetadataReport, EngineError> {
        // The reference port defines how many comparisons exist.
        let reference = inputs
            .first()
            .ok_or_else(|| EngineError::Internal("diff has no reference report".into()))?;
        Ok(reference.rekeyed(keys::TEST_ID, reference.times.clone()))
    }

    fn upstream_requests(
        &self,
        inputs: &[MetadataReport],
        request: &Request,
    ) -> Result<Vec<Vec<Request>>, EngineError> {
        let test_id = request.index(keys::TEST_ID)?;
        let base = request.without(keys::TEST_ID);
        inputs
            .iter()
            .map(|port| {
                port.check_index(test_id)?;
                Ok(vec![base
                    .clone()
                    .with_index(port.request_key.clone(), test_id)])
            })
            .collect()
    }

    async fn execute(
        &self,
        mut inputs: Vec<Vec<Arc<Dataset>>>,
        request: &Request,
    ) -> Result<Arc<Dataset>, EngineError> {
        let test_id = request.index(keys::TEST_ID)?;
        if inputs.len() != 2 || inputs.iter().any(|port| port.len() != 1) {
            return Err(EngineError::Internal(format!(
                "diff expected one dataset on each of two ports for test {}",
                test_id
            )));
        }
        let test = inputs.pop().and_then(|mut p| p.pop()).ok_or_else(|| {
            EngineError::Internal("diff lost its test dataset".into())
        })?;
        let reference = inputs.pop().and_then(|mut p| p.pop()).ok_or_else(|| {
            EngineError::Internal("diff lost its reference dataset".into())
        })?;

        self.compare(test_id, &reference, &test)?;
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Array, Calendar, TimeUnits};

    fn grid(fill: f64) -> Dataset {
        Dataset::new(0.0, 0, Calendar::Gregorian)
            .with_array("prw", Array::from_f64(vec![fill; 100]))
    }

    fn ports(reference: Dataset, test: Dataset) -> Vec<Vec<Arc<Dataset>>> {
        vec![vec![Arc::new(reference)], vec![Arc::new(test)]]
    }

    fn test_request(id: u64) -> Request {
        Request::new().with_index(keys::TEST_ID, id)
    }

    #[tokio::test]
    async fn equal_datasets_compare_clean_and_return_the_reference() {
        let out = DiffStage::new()
            .execute(ports(grid(1.0), grid(1.0)), &test_request(0))
            .await
            .unwrap();
        assert_eq!(out.require_array("prw").unwrap().get_f64(0), 1.0);
    }

    #[tokio::test]
    async fn one_cell_past_tolerance_reports_coords_and_both_values() {
        let mut values = vec![1.0; 100];
        values[37] = 1.01; // one cell off by 0.01 on a 10x10 grid
        let test = Dataset::new(0.0, 0, Calendar::Gregorian).with_array(
            "prw",
            Array::new(vec![10, 10], crate::data::ArrayData::Float64(values)).unwrap(),
        );
        let reference = Dataset::new(0.0, 0, Calendar::Gregorian).with_array(
            "prw",
            Array::new(vec![10, 10], crate::data::ArrayData::Float64(vec![1.0; 100])).unwrap(),
        );

        let err = DiffStage::new()
            .with_tolerance(1e-3)
            .execute(ports(reference, test), &test_request(0))
            .await
            .unwrap_err();
        match err {
            EngineError::ValueMismatch {
                array,
                index,
                coords,
                expected,
                actual,
                ..
            } => {
                assert_eq!(array, "prw");
                assert_eq!(index, 37);
                assert_eq!(coords, vec![3, 7]);
                assert_eq!(expected, 1.0);
                assert_eq!(actual, 1.01);
            }
            other => panic!("expected ValueMismatch, got {other}"),
        }
    }

    #[tokio::test]
    async fn drift_within_tolerance_passes() {
        let test = Dataset::new(0.0, 0, Calendar::Gregorian)
            .with_array("prw", Array::from_f64(vec![1.0000001; 100]));
        assert!(DiffStage::new()
            .with_tolerance(1e-3)
            .execute(ports(grid(1.0), test), &test_request(0))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn shape_drift_is_a_shape_mismatch() {
        let test = Dataset::new(0.0, 0, Calendar::Gregorian)
            .with_array("prw", Array::from_f64(vec![1.0; 50]));
        let err = DiffStage::new()
            .execute(ports(grid(1.0), test), &test_request(0))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ShapeMismatch { .. }));
    }

    #[tokio::test]
    async fn missing_test_array_is_reported_by_name() {
        let test = Dataset::new(0.0, 0, Calendar::Gregorian)
            .with_array("psl", Array::from_f64(vec![1.0; 100]));
        let err = DiffStage::new()
            .execute(ports(grid(1.0), test), &test_request(3))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("prw"));
    }

    #[test]
    fn upstream_requests_translate_the_test_id_per_port() {
        let reference_md = MetadataReport {
            request_key: keys::TIME_STEP.into(),
            variables: vec!["prw".into()],
            times: vec![0.0, 1.0],
            calendar: Calendar::Gregorian,
            units: TimeUnits::days_since((2020, 1, 1)),
            shape: vec![10, 10],
        };
        let test_md = reference_md.rekeyed(keys::INTERVAL, vec![0.0, 1.0]);

        let upstream = DiffStage::new()
            .upstream_requests(&[reference_md, test_md], &test_request(1))
            .unwrap();
        assert_eq!(upstream[0][0].index(keys::TIME_STEP).unwrap(), 1);
        assert_eq!(upstream[1][0].index(keys::INTERVAL).unwrap(), 1);
        assert!(!upstream[0][0].contains_key(keys::TEST_ID));
    }
}
