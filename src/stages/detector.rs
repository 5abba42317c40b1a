// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Model-backed detection: derive a probability field from an input field.
//!
//! [`DetectorStage`] wraps an [`InferenceModel`] as a one-to-one pipeline
//! node. The model sees one array per time step and returns a same-shape
//! probability array, which the stage appends to the passed-through
//! dataset under a configurable name (`ar_probability` by default, after
//! the atmospheric-river detectors this seam was built for).

use std::sync::Arc;

use async_trait::async_trait;

use crate::data::{Array, Dataset, MetadataReport, Request};
use crate::errors::EngineError;
use crate::pipeline::Stage;

/// Default name of the produced probability array.
pub const DEFAULT_OUTPUT: &str = "ar_probability";

/// Threading hints forwarded to the model backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelThreading {
    /// Intra-op threads per core, 0 for the backend default.
    pub threads_per_core: usize,
    /// Total worker threads, 0 for the backend default.
    pub thread_pool_size: usize,
}

/// A classifier turning one field into a same-shape probability field.
#[async_trait]
pub trait InferenceModel: Send + Sync {
    async fn infer(
        &self,
        input: &Array,
        threading: &ModelThreading,
    ) -> Result<Array, EngineError>;
}

/// One-to-one stage appending a model's probability field to each step.
pub struct DetectorStage {
    model: Arc<dyn InferenceModel>,
    variable: String,
    output: String,
    threading: ModelThreading,
}

impl DetectorStage {
    /// Detect on `variable`, writing the result as [`DEFAULT_OUTPUT`].
    pub fn new(model: Arc<dyn InferenceModel>, variable: impl Into<String>) -> Self {
        Self {
            model,
            variable: variable.into(),
            output: DEFAULT_OUTPUT.into(),
            threading: ModelThreading::default(),
        }
    }

    /// Name the produced probability array.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_threading(mut self, threading: ModelThreading) -> Self {
        self.threading = threading;
        self
    }
}

#[async_trait]
impl Stage for DetectorStage {
    fn name(&self) -> &str {
        "detector"
    }

    fn input_arity(&self) -> usize {
        1
    }

    fn output_metadata(&self, inputs: &[MetadataReport]) -> Result<MetadataReport, EngineError> {
        let upstream = inputs
            .first()
            .ok_or_else(|| EngineError::Internal("detector has no upstream report".into()))?;
        upstream.check_arrays(std::slice::from_ref(&self.variable))?;

        let mut variables = upstream.variables.clone();
        if !variables.contains(&self.output) {
            variables.push(self.output.clone());
        }
        Ok(upstream.clone().with_variables(variables))
    }

    fn upstream_requests(
        &self,
        _inputs: &[MetadataReport],
        request: &Request,
    ) -> Result<Vec<Vec<Request>>, EngineError> {
        // The probability array does not exist upstream; request the model
        // input in its place.
        let mut arrays = request.arrays();
        arrays.retain(|name| *name != self.output);
        if !arrays.is_empty() && !arrays.contains(&self.variable) {
            arrays.push(self.variable.clone());
        }
        let upstream = if arrays.is_empty() {
            request.without(crate::data::keys::ARRAYS)
        } else {
            request.clone().with_arrays(arrays)
        };
        Ok(vec![vec![upstream]])
    }

    async fn execute(
        &self,
        inputs: Vec<Vec<Arc<Dataset>>>,
        _request: &Request,
    ) -> Result<Arc<Dataset>, EngineError> {
        let step = inputs
            .into_iter()
            .flatten()
            .next()
            .ok_or_else(|| EngineError::Internal("detector received no input dataset".into()))?;

        let field = step.require_array(&self.variable)?;
        let probability = self.model.infer(field, &self.threading).await?;
        if probability.shape() != field.shape() {
            return Err(EngineError::ShapeMismatch {
                array: self.output.clone(),
                expected: field.shape().to_vec(),
                actual: probability.shape().to_vec(),
            });
        }
        Ok(Arc::new(
            step.as_ref()
                .clone()
                .with_array(self.output.clone(), probability),
        ))
    }
}

/// Trivial stand-in model: probability 1 at or above a threshold, else 0.
pub struct ThresholdModel {
    pub threshold: f64,
}

#[async_trait]
impl InferenceModel for ThresholdModel {
    async fn infer(
        &self,
        input: &Array,
        _threading: &ModelThreading,
    ) -> Result<Array, EngineError> {
        let mut probability = input.clone();
        let threshold = self.threshold;
        probability.map_in_place(|v| if v >= threshold { 1.0 } else { 0.0 });
        Ok(probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{keys, Calendar};

    fn step_with_ivt(values: Vec<f64>) -> Arc<Dataset> {
        Arc::new(
            Dataset::new(0.0, 0, Calendar::Gregorian).with_array("ivt", Array::from_f64(values)),
        )
    }

    fn detector(threshold: f64) -> DetectorStage {
        DetectorStage::new(Arc::new(ThresholdModel { threshold }), "ivt")
    }

    #[tokio::test]
    async fn appends_probability_next_to_the_input_field() {
        let out = detector(250.0)
            .execute(vec![vec![step_with_ivt(vec![100.0, 300.0, 250.0])]], &Request::new())
            .await
            .unwrap();
        let prob = out.require_array(DEFAULT_OUTPUT).unwrap();
        assert_eq!(prob.get_f64(0), 0.0);
        assert_eq!(prob.get_f64(1), 1.0);
        assert_eq!(prob.get_f64(2), 1.0);
        assert!(out.array("ivt").is_some());
    }

    #[tokio::test]
    async fn metadata_advertises_the_probability_array() {
        let upstream = MetadataReport {
            request_key: keys::TIME_STEP.into(),
            variables: vec!["ivt".into()],
            times: vec![0.0],
            calendar: Calendar::Gregorian,
            units: crate::data::TimeUnits::days_since((2020, 1, 1)),
            shape: vec![3],
        };
        let md = detector(250.0).output_metadata(&[upstream]).unwrap();
        assert!(md.has_variable(DEFAULT_OUTPUT));
        assert!(md.has_variable("ivt"));
    }

    #[tokio::test]
    async fn missing_input_variable_is_unsatisfiable() {
        let upstream = MetadataReport {
            request_key: keys::TIME_STEP.into(),
            variables: vec!["prw".into()],
            times: vec![0.0],
            calendar: Calendar::Gregorian,
            units: crate::data::TimeUnits::days_since((2020, 1, 1)),
            shape: vec![3],
        };
        let err = detector(250.0).output_metadata(&[upstream]).unwrap_err();
        assert!(err.to_string().contains("ivt"));
    }

    #[test]
    fn upstream_requests_swap_the_output_for_the_input_field() {
        let request = Request::new()
            .with_index(keys::TIME_STEP, 4)
            .with_arrays(vec![DEFAULT_OUTPUT.into()]);
        let upstream = detector(250.0).upstream_requests(&[], &request).unwrap();
        assert_eq!(upstream.len(), 1);
        assert_eq!(upstream[0].len(), 1);
        assert_eq!(upstream[0][0].arrays(), vec!["ivt".to_string()]);
        assert_eq!(upstream[0][0].index(keys::TIME_STEP).unwrap(), 4);
    }

    struct WrongShapeModel;

    #[async_trait]
    impl InferenceModel for WrongShapeModel {
        async fn infer(
            &self,
            _input: &Array,
            _threading: &ModelThreading,
        ) -> Result<Array, EngineError> {
            Ok(Array::from_f64(vec![0.0]))
        }
    }

    #[tokio::test]
    async fn model_shape_drift_is_reported() {
        let stage = DetectorStage::new(Arc::new(WrongShapeModel), "ivt");
        let err = stage
            .execute(vec![vec![step_with_ivt(vec![1.0, 2.0])]], &Request::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ShapeMismatch { .. }));
    }
}
