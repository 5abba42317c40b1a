// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed numeric buffers with a shape.

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// The element storage backing an [`Array`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayData {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Float32(v) => v.len(),
            ArrayData::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ArrayData::Float32(_) => "float32",
            ArrayData::Float64(_) => "float64",
        }
    }
}

/// An n-dimensional numeric array. Row-major, shape-checked at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Array {
    shape: Vec<usize>,
    data: ArrayData,
}

impl Array {
    /// Build an array, verifying the buffer length matches the shape.
    pub fn new(shape: Vec<usize>, data: ArrayData) -> Result<Self, EngineError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(EngineError::Internal(format!(
                "array buffer holds {} elements but shape {:?} requires {}",
                data.len(),
                shape,
                expected
            )));
        }
        Ok(Self { shape, data })
    }

    /// Convenience constructor for a 1-d float64 array.
    pub fn from_f64(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            data: ArrayData::Float64(values),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element `i` widened to f64. Comparison and finalization do not care
    /// about the storage type.
    pub fn get_f64(&self, i: usize) -> f64 {
        match &self.data {
            ArrayData::Float32(v) => v[i] as f64,
            ArrayData::Float64(v) => v[i],
        }
    }

    /// Decode a flat element index into per-dimension coordinates.
    pub fn coords_of(&self, index: usize) -> Vec<usize> {
        let mut coords = vec![0; self.shape.len()];
        let mut rem = index;
        for (dim, size) in self.shape.iter().enumerate().rev() {
            if *size > 0 {
                coords[dim] = rem % size;
                rem /= size;
            }
        }
        coords
    }

    /// Elementwise combine into `self`, used by the reduction operators.
    /// Both arrays must share shape and storage type.
    pub fn combine_with<F>(&mut self, other: &Array, name: &str, f: F) -> Result<(), EngineError>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.shape != other.shape {
            return Err(EngineError::ShapeMismatch {
                array: name.to_string(),
                expected: self.shape.clone(),
                actual: other.shape.clone(),
            });
        }
        match (&mut self.data, &other.data) {
            (ArrayData::Float32(a), ArrayData::Float32(b)) => {
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    *x = f(*x as f64, *y as f64) as f32;
                }
            }
            (ArrayData::Float64(a), ArrayData::Float64(b)) => {
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    *x = f(*x, *y);
                }
            }
            (a, b) => {
                return Err(EngineError::unsatisfiable(format!(
                    "array '{}' mixes element types {} and {}",
                    name,
                    a.type_name(),
                    b.type_name()
                )));
            }
        }
        Ok(())
    }

    /// Elementwise map in place, used by reduction finalize (e.g. divide by
    /// the contribution count).
    pub fn map_in_place<F>(&mut self, f: F)
    where
        F: Fn(f64) -> f64,
    {
        match &mut self.data {
            ArrayData::Float32(v) => {
                for x in v.iter_mut() {
                    *x = f(*x as f64) as f32;
                }
            }
            ArrayData::Float64(v) => {
                for x in v.iter_mut() {
                    *x = f(*x);
                }
            }
        }
    }
}
