// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-memory dataset container.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::array::Array;
use crate::data::calendar::Calendar;
use crate::errors::EngineError;

/// A collection of named arrays plus time metadata, produced by exactly one
/// stage evaluation. Never mutated after production; downstream consumers
/// share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Time value in the source's units
    time: f64,
    /// Index of this dataset in its producer's index domain
    index: u64,
    calendar: Calendar,
    arrays: BTreeMap<String, Array>,
}

impl Dataset {
    pub fn new(time: f64, index: u64, calendar: Calendar) -> Self {
        Self {
            time,
            index,
            calendar,
            arrays: BTreeMap::new(),
        }
    }

    /// Builder-style array insert.
    pub fn with_array(mut self, name: impl Into<String>, array: Array) -> Self {
        self.arrays.insert(name.into(), array);
        self
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn array(&self, name: &str) -> Option<&Array> {
        self.arrays.get(name)
    }

    /// The named array, or `UnsatisfiableRequest` naming what was missing.
    pub fn require_array(&self, name: &str) -> Result<&Array, EngineError> {
        self.arrays.get(name).ok_or_else(|| {
            EngineError::unsatisfiable(format!("dataset has no array '{}'", name))
        })
    }

    pub fn array_names(&self) -> impl Iterator<Item = &String> {
        self.arrays.keys()
    }

    pub fn arrays(&self) -> impl Iterator<Item = (&String, &Array)> {
        self.arrays.iter()
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}
