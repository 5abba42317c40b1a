// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The unit of work flowing down the pipeline graph.
//!
//! A [`Request`] is an immutable mapping of named keys to typed values.
//! Stages translate a request on their output port into requests for their
//! input ports; the executive mints the initial set. Identity is the full
//! key/value set, so two requests built from the same keys compare equal and
//! can be deduplicated by callers that want to.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// A typed request value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestValue {
    /// A position in an index domain (time step, interval, test id).
    Index(u64),
    /// Names of the arrays the requester wants materialized.
    Arrays(Vec<String>),
    /// Per-dimension `[low, high]` bounds of a spatial subset.
    Extent(Vec<[u64; 2]>),
    /// Free-form marker, e.g. a locator override.
    Text(String),
}

/// An immutable key/value description of work a stage must satisfy.
///
/// Built once, then only read. Ordered storage keeps equality and debug
/// output deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Request(BTreeMap<String, RequestValue>);

impl Request {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: RequestValue) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Builder-style index insert, the most common key kind.
    pub fn with_index(self, key: impl Into<String>, index: u64) -> Self {
        self.with(key, RequestValue::Index(index))
    }

    /// Builder-style array-list insert.
    pub fn with_arrays(self, arrays: Vec<String>) -> Self {
        self.with(crate::data::keys::ARRAYS, RequestValue::Arrays(arrays))
    }

    pub fn get(&self, key: &str) -> Option<&RequestValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Copy of this request without `key`. Used when a stage rewrites its
    /// downstream index key into an upstream one.
    pub fn without(&self, key: &str) -> Self {
        let mut map = self.0.clone();
        map.remove(key);
        Self(map)
    }

    /// The index stored under `key`, or `UnsatisfiableRequest` when absent
    /// or mistyped.
    pub fn index(&self, key: &str) -> Result<u64, EngineError> {
        match self.0.get(key) {
            Some(RequestValue::Index(i)) => Ok(*i),
            Some(other) => Err(EngineError::unsatisfiable(format!(
                "request key '{}' holds {:?}, expected an index",
                key, other
            ))),
            None => Err(EngineError::unsatisfiable(format!(
                "request is missing index key '{}'",
                key
            ))),
        }
    }

    /// The requested array names, or an empty list when the requester did
    /// not constrain them.
    pub fn arrays(&self) -> Vec<String> {
        match self.0.get(crate::data::keys::ARRAYS) {
            Some(RequestValue::Arrays(names)) => names.clone(),
            _ => Vec::new(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
