// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The executive: turns an output intent into a concrete request set.
//!
//! Given a terminal node, the executive queries its metadata report for the
//! valid index domain and mints one request per index, tagged with the
//! report's request key and the configured array list. Ordering is
//! index-ascending; downstream temporal reductions rely on requests being
//! submitted in that order.

use crate::data::{MetadataReport, Request};
use crate::errors::EngineError;
use crate::pipeline::{Evaluator, NodeId};

/// Enumerates the requests needed to cover a terminal node's domain.
#[derive(Debug, Clone, Default)]
pub struct IndexExecutive {
    arrays: Vec<String>,
    first: Option<u64>,
    last: Option<u64>,
}

impl IndexExecutive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arrays every request will ask for.
    pub fn with_arrays(mut self, arrays: Vec<String>) -> Self {
        self.arrays = arrays;
        self
    }

    /// Clamp the run to a sub-range of the domain (inclusive bounds).
    pub fn with_bounds(mut self, first: u64, last: u64) -> Self {
        self.first = Some(first);
        self.last = Some(last);
        self
    }

    /// Build the request set for one index of the domain described by `md`.
    fn request_for(&self, md: &MetadataReport, index: u64) -> Request {
        let req = Request::new().with_index(md.request_key.clone(), index);
        if self.arrays.is_empty() {
            req
        } else {
            req.with_arrays(self.arrays.clone())
        }
    }

    /// Enumerate the full, ordered request collection for `terminal`.
    ///
    /// An empty domain yields zero requests; the run then completes
    /// trivially, which is not an error.
    pub async fn requests(
        &self,
        evaluator: &Evaluator,
        terminal: NodeId,
    ) -> Result<Vec<Request>, EngineError> {
        let md = evaluator.metadata(terminal).await?;
        md.check_arrays(&self.arrays)?;

        let n = md.num_indices();
        if n == 0 {
            return Ok(Vec::new());
        }

        let first = self.first.unwrap_or(0);
        let last = self.last.unwrap_or(n - 1).min(n - 1);
        if first > last {
            return Ok(Vec::new());
        }

        Ok((first..=last).map(|i| self.request_for(&md, i)).collect())
    }
}
