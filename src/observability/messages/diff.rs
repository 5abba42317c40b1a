// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for validation stage progress.

use std::fmt::{Display, Formatter};

/// One comparison request started.
///
/// # Log Level
/// `debug!` - Diagnostic detail
pub struct ComparingDatasets {
    pub test_id: u64,
    pub array_count: usize,
}

impl Display for ComparingDatasets {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Comparing datasets for test {}: {} array(s)",
            self.test_id, self.array_count
        )
    }
}

/// One array compared clean.
///
/// # Log Level
/// `debug!` - Diagnostic detail
pub struct ArrayCompared<'a> {
    pub array: &'a str,
}

impl Display for ArrayCompared<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "  comparing array '{}'", self.array)
    }
}
