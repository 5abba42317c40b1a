// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for accumulator bucket lifecycle events.

use std::fmt::{Display, Formatter};

/// A bucket received its first contribution.
///
/// # Log Level
/// `debug!` - Diagnostic detail
pub struct BucketOpened {
    pub interval: u64,
    pub step: u64,
}

impl Display for BucketOpened {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Interval {} opened by time step {}",
            self.interval, self.step
        )
    }
}

/// A bucket crossed its interval bound and was finalized.
///
/// # Log Level
/// `debug!` - Diagnostic detail
pub struct BucketFinalized {
    pub interval: u64,
    pub contributions: u64,
}

impl Display for BucketFinalized {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Interval {} finalized after {} contribution(s)",
            self.interval, self.contributions
        )
    }
}

/// The accumulator was poisoned; all waiters will observe the error.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct AccumulatorPoisoned<'a> {
    pub error: &'a dyn std::error::Error,
}

impl Display for AccumulatorPoisoned<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Accumulator poisoned: {}", self.error)
    }
}
