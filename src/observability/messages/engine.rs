// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for scheduler and run lifecycle events.

use std::fmt::{Display, Formatter};

/// A run was submitted to the scheduler.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RunStarted<'a> {
    pub terminal: &'a str,
    pub request_count: usize,
    pub pool_size: usize,
}

impl Display for RunStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Run started against '{}': {} request(s), pool_size={}",
            self.terminal, self.request_count, self.pool_size
        )
    }
}

/// A run completed with every request satisfied.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RunCompleted {
    pub request_count: usize,
    pub duration: std::time::Duration,
}

impl Display for RunCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Run completed: {} request(s) in {:?}",
            self.request_count, self.duration
        )
    }
}

/// A single request evaluation failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct RequestFailed<'a> {
    pub ordinal: usize,
    pub error: &'a dyn std::error::Error,
}

impl Display for RequestFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Request {} failed: {}", self.ordinal, self.error)
    }
}

/// Fail-fast abort: remaining requests were discarded.
///
/// # Log Level
/// `warn!` - Degraded but handled
pub struct RunAborted {
    pub discarded: usize,
}

impl Display for RunAborted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Run aborted on first failure; {} queued request(s) discarded",
            self.discarded
        )
    }
}
