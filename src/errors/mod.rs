// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod engine;
mod graph;
mod run;

pub use engine::EngineError;
pub use graph::GraphError;
pub use run::{FailureMode, RequestFailure, RunError};
