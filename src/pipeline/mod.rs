// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod evaluator;
pub mod graph;
pub mod stage;

pub use evaluator::Evaluator;
pub use graph::{NodeId, Pipeline};
pub use stage::Stage;
