// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The stage library: sources, transforms, validators, and sinks.

pub mod detector;
pub mod diff;
pub mod reduction;
pub mod source;
pub mod writer;

pub use detector::{DetectorStage, InferenceModel, ModelThreading, ThresholdModel};
pub use diff::DiffStage;
pub use reduction::{Interval, ReductionOperator, ReductionStage};
pub use source::{DatasetSource, InMemorySource, JsonDirectorySource, SourceStage};
pub use writer::{DatasetSink, JsonSink, WriterStage};
