// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Demand-driven dataflow for gridded time-series data.
//!
//! Pipelines are acyclic graphs of [`pipeline::Stage`]s evaluated top-down:
//! a request on the terminal node is translated into upstream requests,
//! and only the steps a request actually needs are ever materialized. The
//! [`engine`] enumerates requests over a time axis and evaluates them on a
//! bounded worker pool; the [`stages`] library covers sources, temporal
//! reduction, model-backed detection, baseline diffing, and file sinks.

pub mod data; // requests, arrays, datasets, calendars
pub mod engine; // executive, scheduler, session
pub mod errors; // error taxonomy
pub mod observability;
pub mod pipeline; // graph + evaluator
pub mod stages; // stage library
