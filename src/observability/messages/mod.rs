// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display`; call sites pass them to the
//! `tracing` macros. Organized by subsystem:
//!
//! * `engine` - scheduler and run lifecycle events
//! * `reduction` - accumulator bucket lifecycle events
//! * `diff` - validation stage progress

pub mod diff;
pub mod engine;
pub mod reduction;
