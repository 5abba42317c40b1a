// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging.
//!
//! Message types for all diagnostic and operational logging follow a
//! struct-based pattern with a `Display` implementation, keeping log text
//! out of the control-flow code and consistent across subsystems.
//!
//! Messages are organized by subsystem:
//! * `messages::engine` - scheduler and run lifecycle events
//! * `messages::reduction` - accumulator bucket lifecycle events
//! * `messages::diff` - validation stage progress

pub mod messages;
