// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod executive;
pub mod scheduler;
pub mod session;

pub use executive::IndexExecutive;
pub use scheduler::Scheduler;
pub use session::{EngineSession, SessionOptions};
