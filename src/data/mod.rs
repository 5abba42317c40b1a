// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Data model: requests, arrays, datasets, calendars, metadata reports.

pub mod array;
pub mod calendar;
pub mod dataset;
pub mod metadata;
pub mod request;

pub use array::{Array, ArrayData};
pub use calendar::{Calendar, CalendarDate, TimeUnits};
pub use dataset::Dataset;
pub use metadata::MetadataReport;
pub use request::{Request, RequestValue};

/// Well-known request keys shared between the executive and the stages.
pub mod keys {
    /// Requested array names.
    pub const ARRAYS: &str = "arrays";
    /// Index key advertised by sources.
    pub const TIME_STEP: &str = "time_step";
    /// Index key advertised by the temporal reduction.
    pub const INTERVAL: &str = "interval";
    /// Index key advertised by the diff stage.
    pub const TEST_ID: &str = "test_id";
    /// Index key advertised by the writer stage, one per output file.
    pub const FILE: &str = "file";
}
