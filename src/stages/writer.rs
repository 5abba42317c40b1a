// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline sinks: where datasets leave the graph.
//!
//! [`WriterStage`] groups its upstream time series into files,
//! `steps_per_file` steps each, and hands every group to a [`DatasetSink`].
//! File names come from a template in which `%t%` is replaced with the
//! first step index of the group, so a four-step series written two steps
//! per file through `out/reduced_%t%.json` lands in `reduced_0.json` and
//! `reduced_2.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::data::{keys, Dataset, MetadataReport, Request};
use crate::errors::EngineError;
use crate::pipeline::Stage;

/// Marker in file-name templates replaced with the group's first step.
pub const TIME_MARKER: &str = "%t%";

/// Something that can persist a group of datasets as one file.
#[async_trait]
pub trait DatasetSink: Send + Sync {
    async fn write(&self, path: &Path, datasets: &[Arc<Dataset>]) -> Result<(), EngineError>;
}

/// One-input stage persisting the stream it passes through.
///
/// The output index domain is one index per file. Executing file `f`
/// requests that file's steps upstream, writes them, and yields the
/// group's first dataset.
pub struct WriterStage {
    sink: Arc<dyn DatasetSink>,
    template: String,
    steps_per_file: u64,
}

impl WriterStage {
    pub fn new(sink: Arc<dyn DatasetSink>, template: impl Into<String>) -> Self {
        Self {
            sink,
            template: template.into(),
            steps_per_file: 1,
        }
    }

    pub fn with_steps_per_file(mut self, steps_per_file: u64) -> Self {
        self.steps_per_file = steps_per_file.max(1);
        self
    }

    fn path_for(&self, first_step: u64) -> PathBuf {
        PathBuf::from(self.template.replace(TIME_MARKER, &first_step.to_string()))
    }

    /// `[first, last]` upstream steps of file `file`, clamped to `total`.
    fn group_bounds(&self, file: u64, total: u64) -> Result<(u64, u64), EngineError> {
        let first = file * self.steps_per_file;
        if first >= total {
            return Err(EngineError::unsatisfiable(format!(
                "file {} is outside the writable domain of {} steps",
                file, total
            )));
        }
        let last = (first + self.steps_per_file - 1).min(total - 1);
        Ok((first, last))
    }
}

#[async_trait]
impl Stage for WriterStage {
    fn name(&self) -> &str {
        "writer"
    }

    fn input_arity(&self) -> usize {
        1
    }

    fn output_metadata(&self, inputs: &[MetadataReport]) -> Result<MetadataReport, EngineError> {
        let upstream = inputs
            .first()
            .ok_or_else(|| EngineError::Internal("writer has no upstream report".into()))?;
        let files: Vec<f64> = upstream
            .times
            .iter()
            .step_by(self.steps_per_file as usize)
            .copied()
            .collect();
        if files.len() > 1 && !self.template.contains(TIME_MARKER) {
            return Err(EngineError::unsatisfiable(format!(
                "file template '{}' has no '{}' marker but {} files would be written",
                self.template,
                TIME_MARKER,
                files.len()
            )));
        }
        Ok(upstream.rekeyed(keys::FILE, files))
    }

    fn upstream_requests(
        &self,
        inputs: &[MetadataReport],
        request: &Request,
    ) -> Result<Vec<Vec<Request>>, EngineError> {
        let upstream = inputs
            .first()
            .ok_or_else(|| EngineError::Internal("writer has no upstream report".into()))?;
        let file = request.index(keys::FILE)?;
        let (first, last) = self.group_bounds(file, upstream.num_indices())?;
        let base = request.without(keys::FILE);
        Ok(vec![(first..=last)
            .map(|step| base.clone().with_index(upstream.request_key.clone(), step))
            .collect()])
    }

    async fn execute(
        &self,
        inputs: Vec<Vec<Arc<Dataset>>>,
        request: &Request,
    ) -> Result<Arc<Dataset>, EngineError> {
        let file = request.index(keys::FILE)?;
        let group = inputs
            .into_iter()
            .next()
            .filter(|g| !g.is_empty())
            .ok_or_else(|| {
                EngineError::Internal(format!("writer received no datasets for file {file}"))
            })?;

        let path = self.path_for(group[0].index());
        self.sink.write(&path, &group).await?;
        Ok(group[0].clone())
    }
}

/// Writes each group as a JSON array of datasets.
pub struct JsonSink;

#[async_trait]
impl DatasetSink for JsonSink {
    async fn write(&self, path: &Path, datasets: &[Arc<Dataset>]) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let plain: Vec<&Dataset> = datasets.iter().map(Arc::as_ref).collect();
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), &plain).map_err(|e| {
            EngineError::Internal(format!("failed to encode '{}': {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Array, Calendar, TimeUnits};
    use std::sync::Mutex;

    fn step(i: u64) -> Arc<Dataset> {
        Arc::new(
            Dataset::new(i as f64, i, Calendar::Gregorian)
                .with_array("prw", Array::from_f64(vec![i as f64])),
        )
    }

    fn upstream_md(n: usize) -> MetadataReport {
        MetadataReport {
            request_key: keys::TIME_STEP.into(),
            variables: vec!["prw".into()],
            times: (0..n).map(|i| i as f64).collect(),
            calendar: Calendar::Gregorian,
            units: TimeUnits::days_since((2020, 1, 1)),
            shape: vec![1],
        }
    }

    /// Records paths and group sizes instead of touching the filesystem.
    struct RecordingSink {
        written: Mutex<Vec<(PathBuf, usize)>>,
    }

    #[async_trait]
    impl DatasetSink for RecordingSink {
        async fn write(&self, path: &Path, datasets: &[Arc<Dataset>]) -> Result<(), EngineError> {
            self.written
                .lock()
                .unwrap()
                .push((path.to_path_buf(), datasets.len()));
            Ok(())
        }
    }

    #[test]
    fn metadata_groups_steps_into_files() {
        let stage = WriterStage::new(Arc::new(JsonSink), "out/r_%t%.json").with_steps_per_file(2);
        let md = stage.output_metadata(&[upstream_md(5)]).unwrap();
        assert_eq!(md.request_key, keys::FILE);
        assert_eq!(md.times, vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn template_without_marker_rejects_multi_file_runs() {
        let stage = WriterStage::new(Arc::new(JsonSink), "out/r.json").with_steps_per_file(2);
        assert!(stage.output_metadata(&[upstream_md(5)]).is_err());
        assert!(stage.output_metadata(&[upstream_md(2)]).is_ok());
    }

    #[test]
    fn file_requests_expand_to_their_steps() {
        let stage = WriterStage::new(Arc::new(JsonSink), "r_%t%.json").with_steps_per_file(2);
        let upstream = stage
            .upstream_requests(&[upstream_md(5)], &Request::new().with_index(keys::FILE, 2))
            .unwrap();
        // last file is short: only step 4 exists
        assert_eq!(upstream[0].len(), 1);
        assert_eq!(upstream[0][0].index(keys::TIME_STEP).unwrap(), 4);
    }

    #[tokio::test]
    async fn execute_names_the_file_after_the_first_step() {
        let sink = Arc::new(RecordingSink {
            written: Mutex::new(Vec::new()),
        });
        let stage = WriterStage::new(sink.clone(), "out/r_%t%.json").with_steps_per_file(2);
        let out = stage
            .execute(
                vec![vec![step(2), step(3)]],
                &Request::new().with_index(keys::FILE, 1),
            )
            .await
            .unwrap();
        assert_eq!(out.index(), 2);
        let written = sink.written.lock().unwrap();
        assert_eq!(written.as_slice(), &[(PathBuf::from("out/r_2.json"), 2)]);
    }

    #[tokio::test]
    async fn json_sink_round_trips_through_serde() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r_0.json");
        JsonSink.write(&path, &[step(0), step(1)]).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: Vec<Dataset> = serde_json::from_str(&text).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[1].require_array("prw").unwrap().get_f64(0), 1.0);
    }
}
