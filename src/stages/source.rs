// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline sources: where datasets enter the graph.
//!
//! [`SourceStage`] adapts anything that can describe and read a time series
//! (a [`DatasetSource`]) into a zero-input pipeline node. The stage keeps a
//! small cache of recently read steps so that overlapping interval requests
//! do not re-read the same step from storage.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::data::{keys, Calendar, Dataset, MetadataReport, Request, TimeUnits};
use crate::errors::EngineError;
use crate::pipeline::Stage;

/// Steps retained by the source-stage cache.
const CACHE_CAPACITY: usize = 8;

/// Something that can describe and read a stored time series.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Describe the addressable domain without reading any of it.
    fn metadata(&self) -> Result<MetadataReport, EngineError>;

    /// Read one time step. `arrays` restricts which variables to
    /// materialize; empty means all of them.
    async fn read(&self, step: u64, arrays: &[String]) -> Result<Dataset, EngineError>;
}

/// Zero-input stage serving datasets from a [`DatasetSource`].
pub struct SourceStage {
    source: Arc<dyn DatasetSource>,
    cache: Mutex<VecDeque<(u64, Vec<String>, Arc<Dataset>)>>,
}

impl SourceStage {
    pub fn new(source: Arc<dyn DatasetSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(VecDeque::with_capacity(CACHE_CAPACITY)),
        }
    }

    fn cached(&self, step: u64, arrays: &[String]) -> Option<Arc<Dataset>> {
        let cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        cache
            .iter()
            .find(|(s, a, _)| *s == step && a == arrays)
            .map(|(_, _, d)| d.clone())
    }

    fn remember(&self, step: u64, arrays: Vec<String>, dataset: Arc<Dataset>) {
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        if cache.len() == CACHE_CAPACITY {
            cache.pop_front();
        }
        cache.push_back((step, arrays, dataset));
    }
}

#[async_trait]
impl Stage for SourceStage {
    fn name(&self) -> &str {
        "source"
    }

    fn output_metadata(&self, _inputs: &[MetadataReport]) -> Result<MetadataReport, EngineError> {
        self.source.metadata()
    }

    async fn execute(
        &self,
        _inputs: Vec<Vec<Arc<Dataset>>>,
        request: &Request,
    ) -> Result<Arc<Dataset>, EngineError> {
        let report = self.source.metadata()?;
        let step = request.index(&report.request_key)?;
        report.check_index(step)?;
        let arrays = request.arrays();
        report.check_arrays(&arrays)?;

        if let Some(dataset) = self.cached(step, &arrays) {
            return Ok(dataset);
        }
        let dataset = Arc::new(self.source.read(step, &arrays).await?);
        self.remember(step, arrays, dataset.clone());
        Ok(dataset)
    }
}

/// Keep only `arrays` from `dataset`; empty keeps everything.
fn select_arrays(dataset: &Dataset, arrays: &[String]) -> Result<Dataset, EngineError> {
    if arrays.is_empty() {
        return Ok(dataset.clone());
    }
    let mut selected = Dataset::new(dataset.time(), dataset.index(), dataset.calendar());
    for name in arrays {
        selected = selected.with_array(name.clone(), dataset.require_array(name)?.clone());
    }
    Ok(selected)
}

/// A fully materialized source, for tests and demos.
#[derive(Debug)]
pub struct InMemorySource {
    report: MetadataReport,
    datasets: Vec<Arc<Dataset>>,
}

impl InMemorySource {
    /// `datasets` must be in step order; the report's time axis is derived
    /// from them.
    pub fn new(
        variables: Vec<String>,
        shape: Vec<usize>,
        calendar: Calendar,
        units: TimeUnits,
        datasets: Vec<Dataset>,
    ) -> Self {
        let times = datasets.iter().map(|d| d.time()).collect();
        Self {
            report: MetadataReport {
                request_key: keys::TIME_STEP.into(),
                variables,
                times,
                calendar,
                units,
                shape,
            },
            datasets: datasets.into_iter().map(Arc::new).collect(),
        }
    }
}

#[async_trait]
impl DatasetSource for InMemorySource {
    fn metadata(&self) -> Result<MetadataReport, EngineError> {
        Ok(self.report.clone())
    }

    async fn read(&self, step: u64, arrays: &[String]) -> Result<Dataset, EngineError> {
        let dataset = self.datasets.get(step as usize).ok_or_else(|| {
            EngineError::unsatisfiable(format!(
                "time step {} is outside the stored domain of {} steps",
                step,
                self.datasets.len()
            ))
        })?;
        select_arrays(dataset, arrays)
    }
}

/// Reads back the JSON files a [`crate::stages::writer::JsonSink`] emits.
///
/// Each matched file holds a JSON array of datasets; the union of all files
/// is sorted by step index to rebuild the time axis. Files are read once at
/// open time, which suits the regression-test sized series this source
/// exists for.
#[derive(Debug)]
pub struct JsonDirectorySource {
    inner: InMemorySource,
}

impl JsonDirectorySource {
    /// `pattern` is a glob, e.g. `out/reduced_*.json`. Time units are not
    /// stored in the files and must be supplied by the caller.
    pub fn open(pattern: &str, calendar: Calendar, units: TimeUnits) -> Result<Self, EngineError> {
        let paths = glob::glob(pattern)
            .map_err(|e| EngineError::unsatisfiable(format!("bad glob pattern '{pattern}': {e}")))?;

        let mut datasets: Vec<Dataset> = Vec::new();
        for path in paths {
            let path = path.map_err(|e| {
                EngineError::unsatisfiable(format!("unreadable glob match: {e}"))
            })?;
            let file = std::fs::File::open(&path)?;
            let batch: Vec<Dataset> =
                serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| {
                    EngineError::unsatisfiable(format!(
                        "malformed dataset file '{}': {e}",
                        path.display()
                    ))
                })?;
            datasets.extend(batch);
        }
        datasets.sort_by_key(Dataset::index);

        let variables = datasets
            .first()
            .map(|d| d.array_names().cloned().collect())
            .unwrap_or_default();
        let shape = datasets
            .first()
            .and_then(|d| d.arrays().next().map(|(_, a)| a.shape().to_vec()))
            .unwrap_or_default();
        Ok(Self {
            inner: InMemorySource::new(variables, shape, calendar, units, datasets),
        })
    }
}

#[async_trait]
impl DatasetSource for JsonDirectorySource {
    fn metadata(&self) -> Result<MetadataReport, EngineError> {
        self.inner.metadata()
    }

    async fn read(&self, step: u64, arrays: &[String]) -> Result<Dataset, EngineError> {
        self.inner.read(step, arrays).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Array;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_source(n: usize) -> InMemorySource {
        let datasets = (0..n)
            .map(|i| {
                Dataset::new(i as f64, i as u64, Calendar::Gregorian)
                    .with_array("prw", Array::from_f64(vec![i as f64]))
                    .with_array("psl", Array::from_f64(vec![100.0 + i as f64]))
            })
            .collect();
        InMemorySource::new(
            vec!["prw".into(), "psl".into()],
            vec![1],
            Calendar::Gregorian,
            TimeUnits::days_since((2020, 1, 1)),
            datasets,
        )
    }

    #[tokio::test]
    async fn stage_serves_steps_from_the_source() {
        let stage = SourceStage::new(Arc::new(sample_source(3)));
        let md = stage.output_metadata(&[]).unwrap();
        assert_eq!(md.num_indices(), 3);

        let out = stage
            .execute(vec![], &Request::new().with_index(keys::TIME_STEP, 2))
            .await
            .unwrap();
        assert_eq!(out.require_array("prw").unwrap().get_f64(0), 2.0);
    }

    #[tokio::test]
    async fn array_selection_drops_unrequested_variables() {
        let stage = SourceStage::new(Arc::new(sample_source(3)));
        let out = stage
            .execute(
                vec![],
                &Request::new()
                    .with_index(keys::TIME_STEP, 1)
                    .with_arrays(vec!["prw".into()]),
            )
            .await
            .unwrap();
        assert!(out.array("prw").is_some());
        assert!(out.array("psl").is_none());
    }

    #[tokio::test]
    async fn out_of_domain_step_is_unsatisfiable() {
        let stage = SourceStage::new(Arc::new(sample_source(3)));
        let err = stage
            .execute(vec![], &Request::new().with_index(keys::TIME_STEP, 9))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsatisfiableRequest { .. }));
    }

    struct CountingSource {
        inner: InMemorySource,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl DatasetSource for CountingSource {
        fn metadata(&self) -> Result<MetadataReport, EngineError> {
            self.inner.metadata()
        }

        async fn read(&self, step: u64, arrays: &[String]) -> Result<Dataset, EngineError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read(step, arrays).await
        }
    }

    #[tokio::test]
    async fn repeated_steps_are_served_from_the_cache() {
        let source = Arc::new(CountingSource {
            inner: sample_source(3),
            reads: AtomicUsize::new(0),
        });
        let stage = SourceStage::new(source.clone());
        let request = Request::new().with_index(keys::TIME_STEP, 1);
        stage.execute(vec![], &request).await.unwrap();
        stage.execute(vec![], &request).await.unwrap();
        stage.execute(vec![], &request).await.unwrap();
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn json_directory_source_reads_back_written_batches() {
        let dir = tempfile::tempdir().unwrap();
        let batches = [
            vec![
                Dataset::new(0.0, 0, Calendar::Gregorian)
                    .with_array("prw", Array::from_f64(vec![1.0])),
                Dataset::new(1.0, 1, Calendar::Gregorian)
                    .with_array("prw", Array::from_f64(vec![2.0])),
            ],
            vec![Dataset::new(2.0, 2, Calendar::Gregorian)
                .with_array("prw", Array::from_f64(vec![3.0]))],
        ];
        for (i, batch) in batches.iter().enumerate() {
            let mut file =
                std::fs::File::create(dir.path().join(format!("reduced_{i}.json"))).unwrap();
            file.write_all(serde_json::to_string(batch).unwrap().as_bytes())
                .unwrap();
        }

        let pattern = format!("{}/reduced_*.json", dir.path().display());
        let source = JsonDirectorySource::open(
            &pattern,
            Calendar::Gregorian,
            TimeUnits::days_since((2020, 1, 1)),
        )
        .unwrap();
        let md = source.metadata().unwrap();
        assert_eq!(md.num_indices(), 3);
        assert_eq!(md.times, vec![0.0, 1.0, 2.0]);

        let step = source.read(2, &[]).await.unwrap();
        assert_eq!(step.require_array("prw").unwrap().get_f64(0), 3.0);
    }

    #[test]
    fn bad_glob_pattern_is_rejected() {
        let err = JsonDirectorySource::open(
            "out/[",
            Calendar::Gregorian,
            TimeUnits::days_since((2020, 1, 1)),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::UnsatisfiableRequest { .. }));
    }
}
