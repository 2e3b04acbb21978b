//! Quantity sample recorder.
//!
//! A [`QuantitySampleRecorder`] is bound to one task step and one output
//! directory. On `start` it opens a JSON-lines data file and subscribes to a
//! [`QuantityDataSource`]; the source then pushes batches from its own thread.
//! Every batch is handled end to end under one mutex: samples are converted
//! to the configured unit, written to the file in arrival order, and the
//! latest sample is updated. `stop` cancels the subscription, waits for any
//! in-flight batch to finish, and closes the file.
//!
//! ```no_run
//! use std::sync::Arc;
//! use quantity_recorder::recorder::{QuantitySampleRecorder, TaskStep};
//! use quantity_recorder::source::{QuantityType, SimulatedSource, Unit};
//!
//! let mut recorder = QuantitySampleRecorder::new(
//!     QuantityType::HeartRate,
//!     Unit::count_per_minute(),
//!     TaskStep::new("walk"),
//!     "/tmp/study",
//!     Arc::new(SimulatedSource::default()),
//! )?;
//! recorder.start()?;
//! // ... the task runs ...
//! let result = recorder.stop()?;
//! # Ok::<(), quantity_recorder::recorder::RecorderError>(())
//! ```

pub mod data_file;
pub mod error;
pub mod observer;
pub mod stats;

pub use data_file::{read_records, DataFileWriter, ReadError, SampleRecord, CONTENT_TYPE};
pub use error::RecorderError;
pub use observer::RecorderObserver;
pub use stats::{RecorderStats, StatsSnapshot};

use crate::source::{
    BatchTarget, Delivery, QuantityDataSource, QuantityType, Sample, SampleHandler, Subscription,
    Unit,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lifecycle state of a recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    /// Constructed, not started
    Idle,
    /// Subscribed and writing samples
    Recording,
    /// Stopped cleanly; the data file is closed
    Finished,
    /// Aborted by an error; the data file (if any) is closed
    Failed,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecorderState::Idle => "idle",
            RecorderState::Recording => "recording",
            RecorderState::Finished => "finished",
            RecorderState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The task step a recorder belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStep {
    pub identifier: String,
}

impl TaskStep {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    fn validate(&self) -> Result<(), RecorderError> {
        let id = self.identifier.as_str();
        if id.trim().is_empty() {
            return Err(RecorderError::Configuration(
                "step identifier must not be empty".to_string(),
            ));
        }
        if id == "." || id == ".." || id.contains(['/', '\\']) {
            return Err(RecorderError::Configuration(format!(
                "step identifier '{id}' cannot be used in a file name"
            )));
        }
        Ok(())
    }
}

/// Result of a completed recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    pub step_identifier: String,
    pub quantity_type: QuantityType,
    pub unit: Unit,
    /// Closed data file
    pub path: PathBuf,
    pub record_count: u64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub content_type: String,
}

enum Phase {
    Idle,
    Recording(DataFileWriter),
    Finished,
    Failed,
}

impl Phase {
    fn state(&self) -> RecorderState {
        match self {
            Phase::Idle => RecorderState::Idle,
            Phase::Recording(_) => RecorderState::Recording,
            Phase::Finished => RecorderState::Finished,
            Phase::Failed => RecorderState::Failed,
        }
    }
}

/// State guarded by the batch lock.
struct Inner {
    phase: Phase,
    started_at: Option<DateTime<Utc>>,
    failure: Option<RecorderError>,
    result: Option<FileResult>,
}

impl Inner {
    /// Move to `Failed`, closing the data file if one is open.
    ///
    /// Returns the path and record count of the closed file.
    fn abort(&mut self, error: &RecorderError) -> Option<(PathBuf, u64)> {
        self.failure = Some(error.clone());
        match std::mem::replace(&mut self.phase, Phase::Failed) {
            Phase::Recording(sink) => {
                let path = sink.path().to_path_buf();
                let records = sink.record_count();
                if let Err(e) = sink.close() {
                    warn!(path = %path.display(), "closing data file after failure: {e}");
                }
                Some((path, records))
            }
            _ => None,
        }
    }
}

struct Shared {
    quantity_type: QuantityType,
    unit: Unit,
    step: TaskStep,
    inner: Mutex<Inner>,
    latest: RwLock<Option<Sample>>,
    observer: RwLock<Option<Arc<dyn RecorderObserver>>>,
    stats: RecorderStats,
}

impl Shared {
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        // Batches are written all-or-nothing, so a poisoned lock still guards
        // a consistent file.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Convert, persist and publish one batch. Caller holds the batch lock.
    fn persist_batch(&self, sink: &mut DataFileWriter, batch: Vec<Sample>) -> Result<usize, RecorderError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut converted = Vec::with_capacity(batch.len());
        for sample in &batch {
            if !sample.value.is_finite() {
                return Err(RecorderError::Configuration(format!(
                    "data source delivered a non-finite {} value",
                    self.quantity_type
                )));
            }
            let sample = sample.converted_to(&self.unit).map_err(|e| {
                RecorderError::Configuration(format!(
                    "data source delivered a {} sample in {}: {e}",
                    self.quantity_type, sample.unit
                ))
            })?;
            converted.push(sample);
        }

        let records: Vec<SampleRecord> = converted
            .iter()
            .map(|s| SampleRecord::from_sample(self.quantity_type, s))
            .collect();
        sink.append_batch(&records)
            .map_err(|e| RecorderError::persistence(sink.path(), e))?;
        self.stats.record_samples(records.len() as u64);

        // Ties go to the later arrival.
        let newest = converted
            .into_iter()
            .reduce(|a, b| if b.timestamp() >= a.timestamp() { b } else { a });
        if let Some(newest) = newest {
            let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
            let regresses = latest
                .as_ref()
                .is_some_and(|current| current.timestamp() > newest.timestamp());
            if !regresses {
                *latest = Some(newest);
            }
        }

        Ok(records.len())
    }
}

/// Cheap, cloneable view of a recorder, shared with observers and the
/// delivery path.
#[derive(Clone)]
pub struct RecorderHandle {
    shared: Arc<Shared>,
}

impl RecorderHandle {
    /// The most recently received sample, in the recorder's unit.
    pub fn latest_sample(&self) -> Option<Sample> {
        self.shared
            .latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn quantity_type(&self) -> QuantityType {
        self.shared.quantity_type
    }

    pub fn unit(&self) -> Unit {
        self.shared.unit
    }

    pub fn step(&self) -> &TaskStep {
        &self.shared.step
    }

    pub fn state(&self) -> RecorderState {
        self.shared.lock_inner().phase.state()
    }

    pub fn stats(&self) -> &RecorderStats {
        &self.shared.stats
    }

    /// The error that aborted the recording, if any.
    pub fn failure(&self) -> Option<RecorderError> {
        self.shared.lock_inner().failure.clone()
    }

    fn notify(&self, f: impl FnOnce(&dyn RecorderObserver)) {
        let observer = self
            .shared
            .observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(observer) = observer {
            f(observer.as_ref());
        }
    }
}

impl BatchTarget for RecorderHandle {
    fn deliver(&self, batch: Vec<Sample>) -> Delivery {
        let shared = &self.shared;
        shared.stats.record_batch_received();
        let size = batch.len();

        let outcome = {
            let mut inner = shared.lock_inner();
            let Phase::Recording(sink) = &mut inner.phase else {
                let state = inner.phase.state();
                drop(inner);
                shared.stats.record_batch_ignored();
                debug!(%state, size, "ignoring batch, recorder is not recording");
                return Delivery::Ignored;
            };

            match shared.persist_batch(sink, batch) {
                Ok(written) => Ok(written),
                Err(error) => {
                    inner.abort(&error);
                    Err(error)
                }
            }
        };

        match outcome {
            Ok(0) => Delivery::Recorded(0),
            Ok(written) => {
                debug!(step = %shared.step.identifier, written, "batch recorded");
                self.notify(|o| o.recorder_did_update(self));
                Delivery::Recorded(written)
            }
            Err(error) => {
                error!(step = %shared.step.identifier, "recording aborted: {error}");
                self.notify(|o| o.recorder_did_fail(self, &error));
                Delivery::Aborted
            }
        }
    }
}

impl fmt::Debug for RecorderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderHandle")
            .field("quantity_type", &self.shared.quantity_type)
            .field("unit", &self.shared.unit)
            .field("step", &self.shared.step.identifier)
            .finish_non_exhaustive()
    }
}

/// Records one quantity stream to a file for the duration of a task step.
pub struct QuantitySampleRecorder {
    handle: RecorderHandle,
    output_directory: PathBuf,
    source: Arc<dyn QuantityDataSource>,
    subscription: Option<Box<dyn Subscription>>,
}

impl QuantitySampleRecorder {
    /// Create a recorder. Does not start sensing.
    ///
    /// Fails if the unit does not fit the quantity type, the source cannot
    /// deliver the pairing, the step identifier cannot name a file, or the
    /// output directory is not a writable directory.
    pub fn new(
        quantity_type: QuantityType,
        unit: Unit,
        step: TaskStep,
        output_directory: impl Into<PathBuf>,
        source: Arc<dyn QuantityDataSource>,
    ) -> Result<Self, RecorderError> {
        if !quantity_type.accepts(&unit) {
            return Err(RecorderError::Configuration(format!(
                "{quantity_type} cannot be recorded in {unit}"
            )));
        }
        if !source.supports(quantity_type, &unit) {
            return Err(RecorderError::Configuration(format!(
                "data source cannot deliver {quantity_type} in {unit}"
            )));
        }
        step.validate()?;

        let output_directory = output_directory.into();
        check_output_directory(&output_directory)?;

        let shared = Shared {
            quantity_type,
            unit,
            step,
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                started_at: None,
                failure: None,
                result: None,
            }),
            latest: RwLock::new(None),
            observer: RwLock::new(None),
            stats: RecorderStats::new(),
        };

        Ok(Self {
            handle: RecorderHandle {
                shared: Arc::new(shared),
            },
            output_directory,
            source,
            subscription: None,
        })
    }

    /// Register (or clear) the observer.
    pub fn set_observer(&self, observer: Option<Arc<dyn RecorderObserver>>) {
        *self
            .handle
            .shared
            .observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = observer;
    }

    /// Open the data file and subscribe to the data source.
    ///
    /// A recorder starts at most once. If the subscription fails the empty
    /// data file is removed and the recorder is left `Failed`.
    pub fn start(&mut self) -> Result<(), RecorderError> {
        let shared = self.handle.shared.clone();
        let file_name = format!(
            "{}-{}-{}.{}",
            shared.step.identifier,
            shared.quantity_type.identifier(),
            Uuid::new_v4().simple(),
            data_file::FILE_EXTENSION
        );
        let path = self.output_directory.join(file_name);

        {
            let mut inner = shared.lock_inner();
            if !matches!(inner.phase, Phase::Idle) {
                return Err(RecorderError::InvalidState {
                    expected: RecorderState::Idle,
                    actual: inner.phase.state(),
                });
            }

            match DataFileWriter::create(&path) {
                Ok(sink) => {
                    inner.phase = Phase::Recording(sink);
                    inner.started_at = Some(Utc::now());
                }
                Err(e) => {
                    let error = RecorderError::persistence(&path, e);
                    inner.abort(&error);
                    drop(inner);
                    return Err(self.report_failure(error));
                }
            }
        }

        // The sink must be in place before the source can push anything.
        let handler = SampleHandler::new(Arc::new(self.handle.clone()));
        match self
            .source
            .subscribe(shared.quantity_type, shared.unit, handler)
        {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                info!(
                    step = %shared.step.identifier,
                    quantity = %shared.quantity_type,
                    unit = %shared.unit,
                    path = %path.display(),
                    "recording started"
                );
                Ok(())
            }
            Err(source_error) => {
                let error = RecorderError::from(source_error);
                let closed = shared.lock_inner().abort(&error);
                if let Some((path, 0)) = closed {
                    if let Err(e) = fs::remove_file(&path) {
                        warn!(path = %path.display(), "removing empty data file: {e}");
                    }
                }
                Err(self.report_failure(error))
            }
        }
    }

    /// Stop recording and close the data file.
    ///
    /// Returns the file result the first time a running recorder is stopped
    /// and `Ok(None)` on every other call.
    pub fn stop(&mut self) -> Result<Option<FileResult>, RecorderError> {
        // Joins the delivery thread, so an in-flight batch completes first.
        self.cancel_subscription();

        let shared = self.handle.shared.clone();
        let (sink, started_at) = {
            let mut inner = shared.lock_inner();
            match std::mem::replace(&mut inner.phase, Phase::Finished) {
                Phase::Recording(sink) => (sink, inner.started_at),
                other => {
                    inner.phase = other;
                    return Ok(None);
                }
            }
        };

        let path = sink.path().to_path_buf();
        let record_count = sink.record_count();
        if let Err(e) = sink.close() {
            let error = RecorderError::persistence(&path, e);
            {
                let mut inner = shared.lock_inner();
                inner.phase = Phase::Failed;
                inner.failure = Some(error.clone());
            }
            return Err(self.report_failure(error));
        }

        let end_date = Utc::now();
        let result = FileResult {
            step_identifier: shared.step.identifier.clone(),
            quantity_type: shared.quantity_type,
            unit: shared.unit,
            path,
            record_count,
            start_date: started_at.unwrap_or(end_date),
            end_date,
            content_type: CONTENT_TYPE.to_string(),
        };
        shared.lock_inner().result = Some(result.clone());

        info!(
            step = %shared.step.identifier,
            records = record_count,
            path = %result.path.display(),
            "recording finished"
        );
        self.handle
            .notify(|o| o.recorder_did_complete(&self.handle, &result));
        Ok(Some(result))
    }

    fn cancel_subscription(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }

    fn report_failure(&self, error: RecorderError) -> RecorderError {
        error!(step = %self.handle.shared.step.identifier, "recording failed: {error}");
        self.handle
            .notify(|o| o.recorder_did_fail(&self.handle, &error));
        error
    }

    /// A handle for reading recorder state from other threads.
    pub fn handle(&self) -> RecorderHandle {
        self.handle.clone()
    }

    pub fn latest_sample(&self) -> Option<Sample> {
        self.handle.latest_sample()
    }

    pub fn quantity_type(&self) -> QuantityType {
        self.handle.quantity_type()
    }

    pub fn unit(&self) -> Unit {
        self.handle.unit()
    }

    pub fn step(&self) -> &TaskStep {
        self.handle.step()
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn state(&self) -> RecorderState {
        self.handle.state()
    }

    pub fn stats(&self) -> &RecorderStats {
        self.handle.stats()
    }

    pub fn failure(&self) -> Option<RecorderError> {
        self.handle.failure()
    }

    /// The result of the completed recording, once stopped.
    pub fn result(&self) -> Option<FileResult> {
        self.handle.shared.lock_inner().result.clone()
    }
}

impl Drop for QuantitySampleRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("stopping recorder on drop: {e}");
        }
    }
}

/// Check that `path` is an existing, writable directory.
fn check_output_directory(path: &Path) -> Result<(), RecorderError> {
    let unusable = |reason: String| RecorderError::OutputDirectory {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = fs::metadata(path).map_err(|e| unusable(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(unusable("not a directory".to_string()));
    }

    let probe = path.join(format!(".write-probe-{}", Uuid::new_v4().simple()));
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)
        .map_err(|e| unusable(format!("not writable: {e}")))?;
    if let Err(e) = fs::remove_file(&probe) {
        warn!(path = %probe.display(), "removing write probe: {e}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceError, Subscription};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Source that hands its handler to the test instead of running a thread.
    #[derive(Default)]
    struct CapturingSource {
        handler: StdMutex<Option<SampleHandler>>,
        refuse: Option<SourceError>,
    }

    struct NoopSubscription;

    impl Subscription for NoopSubscription {
        fn cancel(&mut self) {}
    }

    impl QuantityDataSource for CapturingSource {
        fn supports(&self, quantity_type: QuantityType, unit: &Unit) -> bool {
            quantity_type.accepts(unit)
        }

        fn subscribe(
            &self,
            _quantity_type: QuantityType,
            _unit: Unit,
            handler: SampleHandler,
        ) -> Result<Box<dyn Subscription>, SourceError> {
            if let Some(err) = &self.refuse {
                return Err(err.clone());
            }
            *self.handler.lock().unwrap() = Some(handler);
            Ok(Box::new(NoopSubscription))
        }
    }

    impl CapturingSource {
        fn handler(&self) -> SampleHandler {
            self.handler.lock().unwrap().clone().expect("not subscribed")
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        updates: AtomicUsize,
        failures: StdMutex<Vec<RecorderError>>,
    }

    impl RecorderObserver for CountingObserver {
        fn recorder_did_update(&self, _recorder: &RecorderHandle) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }

        fn recorder_did_fail(&self, _recorder: &RecorderHandle, error: &RecorderError) {
            self.failures.lock().unwrap().push(error.clone());
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn bpm(value: f64, secs: i64) -> Sample {
        Sample::new(value, Unit::count_per_minute(), at(secs))
    }

    fn recorder(dir: &Path, source: Arc<CapturingSource>) -> QuantitySampleRecorder {
        QuantitySampleRecorder::new(
            QuantityType::HeartRate,
            Unit::count_per_minute(),
            TaskStep::new("step"),
            dir,
            source,
        )
        .unwrap()
    }

    #[test]
    fn test_step_validation() {
        assert!(TaskStep::new("walk-1").validate().is_ok());
        assert!(TaskStep::new("").validate().is_err());
        assert!(TaskStep::new("..").validate().is_err());
        assert!(TaskStep::new("a/b").validate().is_err());
    }

    #[test]
    fn test_incompatible_unit_rejected_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        let result = QuantitySampleRecorder::new(
            QuantityType::HeartRate,
            Unit::kilogram(),
            TaskStep::new("step"),
            dir.path(),
            Arc::new(CapturingSource::default()),
        );
        assert!(matches!(result, Err(RecorderError::Configuration(_))));
    }

    #[test]
    fn test_output_directory_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain-file");
        fs::write(&file, b"x").unwrap();

        let result = QuantitySampleRecorder::new(
            QuantityType::HeartRate,
            Unit::count_per_minute(),
            TaskStep::new("step"),
            &file,
            Arc::new(CapturingSource::default()),
        );
        assert!(matches!(result, Err(RecorderError::OutputDirectory { .. })));

        // The probe file does not linger.
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_output_directory_check_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let _recorder = recorder(dir.path(), Arc::new(CapturingSource::default()));

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_write_failure_aborts_and_keeps_earlier_batches() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CapturingSource::default());
        let observer = Arc::new(CountingObserver::default());
        let mut recorder = recorder(dir.path(), source.clone());
        recorder.set_observer(Some(observer.clone()));
        recorder.start().unwrap();
        let handler = source.handler();

        assert_eq!(
            handler.deliver(vec![bpm(72.0, 0), bpm(75.0, 1)]),
            Delivery::Recorded(2)
        );

        // The disk fills up: every later write fails with ENOSPC.
        let path = {
            let mut inner = recorder.handle.shared.lock_inner();
            match &mut inner.phase {
                Phase::Recording(sink) => {
                    let full = OpenOptions::new().write(true).open("/dev/full").unwrap();
                    sink.redirect(full);
                    sink.path().to_path_buf()
                }
                _ => panic!("expected an open data file"),
            }
        };

        assert_eq!(handler.deliver(vec![bpm(74.0, 2)]), Delivery::Aborted);
        assert_eq!(recorder.state(), RecorderState::Failed);
        match recorder.failure() {
            Some(RecorderError::Persistence { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("expected persistence failure, got {other:?}"),
        }

        assert_eq!(handler.deliver(vec![bpm(76.0, 3)]), Delivery::Ignored);
        assert_eq!(observer.updates.load(Ordering::SeqCst), 1);
        assert_eq!(observer.failures.lock().unwrap().len(), 1);
        assert_eq!(recorder.latest_sample().unwrap().value, 75.0);

        assert!(recorder.stop().unwrap().is_none());
        assert_eq!(observer.failures.lock().unwrap().len(), 1);

        let values: Vec<f64> = read_records(&path)
            .unwrap()
            .iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec![72.0, 75.0]);
    }

    #[test]
    fn test_latest_sample_never_regresses() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CapturingSource::default());
        let mut recorder = recorder(dir.path(), source.clone());
        recorder.start().unwrap();
        let handler = source.handler();

        handler.deliver(vec![bpm(70.0, 5), bpm(71.0, 3)]);
        assert_eq!(recorder.latest_sample().unwrap().value, 70.0);

        // Older-only batch is written but does not move the latest sample.
        assert_eq!(handler.deliver(vec![bpm(60.0, 1)]), Delivery::Recorded(1));
        assert_eq!(recorder.latest_sample().unwrap().value, 70.0);

        // Equal timestamps resolve to the later arrival.
        handler.deliver(vec![bpm(80.0, 5)]);
        assert_eq!(recorder.latest_sample().unwrap().value, 80.0);

        let result = recorder.stop().unwrap().unwrap();
        assert_eq!(result.record_count, 4);
    }

    #[test]
    fn test_samples_are_converted_to_recorder_unit() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CapturingSource::default());
        let mut recorder = recorder(dir.path(), source.clone());
        recorder.start().unwrap();

        let per_sec = Sample::new(1.5, Unit::count_per_second(), at(0));
        source.handler().deliver(vec![per_sec]);

        let latest = recorder.latest_sample().unwrap();
        assert!((latest.value - 90.0).abs() < 1e-9);
        assert_eq!(latest.unit, Unit::count_per_minute());

        let result = recorder.stop().unwrap().unwrap();
        let records = read_records(&result.path).unwrap();
        assert_eq!(records[0].unit, Unit::count_per_minute());
        assert!((records[0].value - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_value_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CapturingSource::default());
        let mut recorder = recorder(dir.path(), source.clone());
        recorder.start().unwrap();

        let outcome = source.handler().deliver(vec![bpm(f64::NAN, 0)]);
        assert_eq!(outcome, Delivery::Aborted);
        assert_eq!(recorder.state(), RecorderState::Failed);
        assert!(recorder.latest_sample().is_none());
        assert!(matches!(
            recorder.failure(),
            Some(RecorderError::Configuration(_))
        ));
        assert!(recorder.stop().unwrap().is_none());
    }

    #[test]
    fn test_start_twice_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CapturingSource::default());
        let mut recorder = recorder(dir.path(), source);
        recorder.start().unwrap();

        match recorder.start() {
            Err(RecorderError::InvalidState { expected, actual }) => {
                assert_eq!(expected, RecorderState::Idle);
                assert_eq!(actual, RecorderState::Recording);
            }
            other => panic!("expected invalid state, got {other:?}"),
        }
        assert_eq!(recorder.state(), RecorderState::Recording);
    }

    #[test]
    fn test_refused_subscription_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CapturingSource {
            refuse: Some(SourceError::Unavailable("offline".to_string())),
            ..Default::default()
        });
        let mut recorder = recorder(dir.path(), source);

        assert!(matches!(
            recorder.start(),
            Err(RecorderError::Subscription(SourceError::Unavailable(_)))
        ));
        assert_eq!(recorder.state(), RecorderState::Failed);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_closes_recording() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CapturingSource::default());
        let mut recorder = recorder(dir.path(), source.clone());
        recorder.start().unwrap();
        let handle = recorder.handle();
        source.handler().deliver(vec![bpm(72.0, 0)]);

        drop(recorder);
        assert_eq!(handle.state(), RecorderState::Finished);
        assert_eq!(source.handler().deliver(vec![bpm(73.0, 1)]), Delivery::Ignored);
    }
}
