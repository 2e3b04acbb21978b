//! Optional observer notified about recorder progress.

use crate::recorder::{FileResult, RecorderError, RecorderHandle};

/// Listener for recorder events. Every method is optional.
///
/// Callbacks run on whichever thread triggered them: `recorder_did_update`
/// on the data source's delivery thread, the others on the caller of
/// `start`/`stop` or on the delivery thread when a batch fails. They must not
/// call back into `stop`.
pub trait RecorderObserver: Send + Sync {
    /// A batch was persisted; re-read [`RecorderHandle::latest_sample`].
    fn recorder_did_update(&self, _recorder: &RecorderHandle) {}

    /// The recording failed and was aborted. Called at most once.
    fn recorder_did_fail(&self, _recorder: &RecorderHandle, _error: &RecorderError) {}

    /// The recording finished and the data file is closed.
    fn recorder_did_complete(&self, _recorder: &RecorderHandle, _result: &FileResult) {}
}
