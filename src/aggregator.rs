//! Ownership of the accumulated result and snapshot delivery.

use crate::model::CheckResult;
use crate::value::{ValueId, ValueNode};
use tracing::trace;

/// Receives a snapshot after every change to the result.
///
/// Snapshots only ever grow more complete; a sink may be called many times
/// during one run.
pub type ResultSink = Box<dyn FnMut(&CheckResult) + Send>;

/// Owns the one [`CheckResult`] of a run.
///
/// The result is only changed through [`update`](Self::update), which runs a
/// whole change before the sink sees it.
pub struct ResultAggregator {
    result: CheckResult,
    sink: Option<ResultSink>,
    finished: bool,
    pushes: usize,
}

impl ResultAggregator {
    pub fn new(result: CheckResult) -> Self {
        Self {
            result,
            sink: None,
            finished: false,
            pushes: 0,
        }
    }

    pub(crate) fn set_sink(&mut self, sink: ResultSink) {
        self.sink = Some(sink);
    }

    pub fn snapshot(&self) -> &CheckResult {
        &self.result
    }

    /// True once the input stream has ended and the result is final.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of snapshots delivered to the sink so far.
    pub fn push_count(&self) -> usize {
        self.pushes
    }

    pub fn find_value(&self, id: ValueId) -> Option<&ValueNode> {
        self.result.find_value(id)
    }

    pub fn take_result(self) -> CheckResult {
        self.result
    }

    /// Apply `change`, then push a snapshot if it reports a change.
    pub(crate) fn update(&mut self, change: impl FnOnce(&mut CheckResult) -> bool) -> bool {
        let changed = change(&mut self.result);
        if changed {
            self.push();
        }
        changed
    }

    pub(crate) fn mark_finished(&mut self) {
        self.finished = true;
    }

    fn push(&mut self) {
        self.pushes += 1;
        if let Some(sink) = self.sink.as_mut() {
            trace!(push = self.pushes, "Pushing result snapshot");
            sink(&self.result);
        }
    }
}

impl std::fmt::Debug for ResultAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultAggregator")
            .field("state", &self.result.state)
            .field("status", &self.result.status)
            .field("finished", &self.finished)
            .field("pushes", &self.pushes)
            .finish_non_exhaustive()
    }
}
