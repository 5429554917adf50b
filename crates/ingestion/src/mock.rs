//! Scripted driver
//!
//! Test double for the `SourceDriver` seam. Reads are served from a queue
//! that the test fills through a [`ScriptHandle`] while the loop is running.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use contracts::{DriverError, SourceDriver, SourceId, SourceSnapshot};
use parking_lot::{Condvar, Mutex};

/// Wait for a step before answering with a timeout
const IDLE_WAIT: Duration = Duration::from_millis(20);

/// One scripted answer
#[derive(Debug)]
pub enum ScriptStep {
    /// Return this snapshot
    Read(SourceSnapshot),
    /// Fail with this error
    Fail(DriverError),
    /// Panic inside `read_all`
    Panic,
}

#[derive(Debug, Default)]
struct Script {
    steps: Mutex<VecDeque<ScriptStep>>,
    ready: Condvar,
}

/// Producer side of a [`ScriptedDriver`]
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    script: Arc<Script>,
}

impl ScriptHandle {
    /// Queue a step
    pub fn push(&self, step: ScriptStep) {
        self.script.steps.lock().push_back(step);
        self.script.ready.notify_one();
    }

    /// Queue a successful read
    pub fn push_ok(&self, snapshot: SourceSnapshot) {
        self.push(ScriptStep::Read(snapshot));
    }

    /// Queue a failed read
    pub fn push_err(&self, error: DriverError) {
        self.push(ScriptStep::Fail(error));
    }

    /// Steps not consumed yet
    pub fn pending(&self) -> usize {
        self.script.steps.lock().len()
    }
}

/// Driver answering from a script
///
/// With an empty script a read waits briefly and reports a timeout, so the
/// loop never parks a blocking thread forever.
#[derive(Debug)]
pub struct ScriptedDriver {
    source: SourceId,
    script: Arc<Script>,
}

impl ScriptedDriver {
    /// Create a driver and its handle
    pub fn new(source: SourceId) -> (Self, ScriptHandle) {
        let script = Arc::new(Script::default());
        let handle = ScriptHandle {
            script: Arc::clone(&script),
        };
        (Self { source, script }, handle)
    }
}

impl SourceDriver for ScriptedDriver {
    fn identity(&self) -> SourceId {
        self.source
    }

    fn read_all(&mut self) -> Result<SourceSnapshot, DriverError> {
        let mut steps = self.script.steps.lock();
        if steps.is_empty() {
            self.script.ready.wait_for(&mut steps, IDLE_WAIT);
        }
        match steps.pop_front() {
            Some(ScriptStep::Read(snapshot)) => Ok(snapshot),
            Some(ScriptStep::Fail(error)) => Err(error),
            Some(ScriptStep::Panic) => {
                drop(steps);
                panic!("scripted driver panic on {}", self.source)
            }
            None => Err(DriverError::Timeout {
                source_id: self.source,
                waited_ms: IDLE_WAIT.as_millis() as u64,
            }),
        }
    }
}
