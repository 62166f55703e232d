//! Callback hooks fired by the execution monitor.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::api::{ExecutionStatus, Log};

type LogHandler = Arc<dyn Fn(&Log) + Send + Sync>;
type FinishHandler = Arc<dyn Fn(Option<&Value>) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&ExecutionFailure) + Send + Sync>;

/// Details passed to the error hook when an execution ends in a failure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutionFailure {
    /// Execution that failed.
    pub execution_id: String,
    /// Terminal failure status.
    pub status: ExecutionStatus,
    /// Best-effort explanation; absent when neither the timeline nor the
    /// logs carry one.
    pub message: Option<String>,
}

/// Optional hooks invoked while an execution is monitored.
///
/// Unset hooks are no-ops. Cloning shares the underlying closures, so a
/// rerun keeps notifying the same handlers.
///
/// # Examples
///
/// ```
/// use yepcode_run::execution::ExecutionEvents;
///
/// let events = ExecutionEvents::default()
///     .on_log(|log| println!("{}: {}", log.timestamp, log.message))
///     .on_finish(|value| println!("returned {value:?}"));
/// assert!(events.has_log_handler());
/// ```
#[derive(Clone, Default)]
pub struct ExecutionEvents {
    on_log: Option<LogHandler>,
    on_finish: Option<FinishHandler>,
    on_error: Option<ErrorHandler>,
}

impl ExecutionEvents {
    /// Sets the hook called once per newly seen log entry.
    #[must_use]
    pub fn on_log(mut self, handler: impl Fn(&Log) + Send + Sync + 'static) -> Self {
        self.on_log = Some(Arc::new(handler));
        self
    }

    /// Sets the hook called with the return value of a finished execution.
    #[must_use]
    pub fn on_finish(mut self, handler: impl Fn(Option<&Value>) + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Arc::new(handler));
        self
    }

    /// Sets the hook called when an execution ends in a failure status.
    #[must_use]
    pub fn on_error(
        mut self,
        handler: impl Fn(&ExecutionFailure) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Returns `true` when a log hook is set.
    #[must_use]
    pub const fn has_log_handler(&self) -> bool {
        self.on_log.is_some()
    }

    pub(crate) fn emit_log(&self, log: &Log) {
        if let Some(handler) = &self.on_log {
            handler(log);
        }
    }

    pub(crate) fn emit_finish(&self, value: Option<&Value>) {
        if let Some(handler) = &self.on_finish {
            handler(value);
        }
    }

    pub(crate) fn emit_error(&self, failure: &ExecutionFailure) {
        if let Some(handler) = &self.on_error {
            handler(failure);
        }
    }
}

impl fmt::Debug for ExecutionEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEvents")
            .field("on_log", &self.on_log.is_some())
            .field("on_finish", &self.on_finish.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
