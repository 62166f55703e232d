//! Execution monitor: follows a remote execution until it reaches a
//! terminal status.
//!
//! The monitor polls the execution with an adaptive interval, merges its
//! logs without duplicates, and fires [`ExecutionEvents`] hooks. Failure
//! outcomes are not errors: they are reported through the error hook and
//! [`Execution::error`].

mod events;
mod logs;
mod poll;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{
    ApiError, ExecutionRecord, ExecutionStatus, Gateway, Log, TimelineEvent, collect_pages,
};

pub use events::{ExecutionEvents, ExecutionFailure};
pub use poll::{LOG_POLL_INTERVAL, polling_interval};

use logs::LogBook;
use poll::PollState;

/// Errors raised while monitoring an execution.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum MonitorError {
    /// Raised when a gateway call fails.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Raised when kill or rerun targets an execution the platform does not
    /// know.
    #[error("execution not found: {id}")]
    ExecutionNotFound {
        /// Identifier of the missing execution.
        id: String,
    },
    /// Raised after the hooks ran when the process could not be removed on
    /// completion.
    #[error("execution {execution_id} ended but process {process_id} was not removed: {source}")]
    CleanupFailed {
        /// Execution that reached a terminal status.
        execution_id: String,
        /// Process that should have been deleted.
        process_id: String,
        /// Failure reported by the delete call.
        source: ApiError,
    },
    /// Raised when the wait was aborted through the cancellation token.
    #[error("waiting for execution {id} was cancelled")]
    Cancelled {
        /// Identifier of the execution that was being awaited.
        id: String,
    },
}

/// Live view of one remote execution.
#[derive(Debug)]
pub struct Execution<G: Gateway> {
    gateway: Arc<G>,
    id: String,
    events: ExecutionEvents,
    cancellation: CancellationToken,
    cleanup_process: Option<String>,
    record: Option<ExecutionRecord>,
    logs: LogBook,
    return_value: Option<Value>,
    error: Option<String>,
    done: bool,
    state: PollState,
}

impl<G: Gateway> Execution<G> {
    /// Creates a detached monitor; nothing is fetched until
    /// [`Execution::poll`] or [`Execution::wait_for_done`] runs.
    #[must_use]
    pub fn new(gateway: Arc<G>, id: impl Into<String>, events: ExecutionEvents) -> Self {
        Self {
            gateway,
            id: id.into(),
            events,
            cancellation: CancellationToken::new(),
            cleanup_process: None,
            record: None,
            logs: LogBook::default(),
            return_value: None,
            error: None,
            done: false,
            state: PollState::default(),
        }
    }

    /// Aborts waits with [`MonitorError::Cancelled`] once `token` fires.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Deletes `process_id` when the execution reaches a terminal status,
    /// before any hook runs.
    #[must_use]
    pub(crate) fn remove_process_on_done(mut self, process_id: String) -> Self {
        self.cleanup_process = Some(process_id);
        self
    }

    /// Builds a monitor for `id` and polls it until it is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError`] when a gateway call fails.
    pub async fn attach(
        gateway: Arc<G>,
        id: impl Into<String>,
        events: ExecutionEvents,
    ) -> Result<Self, MonitorError> {
        let mut execution = Self::new(gateway, id, events);
        execution.poll().await?;
        Ok(execution)
    }

    /// Attaches with an existing configuration of hooks, token and cleanup.
    pub(crate) async fn start(mut self) -> Result<Self, MonitorError> {
        self.poll().await?;
        Ok(self)
    }

    /// Waits until the execution is terminal.
    ///
    /// Returns immediately when it already is.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Cancelled`] when the cancellation token fires
    /// and [`MonitorError::Api`] when a gateway call fails.
    pub async fn wait_for_done(&mut self) -> Result<(), MonitorError> {
        if self.done {
            return Ok(());
        }
        if self.record.is_some() {
            self.pause().await?;
        }
        self.poll().await
    }

    /// Polls until the execution is terminal, then fires the finish or error
    /// hook exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError`] when a gateway call fails or the wait is
    /// cancelled. The polling flag is cleared on every return.
    pub async fn poll(&mut self) -> Result<(), MonitorError> {
        if self.done {
            return Ok(());
        }
        self.state.polling = true;
        let outcome = self.poll_until_terminal().await;
        self.state.polling = false;
        outcome
    }

    async fn poll_until_terminal(&mut self) -> Result<(), MonitorError> {
        loop {
            if self.cancellation.is_cancelled() {
                return Err(self.cancelled());
            }
            let record = self.gateway.get_execution(&self.id).await?;
            let status = record.status;
            let terminal = status.is_terminal();
            self.record = Some(record);

            if self.state.logs_due(Instant::now(), terminal) {
                self.refresh_logs().await?;
            }

            if terminal {
                return self.finish(status).await;
            }

            debug!(
                execution_id = %self.id,
                status = %status,
                attempt = self.state.attempts,
                "execution still in flight"
            );
            self.state.record_attempt();
            self.pause().await?;
        }
    }

    async fn pause(&self) -> Result<(), MonitorError> {
        let interval = self.state.next_interval();
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(self.cancelled()),
            () = sleep(interval) => Ok(()),
        }
    }

    fn cancelled(&self) -> MonitorError {
        MonitorError::Cancelled {
            id: self.id.clone(),
        }
    }

    async fn refresh_logs(&mut self) -> Result<(), MonitorError> {
        let gateway = Arc::clone(&self.gateway);
        let id = self.id.clone();
        let fetched = collect_pages(|page| gateway.get_execution_logs(&id, page)).await?;
        self.state.last_log_poll = Some(Instant::now());
        for log in self.logs.merge(fetched) {
            self.events.emit_log(&log);
        }
        Ok(())
    }

    async fn finish(&mut self, status: ExecutionStatus) -> Result<(), MonitorError> {
        self.done = true;
        self.return_value = self
            .record
            .as_ref()
            .and_then(|record| record.return_value.clone())
            .and_then(decode_return_value);
        if status.is_failure() {
            self.error = self.derive_error(status);
        }

        let mut cleanup = Ok(());
        if let Some(process_id) = self.cleanup_process.take() {
            if let Err(err) = self.gateway.delete_process(&process_id).await {
                warn!(
                    execution_id = %self.id,
                    process_id = %process_id,
                    error = %err,
                    "failed to remove process after execution"
                );
                cleanup = Err(MonitorError::CleanupFailed {
                    execution_id: self.id.clone(),
                    process_id,
                    source: err,
                });
            }
        }

        info!(execution_id = %self.id, status = %status, "execution reached terminal status");
        if status.is_failure() {
            let failure = ExecutionFailure {
                execution_id: self.id.clone(),
                status,
                message: self.error.clone(),
            };
            self.events.emit_error(&failure);
        } else {
            self.events.emit_finish(self.return_value.as_ref());
        }
        cleanup
    }

    /// The first timeline event with `status` decides the message, even
    /// when it carries no explanation. Logs are consulted only when no event
    /// matches.
    fn derive_error(&self, status: ExecutionStatus) -> Option<String> {
        match self.timeline().iter().find(|event| event.status == status) {
            Some(event) => event.explanation.clone(),
            None => self.logs.last_error().map(ToOwned::to_owned),
        }
    }

    /// Asks the platform to terminate the execution.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ExecutionNotFound`] for unknown executions and
    /// [`MonitorError::Api`] for any other failure.
    pub async fn kill(&self) -> Result<(), MonitorError> {
        self.gateway
            .kill_execution(&self.id)
            .await
            .map_err(|err| self.not_found_or(err))
    }

    /// Starts a copy of this execution and monitors it until terminal with
    /// the same hooks and cancellation token.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ExecutionNotFound`] for unknown executions and
    /// [`MonitorError`] when monitoring the new execution fails.
    pub async fn rerun(&self) -> Result<Self, MonitorError> {
        let new_id = self
            .gateway
            .rerun_execution(&self.id)
            .await
            .map_err(|err| self.not_found_or(err))?;
        info!(execution_id = %self.id, rerun_id = %new_id, "execution rerun requested");
        Self::new(Arc::clone(&self.gateway), new_id, self.events.clone())
            .with_cancellation(self.cancellation.clone())
            .start()
            .await
    }

    fn not_found_or(&self, err: ApiError) -> MonitorError {
        if err.is_not_found() {
            MonitorError::ExecutionNotFound {
                id: self.id.clone(),
            }
        } else {
            MonitorError::Api(err)
        }
    }

    /// Execution identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Process the execution belongs to, once fetched.
    #[must_use]
    pub fn process_id(&self) -> Option<&str> {
        self.record.as_ref()?.process_id.as_deref()
    }

    /// Last status reported by the platform.
    #[must_use]
    pub fn status(&self) -> Option<ExecutionStatus> {
        self.record.as_ref().map(|record| record.status)
    }

    /// Logs seen so far, ordered by timestamp without duplicates.
    #[must_use]
    pub fn logs(&self) -> &[Log] {
        self.logs.entries()
    }

    /// Decoded return value of a finished execution.
    #[must_use]
    pub const fn return_value(&self) -> Option<&Value> {
        self.return_value.as_ref()
    }

    /// Explanation of a failed execution, when one could be derived.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Timeline events reported by the platform.
    #[must_use]
    pub fn timeline(&self) -> &[TimelineEvent] {
        self.record
            .as_ref()
            .map(ExecutionRecord::timeline_events)
            .unwrap_or_default()
    }

    /// Parameters the execution was started with.
    #[must_use]
    pub fn parameters(&self) -> Option<&Value> {
        self.record.as_ref()?.parameters.as_ref()
    }

    /// Comment stored with the execution.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.record.as_ref()?.comment.as_deref()
    }

    /// Returns `true` once a terminal status was observed.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Returns `true` while a poll loop is running.
    #[must_use]
    pub const fn is_polling(&self) -> bool {
        self.state.polling
    }

    /// Number of in-flight polls performed so far.
    #[must_use]
    pub const fn poll_attempts(&self) -> u32 {
        self.state.attempts
    }
}

/// Decodes a return value carried as a JSON string.
///
/// Strings that are not JSON are kept verbatim; empty strings and `null`
/// mean no value.
#[must_use]
pub fn decode_return_value(raw: Value) -> Option<Value> {
    match raw {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => {
            let parsed = serde_json::from_str::<Value>(&text);
            Some(parsed.unwrap_or(Value::String(text)))
        }
        other => Some(other),
    }
}
