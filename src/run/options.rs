//! Options accepted by [`super::RunOrchestrator::run`].

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::api::ExecuteOptions;
use crate::api::types::{ExecutionSettings, ProcessManifest};
use crate::execution::ExecutionEvents;

/// Per-run options.
///
/// Every field is optional; `RunOptions::default()` detects the language,
/// runs with empty parameters, and keeps the process afterwards.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Language of the snippet; detected from the code when unset.
    pub language: Option<String>,
    /// Deletes the backing process once the execution is terminal.
    pub remove_on_done: bool,
    /// Dependency manifest; dependencies are auto-detected when unset.
    pub manifest: Option<ProcessManifest>,
    /// Input passed to the execution. Defaults to an empty object.
    pub parameters: Option<Value>,
    /// Process version tag or alias.
    pub tag: Option<String>,
    /// Comment stored with the execution.
    pub comment: Option<String>,
    /// Execution settings such as timeout and agent pool.
    pub settings: Option<ExecutionSettings>,
    /// Hooks fired while the execution is monitored.
    pub events: ExecutionEvents,
    /// Value of the attribution header sent with the execute request.
    pub initiated_by: Option<String>,
    /// Token that aborts the wait for completion.
    pub cancellation: Option<CancellationToken>,
}

impl RunOptions {
    /// Sets the language.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Sets the execution parameters.
    #[must_use]
    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Enables process removal after the execution.
    #[must_use]
    pub const fn remove_on_done(mut self) -> Self {
        self.remove_on_done = true;
        self
    }

    /// Sets the monitor hooks.
    #[must_use]
    pub fn events(mut self, events: ExecutionEvents) -> Self {
        self.events = events;
        self
    }

    pub(super) fn parameters_or_empty(&self) -> Value {
        self.parameters.clone().unwrap_or_else(|| json!({}))
    }

    pub(super) fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            tag: self.tag.clone(),
            comment: self.comment.clone(),
            settings: self.settings.clone(),
            initiated_by: self.initiated_by.clone(),
        }
    }
}
