//! Wire types exchanged with the YepCode REST API.
//!
//! Field names follow the API's camelCase JSON. Optional request fields are
//! skipped when unset so the server applies its own defaults.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiError;

/// Page size used when walking paginated collections.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Lifecycle status of a remote execution.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Accepted by the platform but not started yet.
    Created,
    /// Currently running.
    Running,
    /// Completed successfully.
    Finished,
    /// Terminated on request.
    Killed,
    /// Refused by the platform before running.
    Rejected,
    /// Completed with an error.
    Error,
}

impl ExecutionStatus {
    /// Returns `true` once no further status transition can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Created | Self::Running)
    }

    /// Returns `true` for the terminal statuses that represent a failure.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Error | Self::Killed | Self::Rejected)
    }

    /// Returns the wire representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Killed => "KILLED",
            Self::Rejected => "REJECTED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime used by a process script.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProgrammingLanguage {
    /// Node.js runtime.
    JavaScript,
    /// Python runtime.
    Python,
}

/// A single log line emitted by an execution.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Log {
    /// ISO 8601 timestamp assigned by the platform.
    pub timestamp: String,
    /// Log level (`INFO`, `ERROR`, ...).
    pub level: String,
    /// Log message.
    pub message: String,
}

/// A status change recorded in an execution timeline.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TimelineEvent {
    /// Status entered at this point.
    pub status: ExecutionStatus,
    /// ISO 8601 timestamp of the transition.
    pub timestamp: String,
    /// Optional human readable explanation.
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Timeline block embedded in an execution payload.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ExecutionTimeline {
    /// Optional explanation for the execution as a whole.
    #[serde(default)]
    pub explanation: Option<String>,
    /// Ordered status transitions.
    #[serde(default)]
    pub events: Option<Vec<TimelineEvent>>,
}

/// Settings applied to an execution.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSettings {
    /// Maximum run time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Worker pool that should run the execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_pool_slug: Option<String>,
    /// URL notified by the platform when the execution finishes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// Execution payload returned by `GET /executions/{id}`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    /// Execution identifier.
    pub id: String,
    /// Identifier of the process that was executed.
    #[serde(default)]
    pub process_id: Option<String>,
    /// Current status.
    pub status: ExecutionStatus,
    /// Identifier of the schedule that triggered the execution, if any.
    #[serde(default)]
    pub scheduled_id: Option<String>,
    /// Status transitions recorded so far.
    #[serde(default)]
    pub timeline: Option<ExecutionTimeline>,
    /// Parameters submitted with the execution.
    #[serde(default)]
    pub parameters: Option<Value>,
    /// Comment submitted with the execution.
    #[serde(default)]
    pub comment: Option<String>,
    /// Return value, usually carried as a JSON encoded string.
    #[serde(default)]
    pub return_value: Option<Value>,
    /// Settings applied to the execution.
    #[serde(default)]
    pub settings: Option<ExecutionSettings>,
    /// Error reported by the platform, if any.
    #[serde(default)]
    pub error: Option<String>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl ExecutionRecord {
    /// Returns the timeline events, or an empty slice when none were sent.
    #[must_use]
    pub fn timeline_events(&self) -> &[TimelineEvent] {
        self.timeline
            .as_ref()
            .and_then(|timeline| timeline.events.as_deref())
            .unwrap_or_default()
    }
}

/// Response of the execute and rerun endpoints.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionId {
    /// Identifier of the newly created execution.
    pub execution_id: String,
}

/// Page request for paginated collections.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageRequest {
    /// Zero based page number.
    pub page: u32,
    /// Maximum number of items per page.
    pub limit: u32,
}

impl PageRequest {
    /// Returns the first page with the default limit.
    #[must_use]
    pub const fn first() -> Self {
        Self {
            page: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }

    /// Returns the request for the following page.
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            page: self.page + 1,
            limit: self.limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

/// One page of a paginated collection.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    /// Whether another page follows.
    #[serde(default)]
    pub has_next_page: bool,
    /// Page number echoed by the server.
    #[serde(default)]
    pub page: Option<u32>,
    /// Page size echoed by the server.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Total number of items, when reported.
    #[serde(default)]
    pub total: Option<u64>,
}

/// Dependency manifest attached to a process.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ProcessManifest {
    /// Package name to version requirement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeMap<String, String>>,
}

/// Dependency resolution settings for a process.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependenciesConfig {
    /// Install dependencies for this process only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoped_to_process: Option<bool>,
    /// Detect dependencies from import statements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_detect: Option<bool>,
}

/// Process level settings.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ProcessSettings {
    /// Dependency resolution settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<DependenciesConfig>,
}

/// A process stored on the platform.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    /// Process identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// URL friendly identifier.
    #[serde(default)]
    pub slug: Option<String>,
    /// Free text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Script runtime.
    #[serde(default)]
    pub programming_language: Option<ProgrammingLanguage>,
    /// Script source.
    #[serde(default)]
    pub source_code: Option<String>,
    /// Dependency manifest.
    #[serde(default)]
    pub manifest: Option<ProcessManifest>,
    /// Process settings.
    #[serde(default)]
    pub settings: Option<ProcessSettings>,
    /// Tags attached to the process.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Script section of a process creation request.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScriptInput {
    /// Upper-case runtime name (`JAVASCRIPT` or `PYTHON`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub programming_language: Option<String>,
    /// Script source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,
    /// JSON schema describing the script parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters_schema: Option<String>,
}

/// Body of `POST /processes`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CreateProcessInput {
    /// Process name; also used as the lookup slug for run processes.
    pub name: String,
    /// Free text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Script definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<CreateScriptInput>,
    /// Tags attached to the process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Dependency manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<ProcessManifest>,
    /// Process settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<ProcessSettings>,
}

/// Body of `PATCH /processes/{id}`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProcessInput {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New slug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replacement script source and schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<CreateScriptInput>,
    /// Replacement manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<ProcessManifest>,
    /// Replacement tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Options accepted by the execute endpoints besides the parameters.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecuteOptions {
    /// Process version tag or alias to execute.
    pub tag: Option<String>,
    /// Comment stored with the execution.
    pub comment: Option<String>,
    /// Execution settings.
    pub settings: Option<ExecutionSettings>,
    /// Value of the `Yep-Initiated-By` attribution header.
    pub initiated_by: Option<String>,
}

/// Body of the execute endpoints.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ExecuteProcessInput {
    /// Parameters encoded as a JSON string.
    pub parameters: String,
    /// Process version tag or alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Comment stored with the execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Execution settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<ExecutionSettings>,
}

impl ExecuteProcessInput {
    /// Encodes `parameters` and copies the body fields from `options`.
    #[must_use]
    pub fn new(parameters: &Value, options: &ExecuteOptions) -> Self {
        Self {
            parameters: parameters.to_string(),
            tag: options.tag.clone(),
            comment: options.comment.clone(),
            settings: options.settings.clone(),
        }
    }
}

/// A team variable exposed to executions as an environment variable.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamVariable {
    /// Variable identifier.
    pub id: String,
    /// Variable name.
    pub key: String,
    /// Variable value; absent for sensitive variables on some endpoints.
    #[serde(default)]
    pub value: Option<String>,
    /// Whether the value is masked in the UI and logs.
    #[serde(default)]
    pub is_sensitive: Option<bool>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body of `POST /variables`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamVariableInput {
    /// Variable name.
    pub key: String,
    /// Variable value.
    pub value: String,
    /// Whether the value should be masked.
    pub is_sensitive: bool,
}

/// Body of `PATCH /variables/{id}`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct UpdateTeamVariableInput {
    /// Variable name.
    pub key: String,
    /// New value.
    pub value: String,
}

/// Metadata of an object held in team storage.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageObject {
    /// Object name, used as its key.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// MD5 digest of the content.
    #[serde(alias = "md5_hash")]
    pub md5_hash: String,
    /// MIME type recorded at upload time.
    #[serde(alias = "content_type")]
    pub content_type: String,
    /// Creation timestamp.
    #[serde(alias = "created_at")]
    pub created_at: String,
    /// Last update timestamp.
    #[serde(alias = "updated_at")]
    pub updated_at: String,
    /// Download link.
    pub link: String,
}

/// Settings of a schedule.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSettings {
    /// Whether several executions of the schedule may overlap.
    #[serde(default)]
    pub allow_concurrent_executions: Option<bool>,
    /// Worker pools eligible to run the executions.
    #[serde(default)]
    pub agent_pool_slugs: Option<Vec<String>>,
}

/// A periodic or one-time schedule of a process.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// Schedule identifier.
    pub id: String,
    /// Scheduled process.
    pub process_id: String,
    /// `PERIODIC` or `ONE_TIME`.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Cron expression of periodic schedules.
    #[serde(default)]
    pub cron: Option<String>,
    /// Trigger time of one-time schedules.
    #[serde(default)]
    pub date_time: Option<String>,
    /// Whether the schedule is paused.
    #[serde(default)]
    pub paused: Option<bool>,
    /// Comment stored with the schedule.
    #[serde(default)]
    pub comment: Option<String>,
    /// Parameters passed to each execution.
    #[serde(default)]
    pub parameters: Option<Value>,
    /// Schedule settings.
    #[serde(default)]
    pub settings: Option<ScheduleSettings>,
}

/// Bound of an execution date-range filter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DateBound {
    /// A date-time that is formatted without fractional seconds.
    At(NaiveDateTime),
    /// A pre-formatted `YYYY-MM-DDTHH:MM:SS` string, validated before use.
    Raw(String),
}

const DATE_PARAM_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

impl DateBound {
    /// Renders the bound as a query parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidDate`] when a raw bound is not exactly
    /// `YYYY-MM-DDTHH:MM:SS`.
    pub fn to_param(&self) -> Result<String, ApiError> {
        match self {
            Self::At(value) => Ok(value.format(DATE_PARAM_FORMAT).to_string()),
            Self::Raw(value) => {
                let well_formed = value.len() == 19
                    && NaiveDateTime::parse_from_str(value, DATE_PARAM_FORMAT).is_ok();
                if well_formed {
                    Ok(value.clone())
                } else {
                    Err(ApiError::InvalidDate(value.clone()))
                }
            }
        }
    }
}

/// Filters accepted by `GET /executions`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecutionFilter {
    /// Restrict to one process.
    pub process_id: Option<String>,
    /// Restrict to one status.
    pub status: Option<ExecutionStatus>,
    /// Lower bound of the creation date.
    pub from: Option<DateBound>,
    /// Upper bound of the creation date.
    pub to: Option<DateBound>,
    /// Page to fetch.
    pub page: PageRequest,
}

impl ExecutionFilter {
    /// Renders the filter as query parameters, skipping unset values.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidDate`] when a date bound is malformed.
    pub fn to_query(&self) -> Result<Vec<(&'static str, String)>, ApiError> {
        let mut query = vec![
            ("page", self.page.page.to_string()),
            ("limit", self.page.limit.to_string()),
        ];
        if let Some(process_id) = &self.process_id {
            query.push(("processId", process_id.clone()));
        }
        if let Some(status) = self.status {
            query.push(("status", status.as_str().to_owned()));
        }
        if let Some(from) = &self.from {
            query.push(("from", from.to_param()?));
        }
        if let Some(to) = &self.to {
            query.push(("to", to.to_param()?));
        }
        Ok(query)
    }
}
