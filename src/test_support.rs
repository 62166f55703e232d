//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::ready;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::api::types::ExecutionTimeline;
use crate::api::{
    ApiError, CreateProcessInput, CreateTeamVariableInput, ExecuteOptions, ExecutionId,
    ExecutionRecord, ExecutionStatus, Gateway, GatewayFuture, Log, Page, PageRequest, Process,
    StorageObject, TeamVariable, TimelineEvent, UpdateProcessInput, UpdateTeamVariableInput,
};

/// Builds a log entry.
#[must_use]
pub fn log(timestamp: &str, level: &str, message: &str) -> Log {
    Log {
        timestamp: timestamp.to_owned(),
        level: level.to_owned(),
        message: message.to_owned(),
    }
}

/// Builds a timeline event.
#[must_use]
pub fn timeline_event(status: ExecutionStatus, explanation: Option<&str>) -> TimelineEvent {
    TimelineEvent {
        status,
        timestamp: String::from("2025-01-01T00:00:00Z"),
        explanation: explanation.map(ToOwned::to_owned),
    }
}

/// One snapshot served by [`ScriptedGateway::get_execution`].
///
/// Logs attached to a step become visible through the logs endpoint once
/// the step has been served.
#[derive(Clone, Debug)]
pub struct ExecutionStep {
    status: ExecutionStatus,
    logs: Vec<Log>,
    return_value: Option<Value>,
    events: Vec<TimelineEvent>,
    parameters: Option<Value>,
    comment: Option<String>,
}

impl ExecutionStep {
    /// Creates a step reporting `status`.
    #[must_use]
    pub const fn new(status: ExecutionStatus) -> Self {
        Self {
            status,
            logs: Vec::new(),
            return_value: None,
            events: Vec::new(),
            parameters: None,
            comment: None,
        }
    }

    /// Reveals `entry` once this step is served.
    #[must_use]
    pub fn log(mut self, entry: Log) -> Self {
        self.logs.push(entry);
        self
    }

    /// Sets the raw `returnValue` payload.
    #[must_use]
    pub fn return_value(mut self, value: Value) -> Self {
        self.return_value = Some(value);
        self
    }

    /// Appends a timeline event.
    #[must_use]
    pub fn event(mut self, event: TimelineEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Sets the parameters echoed by the execution.
    #[must_use]
    pub fn parameters(mut self, value: Value) -> Self {
        self.parameters = Some(value);
        self
    }

    /// Sets the comment echoed by the execution.
    #[must_use]
    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_owned());
        self
    }
}

#[derive(Debug, Default)]
struct ExecutionScript {
    process_id: Option<String>,
    steps: VecDeque<ExecutionStep>,
    visible_logs: Vec<Log>,
}

/// Records one gateway call made through [`ScriptedGateway`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GatewayCall {
    /// Gateway operation name, e.g. `get_process`.
    pub operation: &'static str,
    /// Main argument of the call, or an empty string.
    pub target: String,
}

/// Execute request recorded by [`ScriptedGateway`].
#[derive(Clone, Debug, PartialEq)]
pub struct ExecuteRequest {
    /// Process identifier or slug the request targeted.
    pub process: String,
    /// Parameters passed to the execution.
    pub parameters: Value,
    /// Remaining execute options.
    pub options: ExecuteOptions,
}

#[derive(Debug, Default)]
struct State {
    processes: BTreeMap<String, Process>,
    created_processes: u32,
    executions: HashMap<String, ExecutionScript>,
    queued_execution_ids: VecDeque<String>,
    started_executions: u32,
    failures: HashMap<&'static str, VecDeque<ApiError>>,
    variables: Vec<TeamVariable>,
    created_variables: u32,
    objects: BTreeMap<String, (StorageObject, Vec<u8>)>,
    calls: Vec<GatewayCall>,
    executes: Vec<ExecuteRequest>,
    created_inputs: Vec<CreateProcessInput>,
}

impl State {
    fn record(&mut self, operation: &'static str, target: &str) -> Result<(), ApiError> {
        self.calls.push(GatewayCall {
            operation,
            target: target.to_owned(),
        });
        match self
            .failures
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn find_process(&self, id_or_slug: &str) -> Option<&Process> {
        self.processes.get(id_or_slug).or_else(|| {
            self.processes
                .values()
                .find(|process| process.slug.as_deref() == Some(id_or_slug))
        })
    }

    fn next_execution_id(&mut self) -> String {
        self.queued_execution_ids.pop_front().unwrap_or_else(|| {
            self.started_executions = self.started_executions.saturating_add(1);
            format!("exec-{}", self.started_executions)
        })
    }
}

/// In-memory [`Gateway`] double with scripted executions.
///
/// Processes, variables and objects behave like a small store. Executions
/// replay scripted [`ExecutionStep`]s: each status fetch serves the next
/// step and the last step repeats. Failures can be injected per operation.
#[derive(Clone, Debug, Default)]
pub struct ScriptedGateway {
    state: Arc<Mutex<State>>,
}

impl ScriptedGateway {
    /// Creates an empty gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs a process directly, bypassing the call log.
    pub fn insert_process(&self, id: &str, slug: Option<&str>) {
        let process = Process {
            id: id.to_owned(),
            name: slug.unwrap_or(id).to_owned(),
            slug: slug.map(ToOwned::to_owned),
            description: None,
            programming_language: None,
            source_code: None,
            manifest: None,
            settings: None,
            tags: None,
            created_at: None,
            updated_at: None,
        };
        self.lock().processes.insert(id.to_owned(), process);
    }

    /// Scripts the execution `id`.
    pub fn script_execution(&self, id: &str, steps: impl IntoIterator<Item = ExecutionStep>) {
        let script = ExecutionScript {
            process_id: None,
            steps: steps.into_iter().collect(),
            visible_logs: Vec::new(),
        };
        self.lock().executions.insert(id.to_owned(), script);
    }

    /// Scripts `id` as the identifier handed out by the next execute or
    /// rerun request.
    pub fn queue_execution(&self, id: &str, steps: impl IntoIterator<Item = ExecutionStep>) {
        self.script_execution(id, steps);
        self.lock().queued_execution_ids.push_back(id.to_owned());
    }

    /// Makes the next call to `operation` fail with `error`.
    pub fn fail_next(&self, operation: &'static str, error: ApiError) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Returns a snapshot of every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    /// Counts the calls made to `operation`.
    #[must_use]
    pub fn count(&self, operation: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Returns the execute requests received so far.
    #[must_use]
    pub fn executes(&self) -> Vec<ExecuteRequest> {
        self.lock().executes.clone()
    }

    /// Returns the process creation payloads received so far.
    #[must_use]
    pub fn created_processes(&self) -> Vec<CreateProcessInput> {
        self.lock().created_inputs.clone()
    }

    /// Returns `true` when a process with this id or slug exists.
    #[must_use]
    pub fn has_process(&self, id_or_slug: &str) -> bool {
        self.lock().find_process(id_or_slug).is_some()
    }

    fn process_result(&self, id_or_slug: &str) -> Result<Process, ApiError> {
        let mut state = self.lock();
        state.record("get_process", id_or_slug)?;
        state
            .find_process(id_or_slug)
            .cloned()
            .ok_or_else(|| ApiError::not_found("GET", &format!("processes/{id_or_slug}")))
    }

    fn create_process_result(&self, input: &CreateProcessInput) -> Result<Process, ApiError> {
        let mut state = self.lock();
        state.record("create_process", &input.name)?;
        state.created_processes = state.created_processes.saturating_add(1);
        let id = format!("proc-{}", state.created_processes);
        let process = Process {
            id: id.clone(),
            name: input.name.clone(),
            slug: Some(input.name.clone()),
            description: input.description.clone(),
            programming_language: None,
            source_code: input
                .script
                .as_ref()
                .and_then(|script| script.source_code.clone()),
            manifest: input.manifest.clone(),
            settings: input.settings.clone(),
            tags: input.tags.clone(),
            created_at: None,
            updated_at: None,
        };
        state.created_inputs.push(input.clone());
        state.processes.insert(id, process.clone());
        Ok(process)
    }

    fn update_process_result(
        &self,
        id_or_slug: &str,
        input: &UpdateProcessInput,
    ) -> Result<Process, ApiError> {
        let mut state = self.lock();
        state.record("update_process", id_or_slug)?;
        let id = state
            .find_process(id_or_slug)
            .map(|process| process.id.clone())
            .ok_or_else(|| ApiError::not_found("PATCH", &format!("processes/{id_or_slug}")))?;
        let process = state
            .processes
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found("PATCH", &format!("processes/{id_or_slug}")))?;
        if let Some(name) = &input.name {
            process.name.clone_from(name);
        }
        if input.slug.is_some() {
            process.slug.clone_from(&input.slug);
        }
        if input.description.is_some() {
            process.description.clone_from(&input.description);
        }
        if input.tags.is_some() {
            process.tags.clone_from(&input.tags);
        }
        Ok(process.clone())
    }

    fn delete_process_result(&self, id_or_slug: &str) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.record("delete_process", id_or_slug)?;
        let id = state
            .find_process(id_or_slug)
            .map(|process| process.id.clone())
            .ok_or_else(|| ApiError::not_found("DELETE", &format!("processes/{id_or_slug}")))?;
        state.processes.remove(&id);
        Ok(())
    }

    fn execute_result(
        &self,
        id_or_slug: &str,
        parameters: &Value,
        options: &ExecuteOptions,
    ) -> Result<ExecutionId, ApiError> {
        let mut state = self.lock();
        state.record("execute_process_async", id_or_slug)?;
        let process_id = state
            .find_process(id_or_slug)
            .map(|process| process.id.clone())
            .ok_or_else(|| {
                ApiError::not_found("POST", &format!("processes/{id_or_slug}/execute"))
            })?;
        state.executes.push(ExecuteRequest {
            process: id_or_slug.to_owned(),
            parameters: parameters.clone(),
            options: options.clone(),
        });
        let execution_id = state.next_execution_id();
        state
            .executions
            .entry(execution_id.clone())
            .or_default()
            .process_id = Some(process_id);
        Ok(ExecutionId { execution_id })
    }

    fn execution_result(&self, id: &str) -> Result<ExecutionRecord, ApiError> {
        let mut state = self.lock();
        state.record("get_execution", id)?;
        let missing = || ApiError::not_found("GET", &format!("executions/{id}"));
        let script = state.executions.get_mut(id).ok_or_else(missing)?;
        let step = if script.steps.len() > 1 {
            script.steps.pop_front()
        } else {
            script.steps.front().cloned()
        }
        .ok_or_else(missing)?;
        script.visible_logs.extend(step.logs);
        let events = (!step.events.is_empty()).then_some(step.events);
        Ok(ExecutionRecord {
            id: id.to_owned(),
            process_id: script.process_id.clone(),
            status: step.status,
            scheduled_id: None,
            timeline: Some(ExecutionTimeline {
                explanation: None,
                events,
            }),
            parameters: step.parameters,
            comment: step.comment,
            return_value: step.return_value,
            settings: None,
            error: None,
            created_at: None,
            updated_at: None,
        })
    }

    fn logs_result(&self, id: &str, page: PageRequest) -> Result<Page<Log>, ApiError> {
        let mut state = self.lock();
        state.record("get_execution_logs", id)?;
        let script = state
            .executions
            .get(id)
            .ok_or_else(|| ApiError::not_found("GET", &format!("executions/{id}/logs")))?;
        Ok(paginate(&script.visible_logs, page))
    }

    fn kill_result(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.record("kill_execution", id)?;
        if state.executions.contains_key(id) {
            Ok(())
        } else {
            Err(ApiError::not_found("PUT", &format!("executions/{id}/kill")))
        }
    }

    fn rerun_result(&self, id: &str) -> Result<String, ApiError> {
        let mut state = self.lock();
        state.record("rerun_execution", id)?;
        let process_id = state
            .executions
            .get(id)
            .map(|script| script.process_id.clone())
            .ok_or_else(|| ApiError::not_found("POST", &format!("executions/{id}/rerun")))?;
        let new_id = state.next_execution_id();
        state.executions.entry(new_id.clone()).or_default().process_id = process_id;
        Ok(new_id)
    }

    fn variables_result(&self, page: PageRequest) -> Result<Page<TeamVariable>, ApiError> {
        let mut state = self.lock();
        state.record("get_variables", "")?;
        Ok(paginate(&state.variables, page))
    }

    fn create_variable_result(
        &self,
        input: &CreateTeamVariableInput,
    ) -> Result<TeamVariable, ApiError> {
        let mut state = self.lock();
        state.record("create_variable", &input.key)?;
        state.created_variables = state.created_variables.saturating_add(1);
        let variable = TeamVariable {
            id: format!("var-{}", state.created_variables),
            key: input.key.clone(),
            value: Some(input.value.clone()),
            is_sensitive: Some(input.is_sensitive),
            created_at: None,
            updated_at: None,
        };
        state.variables.push(variable.clone());
        Ok(variable)
    }

    fn update_variable_result(
        &self,
        id: &str,
        input: &UpdateTeamVariableInput,
    ) -> Result<TeamVariable, ApiError> {
        let mut state = self.lock();
        state.record("update_variable", id)?;
        let variable = state
            .variables
            .iter_mut()
            .find(|variable| variable.id == id)
            .ok_or_else(|| ApiError::not_found("PATCH", &format!("variables/{id}")))?;
        variable.key.clone_from(&input.key);
        variable.value = Some(input.value.clone());
        Ok(variable.clone())
    }

    fn delete_variable_result(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.record("delete_variable", id)?;
        let before = state.variables.len();
        state.variables.retain(|variable| variable.id != id);
        if state.variables.len() == before {
            return Err(ApiError::not_found("DELETE", &format!("variables/{id}")));
        }
        Ok(())
    }

    fn objects_result(&self) -> Result<Vec<StorageObject>, ApiError> {
        let mut state = self.lock();
        state.record("get_objects", "")?;
        Ok(state
            .objects
            .values()
            .map(|(object, _)| object.clone())
            .collect())
    }

    fn create_object_result(&self, name: &str, content: &[u8]) -> Result<StorageObject, ApiError> {
        let mut state = self.lock();
        state.record("create_object", name)?;
        let object = StorageObject {
            name: name.to_owned(),
            size: u64::try_from(content.len()).unwrap_or(u64::MAX),
            md5_hash: String::new(),
            content_type: crate::storage::content_type_for(name),
            created_at: String::from("2025-01-01T00:00:00Z"),
            updated_at: String::from("2025-01-01T00:00:00Z"),
            link: format!("https://storage.invalid/{name}"),
        };
        state
            .objects
            .insert(name.to_owned(), (object.clone(), content.to_vec()));
        Ok(object)
    }

    fn get_object_result(&self, name: &str) -> Result<Vec<u8>, ApiError> {
        let mut state = self.lock();
        state.record("get_object", name)?;
        state
            .objects
            .get(name)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| ApiError::not_found("GET", &format!("storage/objects/{name}")))
    }

    fn delete_object_result(&self, name: &str) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.record("delete_object", name)?;
        state
            .objects
            .remove(name)
            .map(drop)
            .ok_or_else(|| ApiError::not_found("DELETE", &format!("storage/objects/{name}")))
    }
}

fn paginate<T: Clone>(items: &[T], page: PageRequest) -> Page<T> {
    let limit = usize::try_from(page.limit).unwrap_or(usize::MAX).max(1);
    let start = usize::try_from(page.page)
        .unwrap_or(usize::MAX)
        .saturating_mul(limit);
    let data: Vec<T> = items.iter().skip(start).take(limit).cloned().collect();
    let has_next_page = start.saturating_add(limit) < items.len();
    Page {
        data,
        has_next_page,
        page: Some(page.page),
        limit: Some(page.limit),
        total: u64::try_from(items.len()).ok(),
    }
}

impl Gateway for ScriptedGateway {
    fn get_process<'a>(&'a self, id_or_slug: &'a str) -> GatewayFuture<'a, Process> {
        Box::pin(ready(self.process_result(id_or_slug)))
    }

    fn create_process<'a>(
        &'a self,
        input: &'a CreateProcessInput,
    ) -> GatewayFuture<'a, Process> {
        Box::pin(ready(self.create_process_result(input)))
    }

    fn update_process<'a>(
        &'a self,
        id_or_slug: &'a str,
        input: &'a UpdateProcessInput,
    ) -> GatewayFuture<'a, Process> {
        Box::pin(ready(self.update_process_result(id_or_slug, input)))
    }

    fn delete_process<'a>(&'a self, id_or_slug: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(ready(self.delete_process_result(id_or_slug)))
    }

    fn execute_process_async<'a>(
        &'a self,
        id_or_slug: &'a str,
        parameters: &'a Value,
        options: &'a ExecuteOptions,
    ) -> GatewayFuture<'a, ExecutionId> {
        Box::pin(ready(self.execute_result(id_or_slug, parameters, options)))
    }

    fn get_execution<'a>(&'a self, id: &'a str) -> GatewayFuture<'a, ExecutionRecord> {
        Box::pin(ready(self.execution_result(id)))
    }

    fn get_execution_logs<'a>(
        &'a self,
        id: &'a str,
        page: PageRequest,
    ) -> GatewayFuture<'a, Page<Log>> {
        Box::pin(ready(self.logs_result(id, page)))
    }

    fn kill_execution<'a>(&'a self, id: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(ready(self.kill_result(id)))
    }

    fn rerun_execution<'a>(&'a self, id: &'a str) -> GatewayFuture<'a, String> {
        Box::pin(ready(self.rerun_result(id)))
    }

    fn get_variables(&self, page: PageRequest) -> GatewayFuture<'_, Page<TeamVariable>> {
        Box::pin(ready(self.variables_result(page)))
    }

    fn create_variable<'a>(
        &'a self,
        input: &'a CreateTeamVariableInput,
    ) -> GatewayFuture<'a, TeamVariable> {
        Box::pin(ready(self.create_variable_result(input)))
    }

    fn update_variable<'a>(
        &'a self,
        id: &'a str,
        input: &'a UpdateTeamVariableInput,
    ) -> GatewayFuture<'a, TeamVariable> {
        Box::pin(ready(self.update_variable_result(id, input)))
    }

    fn delete_variable<'a>(&'a self, id: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(ready(self.delete_variable_result(id)))
    }

    fn get_objects(&self) -> GatewayFuture<'_, Vec<StorageObject>> {
        Box::pin(ready(self.objects_result()))
    }

    fn create_object<'a>(
        &'a self,
        name: &'a str,
        content: &'a [u8],
    ) -> GatewayFuture<'a, StorageObject> {
        Box::pin(ready(self.create_object_result(name, content)))
    }

    fn get_object<'a>(&'a self, name: &'a str) -> GatewayFuture<'a, Vec<u8>> {
        Box::pin(ready(self.get_object_result(name)))
    }

    fn delete_object<'a>(&'a self, name: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(ready(self.delete_object_result(name)))
    }
}
