//! BDD step definitions for the execution monitor.

use std::sync::Arc;

use rstest_bdd_macros::{given, then, when};
use serde_json::json;
use yepcode_run::test_support::{ExecutionStep, ScriptedGateway, log, timeline_event};
use yepcode_run::{Execution, ExecutionStatus, MonitorError};

use super::test_helpers::{MonitorContext, MonitorResult};
use crate::hook_log::block_on_paused;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("invalid status '{0}'")]
    Status(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn parse_status(raw: &str) -> Result<ExecutionStatus, StepError> {
    serde_json::from_value(json!(raw)).map_err(|_| StepError::Status(raw.to_owned()))
}

fn summarise(outcome: Result<Execution<ScriptedGateway>, MonitorError>) -> MonitorResult {
    match outcome {
        Ok(execution) => MonitorResult::Attached {
            id: execution.id().to_owned(),
            status: execution.status(),
            error: execution.error().map(ToOwned::to_owned),
        },
        Err(MonitorError::ExecutionNotFound { id }) => MonitorResult::NotFound(id),
        Err(err) => MonitorResult::Failure(err.to_string()),
    }
}

#[given("an empty gateway")]
fn empty_gateway(monitor_context: &MonitorContext) {
    assert_eq!(monitor_context.gateway.count("get_execution"), 0);
}

#[given("an execution \"{id}\" that logs \"{first}\" and \"{second}\" while running for \"{polls}\" polls")]
fn execution_with_logs(
    monitor_context: &MonitorContext,
    id: String,
    first: String,
    second: String,
    polls: usize,
) {
    let chatty = ExecutionStep::new(ExecutionStatus::Running)
        .log(log("2025-01-01T00:00:01Z", "INFO", &first))
        .log(log("2025-01-01T00:00:02Z", "INFO", &second));
    let steps = std::iter::once(chatty)
        .chain(std::iter::repeat_n(
            ExecutionStep::new(ExecutionStatus::Running),
            polls,
        ))
        .chain(std::iter::once(ExecutionStep::new(ExecutionStatus::Finished)));
    monitor_context.gateway.script_execution(&id, steps);
}

#[given("an execution \"{id}\" that ends in \"{status}\" explained as \"{explanation}\"")]
fn execution_ends(
    monitor_context: &MonitorContext,
    id: String,
    status: String,
    explanation: String,
) -> Result<(), StepError> {
    let status = parse_status(&status)?;
    monitor_context.gateway.script_execution(
        &id,
        [
            ExecutionStep::new(ExecutionStatus::Running),
            ExecutionStep::new(status)
                .event(timeline_event(ExecutionStatus::Running, Some("started")))
                .event(timeline_event(status, Some(&explanation)))
                .log(log("2025-01-01T00:00:01Z", "ERROR", "unrelated log line")),
        ],
    );
    Ok(())
}

#[given("the next rerun is execution \"{id}\"")]
fn next_rerun(monitor_context: &MonitorContext, id: String) {
    monitor_context
        .gateway
        .queue_execution(&id, [ExecutionStep::new(ExecutionStatus::Finished)]);
}

#[when("I attach to execution \"{id}\"")]
fn attach(monitor_context: &MonitorContext, id: String) -> Result<(), StepError> {
    let gateway = Arc::clone(&monitor_context.gateway);
    let events = monitor_context.hooks.events();
    let outcome = block_on_paused(Execution::attach(gateway, id, events))
        .map_err(StepError::Runtime)?;
    monitor_context.record(summarise(outcome));
    Ok(())
}

#[when("I attach to execution \"{id}\" and rerun it")]
fn attach_and_rerun(monitor_context: &MonitorContext, id: String) -> Result<(), StepError> {
    let gateway = Arc::clone(&monitor_context.gateway);
    let events = monitor_context.hooks.events();
    let outcome = block_on_paused(async move {
        let first = Execution::attach(gateway, id, events).await?;
        first.rerun().await
    })
    .map_err(StepError::Runtime)?;
    monitor_context.record(summarise(outcome));
    Ok(())
}

#[when("I kill execution \"{id}\"")]
fn kill(monitor_context: &MonitorContext, id: String) -> Result<(), StepError> {
    let execution = Execution::new(
        Arc::clone(&monitor_context.gateway),
        id.clone(),
        monitor_context.hooks.events(),
    );
    let outcome = block_on_paused(async move { execution.kill().await })
        .map_err(StepError::Runtime)?;
    let result = match outcome {
        Ok(()) => MonitorResult::Attached {
            id,
            status: None,
            error: None,
        },
        Err(MonitorError::ExecutionNotFound { id: missing }) => MonitorResult::NotFound(missing),
        Err(err) => MonitorResult::Failure(err.to_string()),
    };
    monitor_context.record(result);
    Ok(())
}

#[then("the log hook fired \"{count}\" times")]
fn log_hook_count(monitor_context: &MonitorContext, count: usize) -> Result<(), StepError> {
    let logs = monitor_context.hooks.logs();
    if logs.len() == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} log callbacks, got {logs:?}"
        )))
    }
}

#[then("the finish hook fired \"{count}\" times")]
fn finish_hook_count(monitor_context: &MonitorContext, count: usize) -> Result<(), StepError> {
    let finished = monitor_context.hooks.finished();
    let errors = monitor_context.hooks.errors();
    if finished.len() == count && errors.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} finish callbacks, got {finished:?} and errors {errors:?}"
        )))
    }
}

#[then("the logs were fetched more than once")]
fn logs_fetched_repeatedly(monitor_context: &MonitorContext) -> Result<(), StepError> {
    let fetches = monitor_context.gateway.count("get_execution_logs");
    if fetches > 1 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected repeated log fetches, got {fetches}"
        )))
    }
}

#[then("the monitored status is \"{status}\"")]
fn monitored_status(monitor_context: &MonitorContext, status: String) -> Result<(), StepError> {
    let expected = parse_status(&status)?;
    match monitor_context.outcome() {
        Some(MonitorResult::Attached {
            status: Some(actual),
            ..
        }) if actual == expected => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected status {status}, got {other:?}"
        ))),
    }
}

#[then("the monitored error is \"{message}\"")]
fn monitored_error(monitor_context: &MonitorContext, message: String) -> Result<(), StepError> {
    let errors = monitor_context.hooks.errors();
    match monitor_context.outcome() {
        Some(MonitorResult::Attached {
            error: Some(actual),
            ..
        }) if actual == message && errors == vec![Some(message.clone())] => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected error {message}, got {other:?} (hook saw {errors:?})"
        ))),
    }
}

#[then("the monitored execution is \"{id}\"")]
fn monitored_execution(monitor_context: &MonitorContext, id: String) -> Result<(), StepError> {
    match monitor_context.outcome() {
        Some(MonitorResult::Attached { id: actual, .. }) if actual == id => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected execution {id}, got {other:?}"
        ))),
    }
}

#[then("the call fails because execution \"{id}\" was not found")]
fn not_found(monitor_context: &MonitorContext, id: String) -> Result<(), StepError> {
    match monitor_context.outcome() {
        Some(MonitorResult::NotFound(missing)) if missing == id => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected execution {id} to be missing, got {other:?}"
        ))),
    }
}
