//! BDD step definitions for running snippets.

use std::sync::Arc;

use rstest_bdd_macros::{given, then, when};
use serde_json::json;
use yepcode_run::test_support::{ExecutionStep, log};
use yepcode_run::{ExecutionStatus, Gateway, RunError, RunOrchestrator};

use super::test_helpers::{JAVASCRIPT_SNIPPET, RunContext, RunResult, RunSummary};
use crate::hook_log::block_on_paused;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a scripted platform")]
fn scripted_platform(run_context: &RunContext) {
    assert!(run_context.gateway.calls().is_empty());
}

#[given("the next execution prints \"{first}\" then \"{second}\" and returns a greeting")]
fn execution_prints_and_returns(run_context: &RunContext, first: String, second: String) {
    let id = run_context.next_execution_id();
    run_context.gateway.queue_execution(
        &id,
        [
            ExecutionStep::new(ExecutionStatus::Created),
            ExecutionStep::new(ExecutionStatus::Running)
                .log(log("2025-01-01T00:00:01Z", "INFO", &first)),
            ExecutionStep::new(ExecutionStatus::Finished)
                .log(log("2025-01-01T00:00:02Z", "INFO", &second))
                .return_value(json!("{\"greeting\":\"Hello, Ada\"}")),
        ],
    );
}

#[given("the next execution fails with the error log \"{message}\"")]
fn execution_fails(run_context: &RunContext, message: String) {
    let id = run_context.next_execution_id();
    run_context.gateway.queue_execution(
        &id,
        [
            ExecutionStep::new(ExecutionStatus::Running),
            ExecutionStep::new(ExecutionStatus::Error)
                .log(log("2025-01-01T00:00:01Z", "INFO", "starting"))
                .log(log("2025-01-01T00:00:02Z", "ERROR", &message)),
        ],
    );
}

#[given("the next execution finishes without output")]
fn execution_finishes_quietly(run_context: &RunContext) {
    let id = run_context.next_execution_id();
    run_context
        .gateway
        .queue_execution(&id, [ExecutionStep::new(ExecutionStatus::Finished)]);
}

#[given("the process is removed when the execution is done")]
fn remove_on_done(run_context: &RunContext) {
    run_context.remove_process_when_done();
}

fn run_times(run_context: &RunContext, code: &str, times: usize) -> Result<(), StepError> {
    let runner = RunOrchestrator::new(Arc::clone(&run_context.gateway));
    let options = run_context.options();
    let code = code.to_owned();
    let result = block_on_paused(async move {
        let mut summaries = Vec::new();
        for _ in 0..times {
            let execution = runner.run(&code, options.clone()).await?;
            summaries.push(RunSummary {
                status: execution.status(),
                return_value: execution.return_value().cloned(),
                error: execution.error().map(ToOwned::to_owned),
            });
        }
        Ok::<_, RunError>(summaries)
    })
    .map_err(StepError::Runtime)?;

    let outcome = match result {
        Ok(summaries) => RunResult::Completed(summaries),
        Err(RunError::Validation(message)) => RunResult::Validation(message),
        Err(err) => RunResult::Failure(err.to_string()),
    };
    run_context.record(outcome);
    Ok(())
}

#[when("I run the JavaScript snippet")]
fn run_snippet(run_context: &RunContext) -> Result<(), StepError> {
    run_times(run_context, JAVASCRIPT_SNIPPET, 1)
}

#[when("I run the same JavaScript snippet twice")]
fn run_snippet_twice(run_context: &RunContext) -> Result<(), StepError> {
    run_times(run_context, JAVASCRIPT_SNIPPET, 2)
}

#[when("I run the snippet \"{code}\"")]
fn run_code(run_context: &RunContext, code: String) -> Result<(), StepError> {
    run_times(run_context, &code, 1)
}

#[then("the execution status is \"{status}\"")]
fn execution_status(run_context: &RunContext, status: String) -> Result<(), StepError> {
    let summaries = run_context.summaries().map_err(StepError::Assertion)?;
    let actual: Vec<String> = summaries
        .iter()
        .map(|summary| summary.status.map(|value| value.to_string()).unwrap_or_default())
        .collect();
    if actual == vec![status.clone()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected status {status}, got {actual:?}"
        )))
    }
}

#[then("the log hook saw \"{first}\" then \"{second}\"")]
fn log_hook_saw(run_context: &RunContext, first: String, second: String) -> Result<(), StepError> {
    let logs = run_context.hooks.logs();
    if logs == vec![first, second] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("unexpected logs: {logs:?}")))
    }
}

#[then("the returned greeting is \"{greeting}\"")]
fn returned_greeting(run_context: &RunContext, greeting: String) -> Result<(), StepError> {
    let summaries = run_context.summaries().map_err(StepError::Assertion)?;
    let expected = Some(json!({ "greeting": greeting }));
    let returned = summaries.first().and_then(|summary| summary.return_value.clone());
    let hooked = run_context.hooks.finished();
    if returned == expected && hooked == vec![expected.clone()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {expected:?}, got {returned:?} (hook saw {hooked:?})"
        )))
    }
}

#[then("the error hook received a message containing \"{text}\"")]
fn error_hook_message(run_context: &RunContext, text: String) -> Result<(), StepError> {
    let errors = run_context.hooks.errors();
    let summaries = run_context.summaries().map_err(StepError::Assertion)?;
    let derived = summaries
        .first()
        .and_then(|summary| summary.error.clone())
        .unwrap_or_default();
    match errors.as_slice() {
        [Some(message)] if message.contains(&text) && derived.contains(&text) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected one error mentioning {text}, got {other:?}"
        ))),
    }
}

#[then("looking up the snippet's process reports not found")]
fn process_removed(run_context: &RunContext) -> Result<(), StepError> {
    let slug = yepcode_run::run::process_slug(JAVASCRIPT_SNIPPET);
    let gateway = Arc::clone(&run_context.gateway);
    let lookup = block_on_paused(async move { gateway.get_process(&slug).await.map(drop) })
        .map_err(StepError::Runtime)?;
    match lookup {
        Err(err) if err.is_not_found() => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected not found, got {other:?}"
        ))),
    }
}

#[then("exactly one process was created")]
fn one_process_created(run_context: &RunContext) -> Result<(), StepError> {
    let summaries = run_context.summaries().map_err(StepError::Assertion)?;
    let created = run_context.gateway.count("create_process");
    if summaries.len() == 2 && created == 1 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected 2 runs and 1 creation, got {} runs and {created} creations",
            summaries.len()
        )))
    }
}

#[then("the run fails validation")]
fn run_fails_validation(run_context: &RunContext) -> Result<(), StepError> {
    match run_context.outcome() {
        Some(RunResult::Validation(_)) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a validation error, got {other:?}"
        ))),
    }
}

#[then("no remote call was made")]
fn no_remote_call(run_context: &RunContext) -> Result<(), StepError> {
    let calls = run_context.gateway.calls();
    if calls.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("unexpected calls: {calls:?}")))
    }
}
