//! BDD scenarios for running snippets.

use rstest_bdd_macros::scenario;

use super::test_helpers::{RunContext, run_context};

#[scenario(
    path = "tests/features/run.feature",
    name = "A snippet that prints and returns finishes successfully"
)]
fn scenario_successful_run(run_context: RunContext) {
    let _ = run_context;
}

#[scenario(
    path = "tests/features/run.feature",
    name = "A snippet that throws reports the exception text"
)]
fn scenario_failed_run(run_context: RunContext) {
    let _ = run_context;
}

#[scenario(
    path = "tests/features/run.feature",
    name = "The process is removed once the execution is done"
)]
fn scenario_remove_on_done(run_context: RunContext) {
    let _ = run_context;
}

#[scenario(
    path = "tests/features/run.feature",
    name = "Running the same snippet twice reuses its process"
)]
fn scenario_process_reuse(run_context: RunContext) {
    let _ = run_context;
}

#[scenario(
    path = "tests/features/run.feature",
    name = "Code in an unrecognised language is rejected before any remote call"
)]
fn scenario_unknown_language(run_context: RunContext) {
    let _ = run_context;
}
