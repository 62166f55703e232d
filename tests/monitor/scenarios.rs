//! BDD scenarios for monitoring executions.

use rstest_bdd_macros::scenario;

use super::test_helpers::{MonitorContext, monitor_context};

#[scenario(
    path = "tests/features/execution.feature",
    name = "Logs returned on every refresh are reported once"
)]
fn scenario_log_dedup(monitor_context: MonitorContext) {
    let _ = monitor_context;
}

#[scenario(
    path = "tests/features/execution.feature",
    name = "Failure explanations come from the timeline"
)]
fn scenario_timeline_error(monitor_context: MonitorContext) {
    let _ = monitor_context;
}

#[scenario(
    path = "tests/features/execution.feature",
    name = "Killing an unknown execution"
)]
fn scenario_kill_unknown(monitor_context: MonitorContext) {
    let _ = monitor_context;
}

#[scenario(
    path = "tests/features/execution.feature",
    name = "A rerun keeps notifying the same hooks"
)]
fn scenario_rerun_hooks(monitor_context: MonitorContext) {
    let _ = monitor_context;
}
