//! Shared fixtures for run BDD scenarios.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use rstest::fixture;
use serde_json::Value;
use yepcode_run::test_support::ScriptedGateway;
use yepcode_run::{ExecutionStatus, RunOptions};

use crate::hook_log::HookLog;

pub const JAVASCRIPT_SNIPPET: &str = "async function main() {\n  console.log('Hello');\n  console.log('World');\n  return { greeting: 'Hello, Ada' };\n}\nmodule.exports = { main };";

/// Scenario state. Steps borrow it, so anything a step changes sits behind a
/// `Cell` or `RefCell`.
#[derive(Debug)]
pub struct RunContext {
    pub gateway: Arc<ScriptedGateway>,
    pub hooks: HookLog,
    remove_on_done: Cell<bool>,
    queued: Cell<usize>,
    outcome: RefCell<Option<RunResult>>,
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub status: Option<ExecutionStatus>,
    pub return_value: Option<Value>,
    pub error: Option<String>,
}

#[derive(Clone, Debug)]
pub enum RunResult {
    Completed(Vec<RunSummary>),
    Validation(String),
    Failure(String),
}

#[fixture]
pub fn run_context() -> RunContext {
    RunContext {
        gateway: Arc::new(ScriptedGateway::new()),
        hooks: HookLog::default(),
        remove_on_done: Cell::new(false),
        queued: Cell::new(0),
        outcome: RefCell::new(None),
    }
}

impl RunContext {
    pub fn next_execution_id(&self) -> String {
        let next = self.queued.get() + 1;
        self.queued.set(next);
        format!("exec-{next}")
    }

    pub fn remove_process_when_done(&self) {
        self.remove_on_done.set(true);
    }

    pub fn options(&self) -> RunOptions {
        let options = RunOptions::default().events(self.hooks.events());
        if self.remove_on_done.get() {
            options.remove_on_done()
        } else {
            options
        }
    }

    pub fn record(&self, result: RunResult) {
        self.outcome.replace(Some(result));
    }

    pub fn outcome(&self) -> Option<RunResult> {
        self.outcome.borrow().clone()
    }

    pub fn summaries(&self) -> Result<Vec<RunSummary>, String> {
        match self.outcome() {
            Some(RunResult::Completed(summaries)) => Ok(summaries),
            Some(other) => Err(format!("run did not complete: {other:?}")),
            None => Err(String::from("missing outcome")),
        }
    }
}
