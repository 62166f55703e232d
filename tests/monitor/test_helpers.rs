//! Shared fixtures for execution monitor BDD scenarios.

use std::cell::RefCell;
use std::sync::Arc;

use rstest::fixture;
use yepcode_run::ExecutionStatus;
use yepcode_run::test_support::ScriptedGateway;

use crate::hook_log::HookLog;

/// Scenario state. Steps borrow it; the outcome of the `When` step is kept
/// behind a `RefCell`.
#[derive(Debug)]
pub struct MonitorContext {
    pub gateway: Arc<ScriptedGateway>,
    pub hooks: HookLog,
    outcome: RefCell<Option<MonitorResult>>,
}

#[derive(Clone, Debug)]
pub enum MonitorResult {
    Attached {
        id: String,
        status: Option<ExecutionStatus>,
        error: Option<String>,
    },
    NotFound(String),
    Failure(String),
}

impl MonitorContext {
    pub fn record(&self, result: MonitorResult) {
        self.outcome.replace(Some(result));
    }

    pub fn outcome(&self) -> Option<MonitorResult> {
        self.outcome.borrow().clone()
    }
}

#[fixture]
pub fn monitor_context() -> MonitorContext {
    MonitorContext {
        gateway: Arc::new(ScriptedGateway::new()),
        hooks: HookLog::default(),
        outcome: RefCell::new(None),
    }
}
