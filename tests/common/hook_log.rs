//! Hook recorder and paused runtime shared by the behavioural tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file in
//! `tests/`). Shared helpers live under `tests/common/` and are pulled in with:
//!
//! ```rust
//! #[path = "common/hook_log.rs"]
//! mod hook_log;
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use yepcode_run::ExecutionEvents;

/// Records every hook invocation of the monitors it is attached to.
#[derive(Clone, Debug, Default)]
pub struct HookLog {
    logs: Arc<Mutex<Vec<String>>>,
    finished: Arc<Mutex<Vec<Option<Value>>>>,
    errors: Arc<Mutex<Vec<Option<String>>>>,
}

fn snapshot<T: Clone>(slot: &Mutex<Vec<T>>) -> Vec<T> {
    slot.lock()
        .unwrap_or_else(|err| panic!("hook log poisoned: {err}"))
        .clone()
}

impl HookLog {
    pub fn events(&self) -> ExecutionEvents {
        let logs = Arc::clone(&self.logs);
        let finished = Arc::clone(&self.finished);
        let errors = Arc::clone(&self.errors);
        ExecutionEvents::default()
            .on_log(move |entry| {
                logs.lock()
                    .unwrap_or_else(|err| panic!("hook log poisoned: {err}"))
                    .push(entry.message.clone());
            })
            .on_finish(move |value| {
                finished
                    .lock()
                    .unwrap_or_else(|err| panic!("hook log poisoned: {err}"))
                    .push(value.cloned());
            })
            .on_error(move |failure| {
                errors
                    .lock()
                    .unwrap_or_else(|err| panic!("hook log poisoned: {err}"))
                    .push(failure.message.clone());
            })
    }

    pub fn logs(&self) -> Vec<String> {
        snapshot(&self.logs)
    }

    pub fn finished(&self) -> Vec<Option<Value>> {
        snapshot(&self.finished)
    }

    pub fn errors(&self) -> Vec<Option<String>> {
        snapshot(&self.errors)
    }
}

/// Runs `future` on a current-thread runtime whose clock starts paused, so
/// polling back-off completes instantly.
pub fn block_on_paused<F: Future>(future: F) -> Result<F::Output, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .map_err(|err| format!("failed to build runtime: {err}"))?;
    Ok(runtime.block_on(future))
}
