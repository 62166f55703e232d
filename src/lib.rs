//! Client library for running code snippets on the YepCode platform.
//!
//! The crate detects the language of a snippet, creates (or reuses) a remote
//! process for it, submits an execution and monitors that execution until it
//! reaches a terminal status, streaming its logs through optional hooks.
//! Team variables and storage objects are exposed through [`env`] and
//! [`storage`].

pub mod api;
pub mod config;
pub mod env;
pub mod execution;
pub mod language;
pub mod run;
pub mod storage;
pub mod test_support;

pub use api::{ApiClient, ApiError, ClientRegistry, ExecutionStatus, Gateway, Log};
pub use config::{ApiConfig, ConfigError};
pub use env::{EnvVar, TeamEnv};
pub use execution::{Execution, ExecutionEvents, ExecutionFailure, MonitorError};
pub use language::{DetectedLanguage, detect_language};
pub use run::{RunError, RunOptions, RunOrchestrator};
pub use storage::Storage;
