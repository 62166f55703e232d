//! Orchestrates running a code snippet on the platform.
//!
//! A snippet maps to one remote process whose slug is derived from a hash
//! of the source, so running the same code twice reuses the process. The
//! orchestrator submits an execution and hands back a monitor that has
//! already followed it to completion.

mod options;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::api::types::{
    CreateScriptInput, DependenciesConfig, ProcessManifest, ProcessSettings,
};
use crate::api::{ApiClient, ApiError, ClientRegistry, CreateProcessInput, Gateway, sha256_hex};
use crate::config::{ApiConfig, ConfigError};
use crate::execution::{Execution, ExecutionEvents, MonitorError};
use crate::language::detect_language;

pub use options::RunOptions;

/// Prefix of the slugs of processes created for snippets.
pub const PROCESS_NAME_PREFIX: &str = "yepcode-run-";

/// Tag applied to processes created for snippets.
pub const RUN_TAG: &str = "yc-run";

/// Errors surfaced while running a snippet.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RunError {
    /// Raised before any remote call when the input is incomplete.
    #[error("invalid run request: {0}")]
    Validation(String),
    /// Raised when configuration cannot be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Raised when a gateway call fails.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Raised when monitoring the execution fails.
    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

/// Slug of the process that runs `code`.
///
/// # Examples
///
/// ```
/// let slug = yepcode_run::run::process_slug("print('hi')");
/// assert!(slug.starts_with("yepcode-run-"));
/// assert_eq!(slug.len(), "yepcode-run-".len() + 64);
/// ```
#[must_use]
pub fn process_slug(code: &str) -> String {
    format!("{PROCESS_NAME_PREFIX}{}", sha256_hex(code.as_bytes()))
}

fn auto_detect_settings() -> ProcessSettings {
    ProcessSettings {
        dependencies: Some(DependenciesConfig {
            scoped_to_process: Some(true),
            auto_detect: Some(true),
        }),
    }
}

/// Runs snippets through a [`Gateway`].
#[derive(Debug)]
pub struct RunOrchestrator<G: Gateway> {
    gateway: Arc<G>,
}

impl<G: Gateway> Clone for RunOrchestrator<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
        }
    }
}

impl RunOrchestrator<ApiClient> {
    /// Connects with `config` merged over the configuration loaded from
    /// `yepcode.toml` files and `YEPCODE_*` environment variables.
    ///
    /// Identical configurations share one authenticated client.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Config`] when configuration cannot be loaded and
    /// [`RunError::Api`] when it lacks credentials.
    pub fn connect(config: &ApiConfig) -> Result<Self, RunError> {
        let loaded = ApiConfig::load_without_cli_args()?;
        let client = ClientRegistry::global().get_or_create(&loaded.merged_with(config))?;
        Ok(Self::new(client))
    }
}

impl<G: Gateway> RunOrchestrator<G> {
    /// Creates an orchestrator over `gateway`.
    #[must_use]
    pub const fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Gateway used for remote calls.
    #[must_use]
    pub const fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Returns the id of the process that runs `code`, creating it when it
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Validation`] when `code` or `language` is empty
    /// and [`RunError::Api`] when a lookup fails for any reason other than
    /// a missing process, or when creation fails.
    pub async fn create_process(
        &self,
        code: &str,
        language: &str,
        manifest: Option<&ProcessManifest>,
    ) -> Result<String, RunError> {
        if code.is_empty() || language.is_empty() {
            return Err(RunError::Validation(String::from(
                "language and code are required",
            )));
        }

        let slug = process_slug(code);
        match self.gateway.get_process(&slug).await {
            Ok(existing) => {
                debug!(process_id = %existing.id, slug = %slug, "reusing process");
                return Ok(existing.id);
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        let input = CreateProcessInput {
            name: slug.clone(),
            description: None,
            script: Some(CreateScriptInput {
                programming_language: Some(language.to_uppercase()),
                source_code: Some(code.to_owned()),
                parameters_schema: None,
            }),
            tags: Some(vec![RUN_TAG.to_owned()]),
            manifest: manifest.cloned(),
            settings: manifest.is_none().then(auto_detect_settings),
        };
        let process = self.gateway.create_process(&input).await?;
        info!(process_id = %process.id, slug = %slug, "created process");
        Ok(process.id)
    }

    /// Runs `code` and follows the execution to a terminal status.
    ///
    /// Failed executions are not errors: inspect [`Execution::error`] or set
    /// an error hook.
    ///
    /// When `options.language` is unset and detection yields
    /// [`DetectedLanguage::Unknown`](crate::DetectedLanguage::Unknown), the
    /// run is rejected before any remote call instead of submitting the
    /// snippet with an `unknown` language. Set the language explicitly to
    /// run such code.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Validation`] when the code is empty or its
    /// language cannot be detected, and [`RunError`] when a remote call or
    /// the monitor fails. [`MonitorError::CleanupFailed`] is returned after
    /// the hooks ran when `remove_on_done` could not delete the process.
    pub async fn run(&self, code: &str, options: RunOptions) -> Result<Execution<G>, RunError> {
        let language = match options.language.as_deref() {
            Some(explicit) => explicit.to_owned(),
            None => {
                let detected = detect_language(code);
                if !detected.is_known() {
                    return Err(RunError::Validation(String::from(
                        "could not detect the language of the code; set it explicitly",
                    )));
                }
                detected.as_str().to_owned()
            }
        };

        let process_id = self
            .create_process(code, &language, options.manifest.as_ref())
            .await?;
        let parameters = options.parameters_or_empty();
        let execute = options.execute_options();
        let started = self
            .gateway
            .execute_process_async(&process_id, &parameters, &execute)
            .await?;
        info!(
            process_id = %process_id,
            execution_id = %started.execution_id,
            "execution submitted"
        );

        let RunOptions {
            remove_on_done,
            events,
            cancellation,
            ..
        } = options;
        let mut execution = Execution::new(Arc::clone(&self.gateway), started.execution_id, events);
        if let Some(token) = cancellation {
            execution = execution.with_cancellation(token);
        }
        if remove_on_done {
            execution = execution.remove_process_on_done(process_id);
        }
        Ok(execution.start().await?)
    }

    /// Follows an existing execution to a terminal status without hooks.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Validation`] when `execution_id` is empty and
    /// [`RunError::Monitor`] when monitoring fails.
    pub async fn get_execution(&self, execution_id: &str) -> Result<Execution<G>, RunError> {
        if execution_id.is_empty() {
            return Err(RunError::Validation(String::from(
                "executionId is required",
            )));
        }
        Ok(Execution::attach(
            Arc::clone(&self.gateway),
            execution_id,
            ExecutionEvents::default(),
        )
        .await?)
    }
}
