//! REST gateway to the YepCode platform.
//!
//! [`Gateway`] is the seam the run orchestrator and the execution monitor
//! talk through. [`ApiClient`] implements it over HTTPS; tests substitute
//! [`crate::test_support::ScriptedGateway`].

mod auth;
mod client;
mod error;
mod registry;
pub mod types;

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

pub use client::ApiClient;
pub use error::ApiError;
pub use registry::{ClientRegistry, config_hash};
pub(crate) use registry::sha256_hex;
pub use types::{
    CreateProcessInput, CreateTeamVariableInput, ExecuteOptions, ExecutionId, ExecutionRecord,
    ExecutionStatus, Log, Page, PageRequest, Process, StorageObject, TeamVariable,
    TimelineEvent, UpdateProcessInput, UpdateTeamVariableInput,
};

/// Future returned by gateway operations.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Typed operations consumed from the platform API.
pub trait Gateway: Send + Sync {
    /// Fetches a process by identifier or slug.
    fn get_process<'a>(&'a self, id_or_slug: &'a str) -> GatewayFuture<'a, Process>;

    /// Creates a process.
    fn create_process<'a>(&'a self, input: &'a CreateProcessInput)
    -> GatewayFuture<'a, Process>;

    /// Partially updates a process.
    fn update_process<'a>(
        &'a self,
        id_or_slug: &'a str,
        input: &'a UpdateProcessInput,
    ) -> GatewayFuture<'a, Process>;

    /// Deletes a process.
    fn delete_process<'a>(&'a self, id_or_slug: &'a str) -> GatewayFuture<'a, ()>;

    /// Starts an asynchronous execution and returns its identifier.
    fn execute_process_async<'a>(
        &'a self,
        id_or_slug: &'a str,
        parameters: &'a Value,
        options: &'a ExecuteOptions,
    ) -> GatewayFuture<'a, ExecutionId>;

    /// Fetches the current state of an execution.
    fn get_execution<'a>(&'a self, id: &'a str) -> GatewayFuture<'a, ExecutionRecord>;

    /// Fetches one page of an execution's logs.
    fn get_execution_logs<'a>(
        &'a self,
        id: &'a str,
        page: PageRequest,
    ) -> GatewayFuture<'a, Page<Log>>;

    /// Requests termination of an execution.
    fn kill_execution<'a>(&'a self, id: &'a str) -> GatewayFuture<'a, ()>;

    /// Clones an execution into a new one and returns the new identifier.
    fn rerun_execution<'a>(&'a self, id: &'a str) -> GatewayFuture<'a, String>;

    /// Fetches one page of team variables.
    fn get_variables(&self, page: PageRequest) -> GatewayFuture<'_, Page<TeamVariable>>;

    /// Creates a team variable.
    fn create_variable<'a>(
        &'a self,
        input: &'a CreateTeamVariableInput,
    ) -> GatewayFuture<'a, TeamVariable>;

    /// Updates a team variable.
    fn update_variable<'a>(
        &'a self,
        id: &'a str,
        input: &'a UpdateTeamVariableInput,
    ) -> GatewayFuture<'a, TeamVariable>;

    /// Deletes a team variable.
    fn delete_variable<'a>(&'a self, id: &'a str) -> GatewayFuture<'a, ()>;

    /// Lists the objects held in team storage.
    fn get_objects(&self) -> GatewayFuture<'_, Vec<StorageObject>>;

    /// Uploads `content` under `name`, replacing any existing object.
    fn create_object<'a>(&'a self, name: &'a str, content: &'a [u8])
    -> GatewayFuture<'a, StorageObject>;

    /// Downloads the content stored under `name`.
    fn get_object<'a>(&'a self, name: &'a str) -> GatewayFuture<'a, Vec<u8>>;

    /// Deletes the object stored under `name`.
    fn delete_object<'a>(&'a self, name: &'a str) -> GatewayFuture<'a, ()>;
}

/// Walks a paginated collection from the first page until the server reports
/// no further page.
///
/// # Errors
///
/// Returns the first [`ApiError`] raised by `fetch`.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let mut items = Vec::new();
    let mut request = PageRequest::first();
    loop {
        let page = fetch(request).await?;
        items.extend(page.data);
        if !page.has_next_page {
            return Ok(items);
        }
        request = request.next();
    }
}
