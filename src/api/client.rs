//! HTTPS implementation of the [`Gateway`] trait.
//!
//! Requests go to `{api_host}/api/{team_id}/rest/{endpoint}` with a bearer
//! token. Tokens are obtained with the client-credentials grant and, when the
//! API answers `401`, refreshed once before the request is retried.

use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::auth::{TokenResponse, resolve_team};
use super::types::{ExecuteProcessInput, ExecutionFilter, Schedule};
use super::{
    ApiError, CreateProcessInput, CreateTeamVariableInput, ExecuteOptions, ExecutionId,
    ExecutionRecord, Gateway, GatewayFuture, Log, Page, PageRequest, Process, StorageObject,
    TeamVariable, UpdateProcessInput, UpdateTeamVariableInput,
};
use crate::config::{ApiConfig, ResolvedConfig};
use crate::storage::content_type_for;

/// Attribution header forwarded with execute requests.
pub const INITIATED_BY_HEADER: &str = "Yep-Initiated-By";

#[derive(Debug, Default)]
struct Session {
    access_token: Option<String>,
    team_id: Option<String>,
}

enum Body<'a> {
    Empty,
    Json(Value),
    Upload { name: &'a str, content: &'a [u8] },
}

struct Call<'a> {
    method: Method,
    endpoint: String,
    query: Vec<(&'static str, String)>,
    headers: Vec<(&'static str, String)>,
    body: Body<'a>,
}

impl<'a> Call<'a> {
    fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    fn query(mut self, query: Vec<(&'static str, String)>) -> Self {
        self.query = query;
        self
    }

    fn page(self, page: PageRequest) -> Self {
        self.query(vec![
            ("page", page.page.to_string()),
            ("limit", page.limit.to_string()),
        ])
    }

    fn header(mut self, name: &'static str, value: Option<&String>) -> Self {
        if let Some(present) = value {
            self.headers.push((name, present.clone()));
        }
        self
    }

    fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|err| ApiError::Encode {
            endpoint: self.endpoint.clone(),
            message: err.to_string(),
        })?;
        self.body = Body::Json(value);
        Ok(self)
    }

    fn upload(mut self, name: &'a str, content: &'a [u8]) -> Self {
        self.body = Body::Upload { name, content };
        self
    }
}

fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Authenticated client for the YepCode REST API.
#[derive(Debug)]
pub struct ApiClient {
    http: Client,
    config: ResolvedConfig,
    session: Mutex<Session>,
}

impl ApiClient {
    /// Builds a client from configuration.
    ///
    /// No network call is made; the first request obtains a token when the
    /// configuration does not carry one.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] when the configuration has no usable
    /// credentials and [`ApiError::Auth`] when a supplied access token names
    /// no team and none is configured.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let resolved = config
            .resolve()
            .map_err(|err| ApiError::Config(err.to_string()))?;
        let http = Client::builder().timeout(resolved.timeout).build()?;
        let team_id = match resolved.access_token.as_deref() {
            Some(token) => Some(resolve_team(token, resolved.team_id.as_deref())?),
            None => resolved.team_id.clone(),
        };
        let session = Session {
            access_token: resolved.access_token.clone(),
            team_id,
        };
        Ok(Self {
            http,
            config: resolved,
            session: Mutex::new(session),
        })
    }

    /// Returns the configured OAuth client identifier, if any.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.config
            .client_credentials
            .as_ref()
            .map(|credentials| credentials.client_id.as_str())
    }

    /// Returns the team the client operates on, authenticating first when
    /// the team is only known from a token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] when authentication fails.
    pub async fn team_id(&self) -> Result<String, ApiError> {
        let (_, team) = self.session().await?;
        Ok(team)
    }

    async fn session(&self) -> Result<(String, String), ApiError> {
        {
            let session = self.session.lock().await;
            if let (Some(token), Some(team)) = (&session.access_token, &session.team_id) {
                return Ok((token.clone(), team.clone()));
            }
        }
        self.authenticate().await
    }

    async fn authenticate(&self) -> Result<(String, String), ApiError> {
        let Some(credentials) = self.config.client_credentials.as_ref() else {
            return Err(ApiError::Auth(String::from(
                "no client credentials available to obtain an access token",
            )));
        };
        debug!(auth_url = %self.config.auth_url, "requesting access token");

        let response = self
            .http
            .post(&self.config.auth_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|err| ApiError::Auth(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ApiError::Auth(format!(
                "HTTP error! status: {}",
                response.status().as_u16()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| ApiError::Auth(err.to_string()))?;
        let token = body
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Auth(String::from("no access token received from server")))?;
        let team = resolve_team(&token, self.config.team_id.as_deref())?;

        let mut session = self.session.lock().await;
        session.access_token = Some(token.clone());
        session.team_id = Some(team.clone());
        Ok((token, team))
    }

    async fn dispatch(
        &self,
        call: &Call<'_>,
        token: &str,
        team: &str,
    ) -> Result<Response, ApiError> {
        let url = format!(
            "{}/api/{team}/rest/{}",
            self.config.api_host,
            call.endpoint.trim_start_matches('/')
        );
        let mut request = self
            .http
            .request(call.method.clone(), url)
            .bearer_auth(token);
        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        for (name, value) in &call.headers {
            request = request.header(*name, value);
        }
        request = match &call.body {
            Body::Empty => request.header(CONTENT_TYPE, "application/json"),
            Body::Json(value) => request.json(value),
            Body::Upload { name, content } => {
                let part = Part::bytes(content.to_vec())
                    .file_name((*name).to_owned())
                    .mime_str(&content_type_for(name))?;
                request.multipart(Form::new().part("file", part))
            }
        };
        Ok(request.send().await?)
    }

    async fn send(&self, call: &Call<'_>) -> Result<Response, ApiError> {
        let (token, team) = self.session().await?;
        let response = self.dispatch(call, &token, &team).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(call, response).await;
        }

        debug!(
            method = %call.method,
            endpoint = %call.endpoint,
            "access token rejected; re-authenticating once"
        );
        let (fresh_token, fresh_team) = self.authenticate().await?;
        let retried = self.dispatch(call, &fresh_token, &fresh_team).await?;
        check_status(call, retried).await
    }

    async fn fetch<T: DeserializeOwned>(&self, call: Call<'_>) -> Result<T, ApiError> {
        let response = self.send(&call).await?;
        response.json::<T>().await.map_err(|err| ApiError::Decode {
            endpoint: call.endpoint.clone(),
            message: err.to_string(),
        })
    }

    async fn perform(&self, call: Call<'_>) -> Result<(), ApiError> {
        self.send(&call).await.map(drop)
    }

    /// Lists processes, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails.
    pub async fn get_processes(&self, page: PageRequest) -> Result<Page<Process>, ApiError> {
        self.fetch(Call::new(Method::GET, "processes").page(page))
            .await
    }

    /// Runs a process synchronously and returns its return value.
    ///
    /// Bodies that are not JSON are returned as a string value.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails.
    pub async fn execute_process_sync(
        &self,
        id_or_slug: &str,
        parameters: &Value,
        options: &ExecuteOptions,
    ) -> Result<Value, ApiError> {
        let call = Call::new(
            Method::POST,
            format!("processes/{}/execute-sync", segment(id_or_slug)),
        )
        .header(INITIATED_BY_HEADER, options.initiated_by.as_ref())
        .json(&ExecuteProcessInput::new(parameters, options))?;
        let response = self.send(&call).await?;
        let text = response.text().await?;
        let parsed = serde_json::from_str::<Value>(&text);
        Ok(parsed.unwrap_or(Value::String(text)))
    }

    /// Lists executions matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidDate`] before any request when a date
    /// bound is malformed, or [`ApiError`] when the request fails.
    pub async fn get_executions(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Page<ExecutionRecord>, ApiError> {
        let query = filter.to_query()?;
        self.fetch(Call::new(Method::GET, "executions").query(query))
            .await
    }

    /// Lists schedules, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails.
    pub async fn get_schedules(&self, page: PageRequest) -> Result<Page<Schedule>, ApiError> {
        self.fetch(Call::new(Method::GET, "schedules").page(page))
            .await
    }

    /// Fetches one schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails.
    pub async fn get_schedule(&self, id: &str) -> Result<Schedule, ApiError> {
        self.fetch(Call::new(Method::GET, format!("schedules/{}", segment(id))))
            .await
    }

    /// Deletes a schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails.
    pub async fn delete_schedule(&self, id: &str) -> Result<(), ApiError> {
        self.perform(Call::new(
            Method::DELETE,
            format!("schedules/{}", segment(id)),
        ))
        .await
    }

    /// Pauses a schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails.
    pub async fn pause_schedule(&self, id: &str) -> Result<(), ApiError> {
        self.perform(Call::new(
            Method::PUT,
            format!("schedules/{}/pause", segment(id)),
        ))
        .await
    }

    /// Resumes a paused schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails.
    pub async fn resume_schedule(&self, id: &str) -> Result<(), ApiError> {
        self.perform(Call::new(
            Method::PUT,
            format!("schedules/{}/resume", segment(id)),
        ))
        .await
    }
}

async fn check_status(call: &Call<'_>, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let reason = status.canonical_reason().unwrap_or("Unknown Status").to_owned();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|json| json.get("message").and_then(Value::as_str).map(ToOwned::to_owned))
        .unwrap_or(reason);
    Err(ApiError::Http {
        status: status.as_u16(),
        method: call.method.to_string(),
        endpoint: call.endpoint.clone(),
        message,
    })
}

impl Gateway for ApiClient {
    fn get_process<'a>(&'a self, id_or_slug: &'a str) -> GatewayFuture<'a, Process> {
        Box::pin(async move {
            self.fetch(Call::new(
                Method::GET,
                format!("processes/{}", segment(id_or_slug)),
            ))
            .await
        })
    }

    fn create_process<'a>(
        &'a self,
        input: &'a CreateProcessInput,
    ) -> GatewayFuture<'a, Process> {
        Box::pin(async move {
            self.fetch(Call::new(Method::POST, "processes").json(input)?)
                .await
        })
    }

    fn update_process<'a>(
        &'a self,
        id_or_slug: &'a str,
        input: &'a UpdateProcessInput,
    ) -> GatewayFuture<'a, Process> {
        Box::pin(async move {
            self.fetch(
                Call::new(Method::PATCH, format!("processes/{}", segment(id_or_slug)))
                    .json(input)?,
            )
            .await
        })
    }

    fn delete_process<'a>(&'a self, id_or_slug: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            self.perform(Call::new(
                Method::DELETE,
                format!("processes/{}", segment(id_or_slug)),
            ))
            .await
        })
    }

    fn execute_process_async<'a>(
        &'a self,
        id_or_slug: &'a str,
        parameters: &'a Value,
        options: &'a ExecuteOptions,
    ) -> GatewayFuture<'a, ExecutionId> {
        Box::pin(async move {
            let call = Call::new(
                Method::POST,
                format!("processes/{}/execute", segment(id_or_slug)),
            )
            .header(INITIATED_BY_HEADER, options.initiated_by.as_ref())
            .json(&ExecuteProcessInput::new(parameters, options))?;
            self.fetch(call).await
        })
    }

    fn get_execution<'a>(&'a self, id: &'a str) -> GatewayFuture<'a, ExecutionRecord> {
        Box::pin(async move {
            self.fetch(Call::new(Method::GET, format!("executions/{}", segment(id))))
                .await
        })
    }

    fn get_execution_logs<'a>(
        &'a self,
        id: &'a str,
        page: PageRequest,
    ) -> GatewayFuture<'a, Page<Log>> {
        Box::pin(async move {
            self.fetch(Call::new(Method::GET, format!("executions/{}/logs", segment(id))).page(page))
                .await
        })
    }

    fn kill_execution<'a>(&'a self, id: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            self.perform(Call::new(
                Method::PUT,
                format!("executions/{}/kill", segment(id)),
            ))
            .await
        })
    }

    fn rerun_execution<'a>(&'a self, id: &'a str) -> GatewayFuture<'a, String> {
        Box::pin(async move {
            let response: ExecutionId = self
                .fetch(Call::new(
                    Method::POST,
                    format!("executions/{}/rerun", segment(id)),
                ))
                .await?;
            Ok(response.execution_id)
        })
    }

    fn get_variables(&self, page: PageRequest) -> GatewayFuture<'_, Page<TeamVariable>> {
        Box::pin(async move {
            self.fetch(Call::new(Method::GET, "variables").page(page))
                .await
        })
    }

    fn create_variable<'a>(
        &'a self,
        input: &'a CreateTeamVariableInput,
    ) -> GatewayFuture<'a, TeamVariable> {
        Box::pin(async move {
            self.fetch(Call::new(Method::POST, "variables").json(input)?)
                .await
        })
    }

    fn update_variable<'a>(
        &'a self,
        id: &'a str,
        input: &'a UpdateTeamVariableInput,
    ) -> GatewayFuture<'a, TeamVariable> {
        Box::pin(async move {
            self.fetch(Call::new(Method::PATCH, format!("variables/{}", segment(id))).json(input)?)
                .await
        })
    }

    fn delete_variable<'a>(&'a self, id: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            self.perform(Call::new(
                Method::DELETE,
                format!("variables/{}", segment(id)),
            ))
            .await
        })
    }

    fn get_objects(&self) -> GatewayFuture<'_, Vec<StorageObject>> {
        Box::pin(async move {
            self.fetch(Call::new(Method::GET, "storage/objects"))
                .await
        })
    }

    fn create_object<'a>(
        &'a self,
        name: &'a str,
        content: &'a [u8],
    ) -> GatewayFuture<'a, StorageObject> {
        Box::pin(async move {
            let call = Call::new(Method::POST, "storage/objects")
                .query(vec![("name", name.to_owned())])
                .upload(name, content);
            self.fetch(call).await
        })
    }

    fn get_object<'a>(&'a self, name: &'a str) -> GatewayFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let call = Call::new(Method::GET, format!("storage/objects/{}", segment(name)));
            let response = self.send(&call).await?;
            Ok(response.bytes().await?.to_vec())
        })
    }

    fn delete_object<'a>(&'a self, name: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            self.perform(Call::new(
                Method::DELETE,
                format!("storage/objects/{}", segment(name)),
            ))
            .await
        })
    }
}
