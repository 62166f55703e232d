//! Configuration loading via `ortho-config`.
//!
//! Values merge defaults, `yepcode.toml` files, and `YEPCODE_*` environment
//! variables. Explicit values passed by the caller take precedence over
//! everything that was loaded.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default API host.
pub const DEFAULT_API_HOST: &str = "https://cloud.yepcode.io";

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

const AUTH_PATH: &str = "/auth/realms/yepcode/protocol/openid-connect/token";

/// Connection settings for the YepCode API.
///
/// Exactly one credential source is required: an `access_token`, an
/// `api_token`, or a `client_id` and `client_secret` pair.
#[derive(Clone, Debug, Default, Deserialize, Eq, OrthoConfig, PartialEq, Serialize)]
#[ortho_config(
    prefix = "YEPCODE",
    discovery(
        app_name = "yepcode",
        env_var = "YEPCODE_CONFIG_PATH",
        config_file_name = "yepcode.toml",
        dotfile_name = ".yepcode.toml",
        project_file_name = "yepcode.toml"
    )
)]
pub struct ApiConfig {
    /// Token endpoint. Defaults to the Keycloak realm below `api_host`.
    pub auth_url: Option<String>,
    /// API host. Defaults to [`DEFAULT_API_HOST`].
    pub api_host: Option<String>,
    /// Request timeout in milliseconds. Defaults to [`DEFAULT_TIMEOUT_MS`].
    pub timeout: Option<u64>,
    /// Pre-issued bearer token. The team is read from its `groups` claim.
    pub access_token: Option<String>,
    /// Base64 encoded JSON document holding `clientId` and `clientSecret`.
    pub api_token: Option<String>,
    /// OAuth client identifier.
    pub client_id: Option<String>,
    /// OAuth client secret.
    pub client_secret: Option<String>,
    /// Team identifier; required unless an access token provides it.
    pub team_id: Option<String>,
}

/// Configuration with defaults applied and the API token decoded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedConfig {
    /// API host without a trailing slash.
    pub api_host: String,
    /// Token endpoint.
    pub auth_url: String,
    /// Timeout applied to every request.
    pub timeout: Duration,
    /// Bearer token supplied up front, if any.
    pub access_token: Option<String>,
    /// Client credentials used to obtain and refresh tokens.
    pub client_credentials: Option<ClientCredentials>,
    /// Team identifier from configuration.
    pub team_id: Option<String>,
}

/// OAuth client credentials.
#[derive(Clone, Eq, PartialEq)]
pub struct ClientCredentials {
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTokenPayload {
    client_id: Option<String>,
    client_secret: Option<String>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|candidate| !candidate.trim().is_empty())
}

fn pick(explicit: Option<&String>, loaded: Option<&String>) -> Option<String> {
    present(explicit.map(String::as_str))
        .or_else(|| present(loaded.map(String::as_str)))
        .map(ToOwned::to_owned)
}

impl ApiConfig {
    /// Loads configuration from defaults, configuration files, and
    /// environment variables without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("yepcode-run")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Returns a copy of `self` where every non-empty field of `overrides`
    /// replaces the loaded value.
    #[must_use]
    pub fn merged_with(&self, overrides: &Self) -> Self {
        Self {
            auth_url: pick(overrides.auth_url.as_ref(), self.auth_url.as_ref()),
            api_host: pick(overrides.api_host.as_ref(), self.api_host.as_ref()),
            timeout: overrides.timeout.or(self.timeout),
            access_token: pick(overrides.access_token.as_ref(), self.access_token.as_ref()),
            api_token: pick(overrides.api_token.as_ref(), self.api_token.as_ref()),
            client_id: pick(overrides.client_id.as_ref(), self.client_id.as_ref()),
            client_secret: pick(overrides.client_secret.as_ref(), self.client_secret.as_ref()),
            team_id: pick(overrides.team_id.as_ref(), self.team_id.as_ref()),
        }
    }

    /// Checks that at least one credential source is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the environment variables
    /// and configuration keys that can supply credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let has_access_token = present(self.access_token.as_deref()).is_some();
        let has_api_token = present(self.api_token.as_deref()).is_some();
        let has_client_pair = present(self.client_id.as_deref()).is_some()
            && present(self.client_secret.as_deref()).is_some();
        if has_access_token || has_api_token || has_client_pair {
            return Ok(());
        }
        Err(ConfigError::MissingField(String::from(
            "missing credentials: set YEPCODE_API_TOKEN, YEPCODE_ACCESS_TOKEN, or \
             YEPCODE_CLIENT_ID and YEPCODE_CLIENT_SECRET, or add api_token to yepcode.toml",
        )))
    }

    /// Applies defaults and decodes the API token.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when no credentials are set and
    /// [`ConfigError::InvalidToken`] when the API token cannot be decoded.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        self.validate()?;

        let api_host = present(self.api_host.as_deref())
            .unwrap_or(DEFAULT_API_HOST)
            .trim_end_matches('/')
            .to_owned();
        let auth_url = present(self.auth_url.as_deref())
            .map_or_else(|| format!("{api_host}{AUTH_PATH}"), ToOwned::to_owned);

        let client_credentials = match present(self.api_token.as_deref()) {
            Some(token) => Some(decode_api_token(token)?),
            None => match (
                present(self.client_id.as_deref()),
                present(self.client_secret.as_deref()),
            ) {
                (Some(client_id), Some(client_secret)) => Some(ClientCredentials {
                    client_id: client_id.to_owned(),
                    client_secret: client_secret.to_owned(),
                }),
                _ => None,
            },
        };

        Ok(ResolvedConfig {
            api_host,
            auth_url,
            timeout: Duration::from_millis(self.timeout.unwrap_or(DEFAULT_TIMEOUT_MS)),
            access_token: present(self.access_token.as_deref()).map(ToOwned::to_owned),
            client_credentials,
            team_id: present(self.team_id.as_deref()).map(ToOwned::to_owned),
        })
    }
}

/// Decodes an API token (base64 JSON with `clientId` and `clientSecret`).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidToken`] when the token is not base64, not
/// JSON, or lacks either credential.
pub fn decode_api_token(token: &str) -> Result<ClientCredentials, ConfigError> {
    let invalid = || ConfigError::InvalidToken(token.to_owned());
    let bytes = STANDARD.decode(token.trim()).map_err(|_| invalid())?;
    let payload: ApiTokenPayload = serde_json::from_slice(&bytes).map_err(|_| invalid())?;
    match (payload.client_id, payload.client_secret) {
        (Some(client_id), Some(client_secret))
            if !client_id.is_empty() && !client_secret.is_empty() =>
        {
            Ok(ClientCredentials {
                client_id,
                client_secret,
            })
        }
        _ => Err(invalid()),
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Raised when the API token cannot be decoded.
    #[error("invalid apiToken format: {0}")]
    InvalidToken(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
