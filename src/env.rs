//! Team variables exposed to executions as environment variables.

use std::sync::Arc;

use tracing::info;

use crate::api::{
    ApiClient, ApiError, ClientRegistry, CreateTeamVariableInput, Gateway, TeamVariable,
    UpdateTeamVariableInput, collect_pages,
};
use crate::config::ApiConfig;

/// Key and value of a team variable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnvVar {
    /// Variable name.
    pub key: String,
    /// Variable value; sensitive variables may come back masked or empty.
    pub value: String,
}

/// Reads and writes the team's environment variables.
#[derive(Debug)]
pub struct TeamEnv<G: Gateway> {
    gateway: Arc<G>,
}

impl TeamEnv<ApiClient> {
    /// Connects with `config` merged over the configuration loaded from
    /// files and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] when configuration cannot be loaded or
    /// lacks credentials.
    pub fn connect(config: &ApiConfig) -> Result<Self, ApiError> {
        let loaded =
            ApiConfig::load_without_cli_args().map_err(|err| ApiError::Config(err.to_string()))?;
        let client = ClientRegistry::global().get_or_create(&loaded.merged_with(config))?;
        Ok(Self::new(client))
    }
}

impl<G: Gateway> TeamEnv<G> {
    /// Wraps an existing gateway.
    #[must_use]
    pub const fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    async fn variables(&self) -> Result<Vec<TeamVariable>, ApiError> {
        let mut variables = collect_pages(|page| self.gateway.get_variables(page)).await?;
        variables.sort_by(|left, right| left.key.cmp(&right.key));
        Ok(variables)
    }

    async fn find(&self, key: &str) -> Result<Option<TeamVariable>, ApiError> {
        Ok(self
            .variables()
            .await?
            .into_iter()
            .find(|variable| variable.key == key))
    }

    /// Returns every team variable, sorted by key.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when a page cannot be fetched.
    pub async fn env_vars(&self) -> Result<Vec<EnvVar>, ApiError> {
        Ok(self
            .variables()
            .await?
            .into_iter()
            .map(|variable| EnvVar {
                key: variable.key,
                value: variable.value.unwrap_or_default(),
            })
            .collect())
    }

    /// Updates `key` when it exists and creates it otherwise.
    ///
    /// `is_sensitive` only applies when the variable is created.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the lookup or the write fails.
    pub async fn set_env_var(
        &self,
        key: &str,
        value: &str,
        is_sensitive: bool,
    ) -> Result<(), ApiError> {
        if let Some(existing) = self.find(key).await? {
            let input = UpdateTeamVariableInput {
                key: key.to_owned(),
                value: value.to_owned(),
            };
            self.gateway.update_variable(&existing.id, &input).await?;
            info!(key, "updated team variable");
        } else {
            let input = CreateTeamVariableInput {
                key: key.to_owned(),
                value: value.to_owned(),
                is_sensitive,
            };
            self.gateway.create_variable(&input).await?;
            info!(key, "created team variable");
        }
        Ok(())
    }

    /// Deletes `key`; unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the lookup or the deletion fails.
    pub async fn del_env_var(&self, key: &str) -> Result<(), ApiError> {
        if let Some(existing) = self.find(key).await? {
            self.gateway.delete_variable(&existing.id).await?;
            info!(key, "deleted team variable");
        }
        Ok(())
    }
}
