//! Team storage: upload, download, list and delete named objects.

use std::sync::Arc;

use tracing::debug;

use crate::api::{ApiClient, ApiError, ClientRegistry, Gateway, StorageObject};
use crate::config::ApiConfig;

/// Content type for an object named `name`, inferred from its extension.
///
/// Unknown extensions map to `application/octet-stream`.
#[must_use]
pub fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_owned()
}

/// Named objects held in team storage.
#[derive(Debug)]
pub struct Storage<G: Gateway> {
    gateway: Arc<G>,
}

impl<G: Gateway> Clone for Storage<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
        }
    }
}

impl Storage<ApiClient> {
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

impl<G: Gateway> Storage<G> {
    /// Wraps an existing gateway.
    #[must_use]
    pub const fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Stores `content` under `name`, replacing any existing object.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the upload fails.
    pub async fn upload(&self, name: &str, content: &[u8]) -> Result<StorageObject, ApiError> {
        debug!(object = name, bytes = content.len(), "uploading storage object");
        self.gateway.create_object(name, content).await
    }

    /// Returns the content stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the object is missing or the download fails.
    pub async fn download(&self, name: &str) -> Result<Vec<u8>, ApiError> {
        self.gateway.get_object(name).await
    }

    /// Deletes the object stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the object is missing or the call fails.
    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        self.gateway.delete_object(name).await
    }

    /// Lists stored objects.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the call fails.
    pub async fn list(&self) -> Result<Vec<StorageObject>, ApiError> {
        self.gateway.get_objects().await
    }
}
