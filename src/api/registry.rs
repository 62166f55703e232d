//! Process-wide cache of API clients keyed by configuration.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{ApiClient, ApiError};
use crate::config::ApiConfig;

/// Shares one [`ApiClient`] per distinct configuration.
///
/// Two configurations map to the same client when their set fields are
/// equal; unset fields do not take part in the comparison.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<String, Arc<ApiClient>>>,
}

static GLOBAL: OnceLock<ClientRegistry> = OnceLock::new();

impl ClientRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registry shared by the whole process.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<ApiClient>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the client for `config`, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when a new client cannot be built.
    pub fn get_or_create(&self, config: &ApiConfig) -> Result<Arc<ApiClient>, ApiError> {
        let key = config_hash(config);
        let mut clients = self.lock();
        if let Some(existing) = clients.get(&key) {
            return Ok(Arc::clone(existing));
        }
        debug!(config_hash = %key, "creating API client");
        let client = Arc::new(ApiClient::new(config)?);
        clients.insert(key, Arc::clone(&client));
        Ok(client)
    }

    /// Number of cached clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when no client has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops every cached client.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Hashes the set fields of `config` in key order.
#[must_use]
pub fn config_hash(config: &ApiConfig) -> String {
    let fields: BTreeMap<String, Value> = match serde_json::to_value(config) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .collect(),
        _ => BTreeMap::new(),
    };
    let canonical = serde_json::to_string(&fields).unwrap_or_default();
    sha256_hex(canonical.as_bytes())
}

/// Lower-case hex SHA-256 digest of `bytes`.
pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
