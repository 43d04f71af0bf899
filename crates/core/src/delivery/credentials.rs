//! Bearer token lookup from the persisted auth state
//!
//! The extension persists its auth store under [`AUTH_STORAGE_KEY`] as
//! `{"state": {"token": "..."}}`, either as a JSON object or as the JSON text
//! of that object. Anything that does not yield a non-empty token means the
//! user is signed out.

use std::sync::Arc;

use async_trait::async_trait;
use mindhit_domain::constants::AUTH_STORAGE_KEY;
use mindhit_domain::Result;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::ports::CredentialProvider;
use crate::storage::ports::KeyValueStore;

#[derive(Debug, Deserialize)]
struct PersistedAuth {
    state: AuthState,
}

#[derive(Debug, Deserialize)]
struct AuthState {
    #[serde(default)]
    token: Option<String>,
}

/// Reads the bearer token from a [`KeyValueStore`].
#[derive(Clone)]
pub struct StoredCredentials {
    store: Arc<dyn KeyValueStore>,
}

impl StoredCredentials {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persist `token` in the same shape the extension uses.
    ///
    /// Passing `None` signs the user out.
    pub async fn store_token(&self, token: Option<&str>) -> Result<()> {
        match token.filter(|t| !t.trim().is_empty()) {
            Some(token) => {
                let value = serde_json::json!({ "state": { "token": token } });
                self.store.set(AUTH_STORAGE_KEY, value).await
            }
            None => self.store.remove(AUTH_STORAGE_KEY).await,
        }
    }
}

#[async_trait]
impl CredentialProvider for StoredCredentials {
    async fn bearer_token(&self) -> Result<Option<String>> {
        let Some(value) = self.store.get(AUTH_STORAGE_KEY).await? else {
            return Ok(None);
        };
        Ok(parse_token(value))
    }
}

/// Extract the bearer token from a persisted auth value.
pub fn parse_token(value: Value) -> Option<String> {
    let parsed = match value {
        Value::String(raw) => serde_json::from_str::<PersistedAuth>(&raw),
        other => serde_json::from_value::<PersistedAuth>(other),
    };

    match parsed {
        Ok(auth) => auth.state.token.filter(|token| !token.trim().is_empty()),
        Err(err) => {
            debug!(error = %err, "Persisted auth state is not readable");
            None
        }
    }
}
