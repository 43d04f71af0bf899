//! Port interfaces for durable storage

use async_trait::async_trait;
use mindhit_domain::Result;
use serde_json::Value;

/// Asynchronous key-value store holding JSON values.
///
/// Used for durable retry records and for the persisted auth state.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Insert or replace the value stored under `key`
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Delete `key`; deleting a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;

    /// Keys starting with `prefix`, in ascending lexical order
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}
