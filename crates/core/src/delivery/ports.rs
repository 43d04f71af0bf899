//! Port interfaces for event delivery

use async_trait::async_trait;
use mindhit_domain::{BrowsingEvent, DeliveryError, Result, SessionId};

/// Destination for event batches (the remote events API).
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one batch on behalf of `session_id`.
    ///
    /// Any error counts as a failed attempt.
    async fn deliver(
        &self,
        session_id: &SessionId,
        events: &[BrowsingEvent],
    ) -> std::result::Result<(), DeliveryError>;
}

/// Source of the bearer token used to authenticate deliveries.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current bearer token, or `None` when the user is signed out
    async fn bearer_token(&self) -> Result<Option<String>>;
}
